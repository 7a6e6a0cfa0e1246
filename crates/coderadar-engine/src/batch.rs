use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use coderadar_core::effective_workers_from_env;
use tokio::sync::Semaphore;

use crate::progress::{ProgressSink, StoringProgress, ThrottledProgress};
use crate::traits::{StoreDocument, VectorStore};

/// Default batch size.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// One batch's failure, aggregated rather than propagated.
#[derive(Debug, Clone)]
pub struct BatchError {
    pub batch_index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchRunOutcome {
    pub documents_indexed: usize,
    pub errors: Vec<BatchError>,
}

/// Splits a document stream into fixed-size batches and submits up to
/// `concurrency` of them in parallel to a `VectorStore`. A failed batch is
/// recorded in `errors` and does not abort the run or the other in-flight
/// batches.
pub struct BatchOrchestrator {
    batch_size: usize,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(batch_size: usize, concurrency: usize) -> Self {
        Self { batch_size: batch_size.max(1), concurrency: concurrency.max(1) }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, effective_workers_from_env())
    }

    pub async fn run<S>(
        &self,
        documents: Vec<StoreDocument>,
        store: Arc<dyn VectorStore>,
        progress: Arc<ThrottledProgress<S>>,
    ) -> BatchRunOutcome
    where
        S: ProgressSink + 'static,
    {
        let total = documents.len();
        if total == 0 {
            return BatchRunOutcome::default();
        }

        let batches: Vec<Vec<StoreDocument>> = documents.chunks(self.batch_size).map(|c| c.to_vec()).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let indexed = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let mut handles = Vec::with_capacity(batches.len());
        for (batch_index, batch) in batches.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let store = store.clone();
            let indexed = indexed.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("batch semaphore closed early");
                match store.add_documents(batch).await {
                    Ok(count) => {
                        let so_far = indexed.fetch_add(count, Ordering::SeqCst) + count;
                        emit_storing_progress(&progress, so_far, total, started, false);
                        Ok(count)
                    }
                    Err(e) => Err(BatchError { batch_index, reason: e.to_string() }),
                }
            }));
        }

        let mut outcome = BatchRunOutcome::default();
        for handle in handles {
            match handle.await {
                Ok(Ok(count)) => outcome.documents_indexed += count,
                Ok(Err(batch_error)) => outcome.errors.push(batch_error),
                Err(join_error) => outcome.errors.push(BatchError {
                    batch_index: usize::MAX,
                    reason: format!("batch task panicked: {join_error}"),
                }),
            }
        }

        emit_storing_progress(&progress, outcome.documents_indexed, total, started, true);
        outcome
    }
}

fn emit_storing_progress<S: ProgressSink>(
    progress: &ThrottledProgress<S>,
    documents_indexed: usize,
    total_documents: usize,
    started: Instant,
    force: bool,
) {
    let elapsed = started.elapsed().as_secs_f64().max(0.001);
    let docs_per_sec = documents_indexed as f64 / elapsed;
    let remaining = total_documents.saturating_sub(documents_indexed);
    let eta_seconds = if docs_per_sec > 0.0 { Some(remaining as f64 / docs_per_sec) } else { None };
    let percent_complete = if total_documents == 0 {
        100.0
    } else {
        (documents_indexed as f64 / total_documents as f64) * 100.0
    };

    progress.storing(
        StoringProgress { documents_indexed, total_documents, docs_per_sec, eta_seconds, percent_complete },
        force,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressSink;
    use crate::reference::{HashEmbedder, InMemoryVectorStore};
    use crate::traits::{SearchOptions, SearchResult, VectorStoreStats};
    use crate::error::VectorStoreError;
    use async_trait::async_trait;
    use coderadar_core::{ComponentType, DocumentMetadata};
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn doc(id: &str) -> StoreDocument {
        StoreDocument {
            id: id.to_string(),
            text: id.to_string(),
            metadata: DocumentMetadata {
                file: format!("{id}.ts"),
                path: format!("{id}.ts"),
                component_type: ComponentType::Function,
                name: id.to_string(),
                start_line: 1,
                end_line: 1,
                signature: None,
                snippet: None,
                imports: None,
                exported: None,
                docstring: None,
                extra: Default::default(),
            },
            vector: Some(vec![0.0; 4]),
        }
    }

    #[tokio::test]
    async fn empty_input_returns_immediately_with_no_batches() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(Arc::new(HashEmbedder::new(4))));
        let progress = Arc::new(ThrottledProgress::new(NullProgressSink));
        let orchestrator = BatchOrchestrator::new(10, 2);
        let outcome = orchestrator.run(Vec::new(), store, progress).await;
        assert_eq!(outcome.documents_indexed, 0);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn all_documents_land_in_the_store_across_several_batches() {
        let store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(Arc::new(HashEmbedder::new(4))));
        let progress = Arc::new(ThrottledProgress::new(NullProgressSink));
        let orchestrator = BatchOrchestrator::new(3, 2);
        let documents: Vec<StoreDocument> = (0..10).map(|i| doc(&format!("doc-{i}"))).collect();
        let outcome = orchestrator.run(documents, store.clone(), progress).await;
        assert_eq!(outcome.documents_indexed, 10);
        assert!(outcome.errors.is_empty());
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_documents, 10);
    }

    /// A `VectorStore` double that fails specific 1-indexed call numbers,
    /// used to exercise the partial-batch-failure behavior above.
    struct FailingStore {
        call_count: AtomicUsize,
        fail_on_calls: HashSet<usize>,
        received: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorStore for FailingStore {
        async fn initialize(&self) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn add_documents(&self, documents: Vec<StoreDocument>) -> Result<usize, VectorStoreError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_calls.contains(&call) {
                return Err(VectorStoreError::BatchRejected { reason: format!("forced failure on call {call}") });
            }
            self.received.lock().unwrap().push(documents.len());
            Ok(documents.len())
        }

        async fn delete_documents(&self, _ids: &[String]) -> Result<(), VectorStoreError> {
            Ok(())
        }

        async fn search(&self, _query: &str, _options: SearchOptions) -> Result<Vec<SearchResult>, VectorStoreError> {
            Ok(Vec::new())
        }

        async fn get_stats(&self) -> Result<VectorStoreStats, VectorStoreError> {
            Ok(VectorStoreStats { total_documents: self.received.lock().unwrap().iter().sum() })
        }

        async fn close(&self) -> Result<(), VectorStoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn partial_batch_failures_are_aggregated_without_aborting_the_run() {
        // 10 batches of 10, sequential (concurrency 1) so call order matches
        // batch order; calls 3 and 7 are forced to fail (S5, scaled down).
        let store = Arc::new(FailingStore {
            call_count: AtomicUsize::new(0),
            fail_on_calls: [3, 7].into_iter().collect(),
            received: Mutex::new(Vec::new()),
        });
        let progress = Arc::new(ThrottledProgress::new(NullProgressSink));
        let orchestrator = BatchOrchestrator::new(10, 1);
        let documents: Vec<StoreDocument> = (0..100).map(|i| doc(&format!("doc-{i}"))).collect();

        let outcome = orchestrator.run(documents, store, progress).await;
        assert_eq!(outcome.documents_indexed, 80);
        assert_eq!(outcome.errors.len(), 2);
    }
}
