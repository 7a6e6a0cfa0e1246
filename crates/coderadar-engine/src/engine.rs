use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use coderadar_core::{
    discover_package_roots, hash_file, merge_stats, resolve_package_root, ChangeDetector, FileMetadata, IndexerState,
    StatsAggregator,
};
use coderadar_events::{EmitOptions, EventBus};
use coderadar_store::{check_compatibility, Compatibility, IndexStats, LoadOutcome, MetricsStore, StateStore, Trigger};

use crate::batch::{BatchError, BatchOrchestrator};
use crate::error::{EngineError, Result};
use crate::progress::{Phase, ProgressSink, ThrottledProgress};
use crate::traits::{
    Embedder, GitHistoryProvider, MetricsCollector, ScanOptions, Scanner, SearchOptions, SearchResult, StoreDocument,
    VectorStore,
};

/// Outcome of `IndexerEngine::index`/`update`.
#[derive(Debug, Default)]
pub struct DetailedIndexStats {
    pub files_scanned: usize,
    pub documents_indexed: usize,
    pub errors: Vec<BatchError>,
    pub duration_ms: u64,
    pub is_incremental: bool,
}

/// `IndexerEngine::get_stats` return value.
pub use coderadar_core::DetailedStats;

/// Construction-time configuration and collaborators the engine composes.
pub struct IndexerEngineOptions<S: ProgressSink> {
    pub repo_root: PathBuf,
    pub state_path: PathBuf,
    pub metrics_db_path: Option<PathBuf>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub batch_size: usize,
    pub scanner: Arc<dyn Scanner>,
    pub embedder: Arc<dyn Embedder>,
    pub vector_store: Arc<dyn VectorStore>,
    pub git_history: Option<Arc<dyn GitHistoryProvider>>,
    pub metrics_collector: Option<Arc<dyn MetricsCollector>>,
    pub progress: S,
    pub max_snapshot_history: Option<usize>,
}

/// Composes ChangeDetector, StatsAggregator/Merger, BatchOrchestrator,
/// StateStore, MetricsStore, and EventBus into `initialize / index / update
/// / search / get_stats / close`. Search never blocks on the lock guarding
/// index/update — it must not hold any exclusive lock acquired by them.
pub struct IndexerEngine<S: ProgressSink> {
    repo_root: PathBuf,
    embedding_model: String,
    embedding_dimension: usize,
    scanner: Arc<dyn Scanner>,
    #[allow(dead_code)]
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
    git_history: Option<Arc<dyn GitHistoryProvider>>,
    metrics_collector: Option<Arc<dyn MetricsCollector>>,
    events: Arc<EventBus>,
    state_store: StateStore,
    metrics_store: Option<MetricsStore>,
    max_snapshot_history: Option<usize>,
    orchestrator: BatchOrchestrator,
    progress: Arc<ThrottledProgress<S>>,
    state: tokio::sync::RwLock<Option<IndexerState>>,
    had_persisted_state: AtomicBool,
    run_lock: tokio::sync::Mutex<()>,
}

impl<S: ProgressSink + 'static> IndexerEngine<S> {
    pub fn new(options: IndexerEngineOptions<S>) -> Result<Self> {
        let metrics_store = options
            .metrics_db_path
            .map(MetricsStore::open)
            .transpose()?;

        Ok(Self {
            repo_root: options.repo_root,
            embedding_model: options.embedding_model,
            embedding_dimension: options.embedding_dimension,
            scanner: options.scanner,
            embedder: options.embedder,
            vector_store: options.vector_store,
            git_history: options.git_history,
            metrics_collector: options.metrics_collector,
            events: Arc::new(EventBus::new("coderadar-engine")),
            state_store: StateStore::new(options.state_path),
            metrics_store,
            max_snapshot_history: options.max_snapshot_history,
            orchestrator: BatchOrchestrator::new(options.batch_size.max(1), coderadar_core::effective_workers_from_env()),
            progress: Arc::new(ThrottledProgress::new(options.progress)),
            state: tokio::sync::RwLock::new(None),
            had_persisted_state: AtomicBool::new(false),
            run_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    fn repo_root_str(&self) -> String {
        self.repo_root.display().to_string()
    }

    /// Opens the vector store and loads prior state. A corrupt state file
    /// is logged and treated as empty; an embedding (model, dim) mismatch
    /// discards state outright.
    pub async fn initialize(&self) -> Result<()> {
        self.vector_store
            .initialize()
            .await
            .map_err(|e| EngineError::Storage { batch: 0, reason: e.to_string() })?;

        let (state, had_persisted) = match self.state_store.load()? {
            LoadOutcome::Missing => (self.empty_state(), false),
            LoadOutcome::Rejected { reason } => {
                tracing::warn!(%reason, "state file rejected, starting fresh");
                (self.empty_state(), false)
            }
            LoadOutcome::Loaded(state) => match check_compatibility(&state, &self.embedding_model, self.embedding_dimension) {
                Compatibility::Compatible => (*state, true),
                Compatibility::VersionMismatch => {
                    tracing::warn!("state schema version mismatch; continuing, but a full re-index is recommended");
                    (*state, true)
                }
                Compatibility::EmbeddingMismatch => {
                    tracing::warn!("embedding model/dimension mismatch; discarding state and forcing a full re-index");
                    (self.empty_state(), false)
                }
            },
        };

        self.had_persisted_state.store(had_persisted, Ordering::SeqCst);
        *self.state.write().await = Some(state);
        Ok(())
    }

    fn empty_state(&self) -> IndexerState {
        IndexerState::empty(self.repo_root_str(), &self.embedding_model, self.embedding_dimension)
    }

    /// Full index of the repository, discarding any prior state.
    pub async fn index(&self) -> Result<DetailedIndexStats> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::Concurrent)?;
        self.index_locked().await
    }

    /// Incremental update; delegates to a full index when no prior state
    /// was found during `initialize`.
    pub async fn update(&self) -> Result<DetailedIndexStats> {
        let _guard = self.run_lock.try_lock().map_err(|_| EngineError::Concurrent)?;
        if !self.had_persisted_state.load(Ordering::SeqCst) {
            return self.index_locked().await;
        }
        self.update_locked().await
    }

    async fn index_locked(&self) -> Result<DetailedIndexStats> {
        let started = Instant::now();
        self.progress.phase(Phase::Scanning);

        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(&self.repo_root, &HashMap::new(), None)?;
        let all_files = changes.added;

        let scan_result = self
            .scanner
            .scan(ScanOptions { repo_root: self.repo_root.clone(), ..Default::default() })
            .await?;

        self.progress.phase(Phase::Embedding);

        let manifest_dirs = discover_package_roots(&self.repo_root);
        let mut aggregator = StatsAggregator::new();
        let mut doc_ids_by_file: HashMap<String, Vec<String>> = HashMap::new();
        for doc in &scan_result.documents {
            doc_ids_by_file.entry(doc.metadata.file.clone()).or_default().push(doc.id.clone());
            let pkg_root = resolve_package_root(&doc.metadata.file, &manifest_dirs);
            aggregator.accumulate(doc, &pkg_root);
        }
        for relpath in &all_files {
            if !doc_ids_by_file.contains_key(relpath) {
                let pkg_root = resolve_package_root(relpath, &manifest_dirs);
                aggregator.note_empty_file(relpath, &guess_language(relpath), &pkg_root);
            }
        }
        let (stats, contributions) = aggregator.finish();

        self.progress.phase(Phase::Storing);
        let store_documents: Vec<StoreDocument> = scan_result.documents.iter().map(StoreDocument::from).collect();
        let batch_outcome = self.orchestrator.run(store_documents, self.vector_store.clone(), self.progress.clone()).await;

        let now = Utc::now();
        let mut files = HashMap::with_capacity(all_files.len());
        for relpath in &all_files {
            let doc_ids = doc_ids_by_file.get(relpath).cloned().unwrap_or_default();
            let contribution = contributions.get(relpath).cloned().unwrap_or_default();
            let full_path = self.repo_root.join(relpath);
            let hash = hash_file(&full_path).unwrap_or_default();
            let size = std::fs::metadata(&full_path).map(|m| m.len()).unwrap_or(0);
            files.insert(
                relpath.clone(),
                FileMetadata {
                    path: relpath.clone(),
                    hash,
                    last_modified: now,
                    last_indexed: now,
                    document_ids: doc_ids,
                    size,
                    language: contribution.language.clone(),
                    contribution,
                },
            );
        }

        let total_vectors = self
            .vector_store
            .get_stats()
            .await
            .map(|s| s.total_documents)
            .unwrap_or(batch_outcome.documents_indexed);

        let mut new_state = self.empty_state();
        new_state.files = files;
        new_state.stats = stats;
        new_state.total_vectors = total_vectors;
        new_state.incremental_updates_since = 0;
        new_state.last_index_time = now;

        self.state_store.save(&new_state)?;
        *self.state.write().await = Some(new_state);
        self.had_persisted_state.store(true, Ordering::SeqCst);

        let duration_ms = started.elapsed().as_millis() as u64;
        let index_stats = IndexStats {
            files_scanned: scan_result.stats.files_scanned,
            documents_indexed: batch_outcome.documents_indexed,
            errors: batch_outcome.errors.len(),
            duration_ms,
        };
        self.record_metrics(Trigger::Index, &scan_result.documents, index_stats.clone()).await;
        self.emit_index_updated(false, index_stats).await;

        self.progress.phase(Phase::Complete);
        Ok(DetailedIndexStats {
            files_scanned: scan_result.stats.files_scanned,
            documents_indexed: batch_outcome.documents_indexed,
            errors: batch_outcome.errors,
            duration_ms,
            is_incremental: false,
        })
    }

    async fn update_locked(&self) -> Result<DetailedIndexStats> {
        let started = Instant::now();

        let state_files = {
            let guard = self.state.read().await;
            guard.as_ref().map(|s| s.files.clone()).unwrap_or_default()
        };

        let detector = ChangeDetector::new();
        let changes = detector.detect_changes(&self.repo_root, &state_files, None)?;

        if !changes.has_changes() {
            self.progress.phase(Phase::Complete);
            return Ok(DetailedIndexStats {
                files_scanned: 0,
                documents_indexed: 0,
                errors: Vec::new(),
                duration_ms: started.elapsed().as_millis() as u64,
                is_incremental: true,
            });
        }

        self.progress.phase(Phase::Scanning);

        let mut deleted_contributions = Vec::new();
        let mut changed_contributions = Vec::new();
        let mut ids_to_delete = Vec::new();
        for relpath in &changes.deleted {
            if let Some(meta) = state_files.get(relpath) {
                ids_to_delete.extend(meta.document_ids.clone());
                deleted_contributions.push(meta.contribution.clone());
            }
        }
        for relpath in &changes.changed {
            if let Some(meta) = state_files.get(relpath) {
                ids_to_delete.extend(meta.document_ids.clone());
                changed_contributions.push(meta.contribution.clone());
            }
        }

        let mut delete_errors = Vec::new();
        if !ids_to_delete.is_empty() {
            if let Err(e) = self.vector_store.delete_documents(&ids_to_delete).await {
                tracing::warn!(error = %e, "vector store delete failed during update; stale vectors remain until next full index");
                delete_errors.push(BatchError { batch_index: usize::MAX, reason: e.to_string() });
            }
        }

        let files_to_reindex = changes.files_to_reindex();

        self.progress.phase(Phase::Embedding);
        let scan_result = self
            .scanner
            .scan(ScanOptions {
                repo_root: self.repo_root.clone(),
                include: Some(files_to_reindex.clone()),
                ..Default::default()
            })
            .await?;

        let manifest_dirs = discover_package_roots(&self.repo_root);
        let mut aggregator = StatsAggregator::new();
        let mut doc_ids_by_file: HashMap<String, Vec<String>> = HashMap::new();
        for doc in &scan_result.documents {
            doc_ids_by_file.entry(doc.metadata.file.clone()).or_default().push(doc.id.clone());
            let pkg_root = resolve_package_root(&doc.metadata.file, &manifest_dirs);
            aggregator.accumulate(doc, &pkg_root);
        }
        for relpath in &files_to_reindex {
            if !doc_ids_by_file.contains_key(relpath) {
                let pkg_root = resolve_package_root(relpath, &manifest_dirs);
                aggregator.note_empty_file(relpath, &guess_language(relpath), &pkg_root);
            }
        }
        let (incremental_stats, new_contributions) = aggregator.finish();

        self.progress.phase(Phase::Storing);
        let store_documents: Vec<StoreDocument> = scan_result.documents.iter().map(StoreDocument::from).collect();
        let batch_outcome = self.orchestrator.run(store_documents, self.vector_store.clone(), self.progress.clone()).await;

        let current_stats = {
            let guard = self.state.read().await;
            guard.as_ref().map(|s| s.stats.clone()).unwrap_or_default()
        };
        let (merged_stats, warnings) = merge_stats(&current_stats, &deleted_contributions, &changed_contributions, &incremental_stats);
        for warning in &warnings {
            tracing::warn!(%warning, "stats merge clamped a counter");
        }

        let now = Utc::now();
        let total_vectors = self.vector_store.get_stats().await.map(|s| s.total_documents).unwrap_or(0);

        {
            let mut guard = self.state.write().await;
            let state = guard.get_or_insert_with(|| self.empty_state());
            for relpath in &changes.deleted {
                state.files.remove(relpath);
            }
            for relpath in &files_to_reindex {
                let doc_ids = doc_ids_by_file.get(relpath).cloned().unwrap_or_default();
                let contribution = new_contributions.get(relpath).cloned().unwrap_or_default();
                let full_path = self.repo_root.join(relpath);
                let hash = hash_file(&full_path).unwrap_or_default();
                let size = std::fs::metadata(&full_path).map(|m| m.len()).unwrap_or(0);
                state.files.insert(
                    relpath.clone(),
                    FileMetadata {
                        path: relpath.clone(),
                        hash,
                        last_modified: now,
                        last_indexed: now,
                        document_ids: doc_ids,
                        size,
                        language: contribution.language.clone(),
                        contribution,
                    },
                );
            }
            state.stats = merged_stats;
            state.total_vectors = total_vectors;
            state.incremental_updates_since += 1;
            state.last_update = Some(now);
        }

        let state_snapshot = self.state.read().await.clone().expect("state populated above");
        self.state_store.save(&state_snapshot)?;

        let duration_ms = started.elapsed().as_millis() as u64;
        let mut errors = batch_outcome.errors;
        errors.extend(delete_errors);

        let index_stats = IndexStats {
            files_scanned: scan_result.stats.files_scanned,
            documents_indexed: batch_outcome.documents_indexed,
            errors: errors.len(),
            duration_ms,
        };
        self.record_metrics(Trigger::Update, &scan_result.documents, index_stats.clone()).await;
        self.emit_index_updated(true, index_stats).await;

        self.progress.phase(Phase::Complete);
        Ok(DetailedIndexStats {
            files_scanned: scan_result.stats.files_scanned,
            documents_indexed: batch_outcome.documents_indexed,
            errors,
            duration_ms,
            is_incremental: true,
        })
    }

    async fn record_metrics(&self, trigger: Trigger, documents: &[coderadar_core::Document], stats: IndexStats) {
        let Some(metrics_store) = &self.metrics_store else { return };
        let repo = self.repo_root_str();
        match metrics_store.record_snapshot(&repo, trigger, stats) {
            Ok(snapshot_id) => {
                if let Some(collector) = &self.metrics_collector {
                    match collector.collect(documents).await {
                        Ok(entries) => {
                            if let Err(e) = metrics_store.append_code_metadata(&snapshot_id, &entries) {
                                tracing::warn!(error = %e, "failed to append code metadata");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "metrics collector failed"),
                    }
                }
                if let Some(max_history) = self.max_snapshot_history {
                    if let Err(e) = metrics_store.prune(&repo, max_history) {
                        tracing::warn!(error = %e, "failed to prune snapshot history");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to record snapshot"),
        }
    }

    async fn emit_index_updated(&self, is_incremental: bool, stats: IndexStats) {
        let payload = serde_json::json!({
            "type": "code",
            "documentsCount": stats.documents_indexed,
            "duration": stats.duration_ms,
            "path": self.repo_root_str(),
            "stats": stats,
            "isIncremental": is_incremental,
        });
        if let Err(e) = self.events.emit("index.updated", payload, EmitOptions { wait_for_handlers: false, timeout: None }).await {
            tracing::warn!(error = %e, "failed to emit index.updated");
        }
    }

    /// Pass-through to `VectorStore::search`. Does not take `run_lock`, so
    /// it can run concurrently with `index`/`update`.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>> {
        self.vector_store
            .search(query, options)
            .await
            .map_err(|e| EngineError::Storage { batch: usize::MAX, reason: e.to_string() })
    }

    /// Computes `DetailedStats` from loaded state plus the vector store's
    /// current count; optionally enriched with change-frequency (non-fatal).
    pub async fn get_stats(&self) -> Result<DetailedStats> {
        let guard = self.state.read().await;
        let Some(state) = guard.as_ref() else {
            return Ok(DetailedStats::default());
        };

        let total_vectors = self
            .vector_store
            .get_stats()
            .await
            .map(|s| s.total_documents)
            .unwrap_or(state.total_vectors);

        let warning = if state.needs_reindex_warning() {
            Some(format!(
                "{} incremental updates since the last full index; consider running a full re-index",
                state.incremental_updates_since
            ))
        } else {
            None
        };

        if let Some(git_history) = &self.git_history {
            let paths: Vec<String> = state.files.keys().cloned().collect();
            if let Err(e) = git_history.change_frequency(&paths).await {
                tracing::warn!(error = %e, "change-frequency enrichment failed; continuing without it");
            }
        }

        Ok(DetailedStats {
            total_files: state.files.len(),
            total_documents: state.stats.total_documents,
            total_vectors,
            by_language: state.stats.by_language.clone(),
            by_component_type: state.stats.by_component_type.clone(),
            by_package: state.stats.by_package.clone(),
            warning,
        })
    }

    /// Flushes state and closes the vector store; idempotent.
    pub async fn close(&self) -> Result<()> {
        if let Some(state) = self.state.read().await.as_ref() {
            self.state_store.save(state)?;
        }
        self.vector_store
            .close()
            .await
            .map_err(|e| EngineError::Storage { batch: usize::MAX, reason: e.to_string() })?;
        if let Some(metrics_store) = &self.metrics_store {
            metrics_store.close();
        }
        Ok(())
    }
}

/// Best-effort language guess for files with zero parsed components, so
/// they still get a `by_language` bucket.
fn guess_language(relpath: &str) -> String {
    let ext = std::path::Path::new(relpath).extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "ts" | "tsx" | "js" | "jsx" => "typescript",
        "py" => "python",
        "go" => "go",
        "rs" => "rust",
        "md" | "mdx" => "markdown",
        _ => "unknown",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{HashEmbedder, InMemoryVectorStore, RegexScanner};
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &std::path::Path, relpath: &str, contents: &str) {
        let full = dir.join(relpath);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        let mut f = std::fs::File::create(full).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    fn build_engine(repo_root: &std::path::Path, state_path: std::path::PathBuf) -> IndexerEngine<crate::progress::NullProgressSink> {
        let embedder = Arc::new(HashEmbedder::new(16));
        let vector_store: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(embedder.clone()));
        IndexerEngine::new(IndexerEngineOptions {
            repo_root: repo_root.to_path_buf(),
            state_path,
            metrics_db_path: None,
            embedding_model: embedder.model_id().to_string(),
            embedding_dimension: embedder.dimension(),
            batch_size: 32,
            scanner: Arc::new(RegexScanner::new()),
            embedder,
            vector_store,
            git_history: None,
            metrics_collector: None,
            progress: crate::progress::NullProgressSink,
            max_snapshot_history: None,
        })
        .unwrap()
    }

    /// S1 — fresh full index of a one-file, one-component repo.
    #[tokio::test]
    async fn s1_fresh_full_index() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "a.ts",
            "export function greet(name: string): string {\n  return `Hello, ${name}`;\n}\n",
        );
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();

        let stats = engine.index().await.unwrap();
        assert_eq!(stats.files_scanned, 1);
        assert_eq!(stats.documents_indexed, 1);
        assert!(!stats.is_incremental);

        let detailed = engine.get_stats().await.unwrap();
        assert_eq!(detailed.total_vectors, 1);
        assert_eq!(detailed.by_language["typescript"].files, 1);
        assert_eq!(detailed.by_language["typescript"].components, 1);
    }

    /// S2 — no-op update touches neither vector store nor state.
    #[tokio::test]
    async fn s2_noop_update_does_nothing() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export function greet() {}\n");
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();
        engine.index().await.unwrap();

        let update_stats = engine.update().await.unwrap();
        assert_eq!(update_stats.files_scanned, 0);
        assert_eq!(update_stats.documents_indexed, 0);

        let detailed = engine.get_stats().await.unwrap();
        assert_eq!(detailed.total_vectors, 1);
    }

    /// S3 — changing a file re-embeds it without double-counting the file.
    #[tokio::test]
    async fn s3_changed_file_is_reindexed_once() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export function greet() {}\n");
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();
        engine.index().await.unwrap();

        write_file(dir.path(), "a.ts", "export function greet() {}\nexport function farewell() {}\n");
        let update_stats = engine.update().await.unwrap();
        assert_eq!(update_stats.documents_indexed, 2);

        let detailed = engine.get_stats().await.unwrap();
        assert_eq!(detailed.by_language["typescript"].files, 1);
        assert_eq!(detailed.by_language["typescript"].components, 2);
        assert_eq!(detailed.total_vectors, 2);
    }

    /// S4 — add one file, delete another.
    #[tokio::test]
    async fn s4_add_and_delete() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export function greet() {}\n");
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();
        engine.index().await.unwrap();

        std::fs::remove_file(dir.path().join("a.ts")).unwrap();
        write_file(dir.path(), "b.ts", "export function wave() {}\n");
        let update_stats = engine.update().await.unwrap();
        assert_eq!(update_stats.documents_indexed, 1);

        let detailed = engine.get_stats().await.unwrap();
        assert_eq!(detailed.total_files, 1);
        assert_eq!(detailed.total_vectors, 1);
    }

    /// Boundary: empty repository indexes to all-zero stats without error.
    #[tokio::test]
    async fn empty_repository_indexes_to_zero() {
        let dir = TempDir::new().unwrap();
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();
        let stats = engine.index().await.unwrap();
        assert_eq!(stats.files_scanned, 0);
        assert_eq!(stats.documents_indexed, 0);
    }

    /// Invariant: `state.stats.total_vectors` always matches the store's
    /// own count, re-read rather than computed from the batch just written.
    #[tokio::test]
    async fn total_vectors_matches_store_after_index() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export function greet() {}\n");
        write_file(dir.path(), "b.ts", "export function wave() {}\n");
        let engine = build_engine(dir.path(), dir.path().join("indexer-state.json"));
        engine.initialize().await.unwrap();
        engine.index().await.unwrap();
        let detailed = engine.get_stats().await.unwrap();
        assert_eq!(detailed.total_vectors, 2);
        assert_eq!(detailed.total_documents, 2);
    }

    #[tokio::test]
    async fn overlapping_index_calls_reject_with_concurrent_error() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.ts", "export function greet() {}\n");
        let engine = Arc::new(build_engine(dir.path(), dir.path().join("indexer-state.json")));
        engine.initialize().await.unwrap();

        let held = engine.run_lock.lock().await;
        let result = engine.index().await;
        drop(held);
        assert!(matches!(result, Err(EngineError::Concurrent)));
    }
}
