use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::VectorStoreError;
use crate::traits::{Embedder, SearchOptions, SearchResult, StoreDocument, VectorStore, VectorStoreStats};

struct Entry {
    document: StoreDocument,
    vector: Vec<f32>,
}

/// In-process `VectorStore` backed by a `HashMap` guarded by a
/// `tokio::sync::Mutex`, standing in for a real vector database. Embeds
/// documents lacking a precomputed vector via the `Embedder` it holds,
/// then ranks search hits by cosine similarity.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn Embedder>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn initialize(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn add_documents(&self, documents: Vec<StoreDocument>) -> Result<usize, VectorStoreError> {
        let mut to_embed = Vec::new();
        let mut to_embed_idx = Vec::new();
        for (idx, doc) in documents.iter().enumerate() {
            if doc.vector.is_none() {
                to_embed.push(doc.text.clone());
                to_embed_idx.push(idx);
            }
        }

        let computed = if to_embed.is_empty() {
            Vec::new()
        } else {
            self.embedder
                .embed(&to_embed)
                .await
                .map_err(|e| VectorStoreError::BatchRejected { reason: e.to_string() })?
        };

        let mut computed_iter = computed.into_iter();
        let mut entries = self.entries.lock().await;
        let mut inserted = 0usize;
        for (idx, doc) in documents.into_iter().enumerate() {
            let vector = match &doc.vector {
                Some(v) => v.clone(),
                None => {
                    debug_assert_eq!(to_embed_idx.get(inserted), Some(&idx));
                    computed_iter.next().ok_or_else(|| VectorStoreError::BatchRejected {
                        reason: "embedder returned fewer vectors than requested".to_string(),
                    })?
                }
            };
            let id = doc.id.clone();
            entries.insert(id, Entry { document: doc, vector });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_documents(&self, ids: &[String]) -> Result<(), VectorStoreError> {
        let mut entries = self.entries.lock().await;
        for id in ids {
            entries.remove(id);
        }
        Ok(())
    }

    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>, VectorStoreError> {
        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| VectorStoreError::Unavailable { reason: e.to_string() })?
            .into_iter()
            .next()
            .ok_or_else(|| VectorStoreError::Unavailable {
                reason: "embedder returned no vector for query".to_string(),
            })?;

        let entries = self.entries.lock().await;
        let mut scored: Vec<SearchResult> = entries
            .values()
            .map(|entry| SearchResult {
                id: entry.document.id.clone(),
                score: cosine_similarity(&query_vector, &entry.vector),
                metadata: entry.document.metadata.clone(),
            })
            .filter(|hit| options.score_threshold.map(|t| hit.score >= t).unwrap_or(true))
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(limit) = options.limit {
            scored.truncate(limit);
        }
        Ok(scored)
    }

    async fn get_stats(&self) -> Result<VectorStoreStats, VectorStoreError> {
        let entries = self.entries.lock().await;
        Ok(VectorStoreStats { total_documents: entries.len() })
    }

    async fn close(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::embedder::HashEmbedder;
    use coderadar_core::{ComponentType, DocumentMetadata};

    fn metadata(name: &str) -> DocumentMetadata {
        DocumentMetadata {
            file: format!("{name}.ts"),
            path: format!("{name}.ts"),
            component_type: ComponentType::Function,
            name: name.to_string(),
            start_line: 1,
            end_line: 1,
            signature: None,
            snippet: None,
            imports: None,
            exported: None,
            docstring: None,
            extra: Default::default(),
        }
    }

    fn doc(id: &str, text: &str) -> StoreDocument {
        StoreDocument {
            id: id.to_string(),
            text: text.to_string(),
            metadata: metadata(id),
            vector: None,
        }
    }

    #[tokio::test]
    async fn add_then_search_finds_the_closest_match() {
        let embedder = Arc::new(HashEmbedder::new(16));
        let store = InMemoryVectorStore::new(embedder);
        store
            .add_documents(vec![doc("a", "fn greet() {}"), doc("b", "fn farewell() {}")])
            .await
            .unwrap();

        let results = store.search("fn greet() {}", SearchOptions::default()).await.unwrap();
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn delete_removes_from_future_searches() {
        let embedder = Arc::new(HashEmbedder::new(16));
        let store = InMemoryVectorStore::new(embedder);
        store.add_documents(vec![doc("a", "fn greet() {}")]).await.unwrap();
        store.delete_documents(&["a".to_string()]).await.unwrap();
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_documents, 0);
    }

    #[tokio::test]
    async fn limit_bounds_result_count() {
        let embedder = Arc::new(HashEmbedder::new(16));
        let store = InMemoryVectorStore::new(embedder);
        store
            .add_documents(vec![doc("a", "one"), doc("b", "two"), doc("c", "three")])
            .await
            .unwrap();
        let results = store
            .search("one", SearchOptions { limit: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn get_stats_reflects_inserted_count() {
        let embedder = Arc::new(HashEmbedder::new(8));
        let store = InMemoryVectorStore::new(embedder);
        let inserted = store.add_documents(vec![doc("a", "one"), doc("b", "two")]).await.unwrap();
        assert_eq!(inserted, 2);
        let stats = store.get_stats().await.unwrap();
        assert_eq!(stats.total_documents, 2);
    }
}
