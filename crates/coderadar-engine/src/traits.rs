use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coderadar_core::{Document, DocumentMetadata};
use coderadar_store::CodeMetadata;
use serde::{Deserialize, Serialize};

use crate::error::{EmbedderError, ScannerError, VectorStoreError};

/// Request to a `Scanner`. `include` takes precedence over `exclude` when
/// both name the same file.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub repo_root: PathBuf,
    pub include: Option<Vec<String>>,
    pub exclude: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct ScanStats {
    pub files_scanned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub documents: Vec<Document>,
    pub stats: ScanStats,
}

/// Turns source files into `Document`s. A real parser is out of scope for
/// this crate; a small reference implementation lives in `reference::scanner`.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, options: ScanOptions) -> Result<ScanResult, ScannerError>;
}

/// Maps text to fixed-width float vectors. Invoked by the `VectorStore`,
/// not directly by the engine.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;
    fn dimension(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError>;
}

/// One document as handed to `VectorStore::add_documents`; `vector` is
/// normally `None` since the store owns the embedding step.
#[derive(Debug, Clone)]
pub struct StoreDocument {
    pub id: String,
    pub text: String,
    pub metadata: DocumentMetadata,
    pub vector: Option<Vec<f32>>,
}

impl From<&Document> for StoreDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            text: doc.text.clone(),
            metadata: doc.metadata.clone(),
            vector: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    pub score_threshold: Option<f32>,
    pub filter: Option<serde_json::Value>,
}

/// One hit from `VectorStore::search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f32,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VectorStoreStats {
    pub total_documents: usize,
}

/// Add/delete/search contract over an opaque vector index.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn initialize(&self) -> Result<(), VectorStoreError>;
    async fn add_documents(&self, documents: Vec<StoreDocument>) -> Result<usize, VectorStoreError>;
    async fn delete_documents(&self, ids: &[String]) -> Result<(), VectorStoreError>;
    async fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchResult>, VectorStoreError>;
    async fn get_stats(&self) -> Result<VectorStoreStats, VectorStoreError>;
    async fn close(&self) -> Result<(), VectorStoreError>;
}

/// Per-file commit-frequency enrichment. Non-fatal on failure by contract;
/// callers must not treat a `GitHistoryProvider` error as an indexing
/// failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeFrequency {
    pub commit_count: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub author_count: u64,
}

#[async_trait]
pub trait GitHistoryProvider: Send + Sync {
    async fn change_frequency(&self, paths: &[String]) -> anyhow::Result<HashMap<String, ChangeFrequency>>;
}

/// Builds `CodeMetadata` rows for a `Snapshot`. Non-fatal on failure.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    async fn collect(&self, documents: &[Document]) -> anyhow::Result<Vec<CodeMetadata>>;
}
