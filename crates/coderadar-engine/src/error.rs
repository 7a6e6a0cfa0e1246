use thiserror::Error;

use coderadar_core::CoreError;
use coderadar_events::EventError;
use coderadar_store::StoreError;

/// Errors raised by a `Scanner` collaborator. Fatal during index/update.
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("io error scanning {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Errors raised by an `Embedder` collaborator.
#[derive(Debug, Error)]
pub enum EmbedderError {
    #[error("embedding failed: {reason}")]
    Failed { reason: String },

    #[error("embedder dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors raised by a `VectorStore` collaborator.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("batch rejected: {reason}")]
    BatchRejected { reason: String },

    #[error("delete failed for {count} ids: {reason}")]
    DeleteFailed { count: usize, reason: String },
}

/// Top-level error taxonomy for `IndexerEngine`. Per-batch
/// and per-file errors from collaborators are aggregated into the returned
/// `errors` list by the engine instead of propagating through here; only
/// errors that compromise invariants reach this type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scanner failed: {0}")]
    Scanner(#[from] ScannerError),

    #[error("storage failed for batch {batch}: {reason}")]
    Storage { batch: usize, reason: String },

    #[error("state error: {0}")]
    State(#[from] StoreError),

    #[error("change detection failed: {0}")]
    ChangeDetection(#[from] CoreError),

    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("an index or update is already in progress for this workspace")]
    Concurrent,

    #[error("event bus timeout: {0}")]
    Timeout(#[from] EventError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
