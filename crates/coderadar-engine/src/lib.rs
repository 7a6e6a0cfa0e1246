//! The indexing engine: collaborator traits, batch orchestration, progress
//! reporting, and the `IndexerEngine` facade that ties them to
//! `coderadar-core`'s change detection/stats and `coderadar-store`'s
//! persistence.

pub mod batch;
pub mod engine;
pub mod error;
pub mod progress;
pub mod reference;
pub mod traits;

pub use batch::{BatchError, BatchOrchestrator, BatchRunOutcome, DEFAULT_BATCH_SIZE};
pub use engine::{DetailedIndexStats, DetailedStats, IndexerEngine, IndexerEngineOptions};
pub use error::{EmbedderError, EngineError, Result, ScannerError, VectorStoreError};
pub use progress::{NullProgressSink, Phase, ProgressSink, StoringProgress, ThrottledProgress, MIN_PROGRESS_INTERVAL};
pub use traits::{
    ChangeFrequency, Embedder, GitHistoryProvider, MetricsCollector, ScanOptions, ScanResult, ScanStats, Scanner,
    SearchOptions, SearchResult, StoreDocument, VectorStore, VectorStoreStats,
};
