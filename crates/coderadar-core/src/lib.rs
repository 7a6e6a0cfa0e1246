//! Data model, change detection, and pure stats aggregation for the
//! coderadar code-intelligence indexer.
//!
//! This crate has no I/O beyond reading files to hash/enumerate them and no
//! knowledge of embeddings or vector stores; those are collaborators owned
//! by `coderadar-engine`.

pub mod change_detector;
pub mod concurrency;
pub mod document;
pub mod error;
pub mod stats;
pub mod state;

pub use change_detector::{hash_file, ChangeDetector, ChangeSet, DEFAULT_EXCLUDE_DIRS};
pub use concurrency::{effective_workers, effective_workers_from_env, CONCURRENCY_ENV_VAR};
pub use document::{ComponentType, Document, DocumentMetadata};
pub use error::{CoreError, Result};
pub use state::{
    AggregateStats, DetailedStats, FileContribution, FileMetadata, IndexerState, LanguageStats,
    PackageStats, CURRENT_STATE_VERSION, REINDEX_WARNING_THRESHOLD,
};
pub use stats::{discover_package_roots, merge_stats, resolve_package_root, StatsAggregator};
