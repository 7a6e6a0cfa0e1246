//! Persistence layer: `StateStore` (persisted `IndexerState`) and
//! `MetricsStore` (append-only run snapshots + code metadata).

pub mod error;
pub mod metrics_store;
pub mod snapshot;
pub mod state_store;

pub use error::{Result, StoreError};
pub use metrics_store::{MetricsStore, SnapshotQuery};
pub use snapshot::{CodeMetadata, IndexStats, Snapshot, Trigger};
pub use state_store::{check_compatibility, Compatibility, LoadOutcome, StateStore};
