use thiserror::Error;

/// Errors raised by `StateStore`/`MetricsStore`. `MetricsStore` errors are
/// deliberately never fatal to a caller, so most call sites log this and
/// move on rather than propagate it.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("persisted state is corrupt: {reason}")]
    CorruptState { reason: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;
