use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the pure data-model and change-detection layer.
///
/// Maps to the `IOError` / `StateError`(validation half) tags in the error
/// taxonomy; `ScannerError`/`StorageError` live one layer up in
/// `coderadar-engine` since this crate has no Scanner/VectorStore of its own.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to walk repository: {0}")]
    Walk(#[from] ignore::Error),

    #[error("failed to hash {path}: {reason}")]
    Hashing { path: PathBuf, reason: String },

    #[error("invalid exclude pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("validation failed: {reason}")]
    Validation { reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
