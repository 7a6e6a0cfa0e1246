use thiserror::Error;

/// Errors from the event bus. This is the only source of `TimeoutError`
/// in the taxonomy.
#[derive(Debug, Error)]
pub enum EventError {
    #[error("emit of '{event}' timed out after {elapsed_ms}ms waiting for handlers")]
    Timeout { event: String, elapsed_ms: u64 },

    #[error("waitFor('{event}') timed out after {elapsed_ms}ms with no matching emit")]
    WaitForTimeout { event: String, elapsed_ms: u64 },
}

pub type Result<T> = std::result::Result<T, EventError>;
