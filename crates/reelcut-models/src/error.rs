//! Error types for model construction.

use thiserror::Error;

use crate::timestamp::TimestampError;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building model values.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Duplicate action map timestamp: {0}ms")]
    DuplicateTimestamp(u64),

    #[error("Invalid timestamp: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("Invalid trim window: {0}")]
    InvalidWindow(String),
}
