//! Error types for storage backends.

use thiserror::Error;

/// Result type for backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during backend operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed to complete the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The backend does not implement an optional capability.
    #[error("operation not supported by this backend: {0}")]
    Unsupported(&'static str),
}

impl StorageError {
    /// Creates a backend error from any displayable cause.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
