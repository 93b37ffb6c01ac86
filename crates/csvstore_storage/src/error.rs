//! Error types for blob store operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container holding the object does not exist.
    #[error("container not found: {container}")]
    ContainerNotFound {
        /// Name of the missing container.
        container: String,
    },

    /// The container or object name cannot be used by this store.
    #[error("invalid locator: {0}")]
    InvalidLocator(String),
}

impl StorageError {
    /// Creates an invalid locator error.
    pub fn invalid_locator(message: impl Into<String>) -> Self {
        Self::InvalidLocator(message.into())
    }
}
