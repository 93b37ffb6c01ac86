//! Error types for csvstore core.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in record store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Blob store error.
    #[error("storage error: {0}")]
    Storage(#[from] csvstore_storage::StorageError),

    /// Delimited text could not be parsed or printed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid dialect or schema configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The file header lacks a required column.
    #[error("schema error: {message}")]
    Schema {
        /// Description of the problem.
        message: String,
    },

    /// A row's cell count does not match the header.
    #[error("row {row} has {actual} columns but the header has {expected}")]
    RecordShape {
        /// Line number of the offending row.
        row: u64,
        /// Number of header columns.
        expected: usize,
        /// Number of cells in the row.
        actual: usize,
    },

    /// A snapshot header differs from the store header.
    #[error("header mismatch: {message}")]
    HeaderMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A unique attribute value occurs more than once.
    #[error("unique attribute value '{uid}' already exists")]
    DuplicateKey {
        /// The duplicated value.
        uid: String,
    },

    /// No row carries the requested unique attribute value.
    #[error("object '{uid}' not found")]
    NotFound {
        /// The value that was looked up.
        uid: String,
    },

    /// Two supplied values for the same column disagree.
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// A read-only store was given an attribute it does not know.
    #[error("unknown attribute '{name}'")]
    UnknownAttribute {
        /// The attribute name.
        name: String,
    },

    /// A required attribute was not supplied.
    #[error("required attribute '{name}' has no value")]
    MissingAttribute {
        /// The attribute name.
        name: String,
    },

    /// A data row has an empty unique attribute.
    #[error("unique attribute not defined for row {row}")]
    MissingKey {
        /// Line number of the offending row.
        row: u64,
    },

    /// A mutating operation was issued against a read-only store.
    #[error("store is read-only, {operation} rejected")]
    ReadOnly {
        /// The rejected operation.
        operation: &'static str,
    },

    /// An argument is malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Username could not be resolved.
    #[error("invalid credential: {message}")]
    InvalidCredential {
        /// Description of the failure.
        message: String,
    },

    /// Password is missing or does not match.
    #[error("invalid password: {message}")]
    InvalidPassword {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Creates a header mismatch error.
    pub fn header_mismatch(message: impl Into<String>) -> Self {
        Self::HeaderMismatch {
            message: message.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(uid: impl Into<String>) -> Self {
        Self::DuplicateKey { uid: uid.into() }
    }

    /// Creates a not found error.
    pub fn not_found(uid: impl Into<String>) -> Self {
        Self::NotFound { uid: uid.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates an unknown attribute error.
    pub fn unknown_attribute(name: impl Into<String>) -> Self {
        Self::UnknownAttribute { name: name.into() }
    }

    /// Creates a missing attribute error.
    pub fn missing_attribute(name: impl Into<String>) -> Self {
        Self::MissingAttribute { name: name.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid credential error.
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates an invalid password error.
    pub fn invalid_password(message: impl Into<String>) -> Self {
        Self::InvalidPassword {
            message: message.into(),
        }
    }

    /// Returns true if the error is scoped to one operation and leaves the
    /// store usable.
    pub fn is_operation_scoped(&self) -> bool {
        matches!(
            self,
            CoreError::DuplicateKey { .. }
                | CoreError::NotFound { .. }
                | CoreError::Conflict { .. }
                | CoreError::UnknownAttribute { .. }
                | CoreError::MissingAttribute { .. }
                | CoreError::ReadOnly { .. }
                | CoreError::InvalidArgument { .. }
                | CoreError::InvalidCredential { .. }
                | CoreError::InvalidPassword { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_scoped_errors() {
        assert!(CoreError::duplicate_key("1").is_operation_scoped());
        assert!(CoreError::not_found("1").is_operation_scoped());
        assert!(CoreError::unknown_attribute("x").is_operation_scoped());
        assert!(!CoreError::schema("no id").is_operation_scoped());
        assert!(!CoreError::header_mismatch("differs").is_operation_scoped());
    }

    #[test]
    fn error_display() {
        let err = CoreError::RecordShape {
            row: 7,
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "row 7 has 2 columns but the header has 3");

        let err = CoreError::ReadOnly { operation: "create" };
        assert!(err.to_string().contains("create"));
    }
}
