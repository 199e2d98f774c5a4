//! Storage Errors
//!
//! `TigerStyle`: Explicit error types with context.

use thiserror::Error;

use super::backend::StorageMode;

/// Errors from storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Bad client input
    #[error("{message}")]
    Validation {
        /// What was wrong
        message: String,
    },

    /// No record with this id (or it expired)
    #[error("User not found: {id}")]
    NotFound {
        /// Requested id
        id: u64,
    },

    /// A record already holds this id
    #[error("User already exists: {id}")]
    AlreadyExists {
        /// Conflicting id
        id: u64,
    },

    /// Backend I/O failure on a single operation
    #[error("storage unavailable during {operation} ({mode}): {message}")]
    Unavailable {
        /// Facade operation
        operation: &'static str,
        /// Mode the store is running in
        mode: StorageMode,
        /// Underlying failure
        message: String,
    },

    /// Backend did not answer in time
    #[error("storage {operation} timed out after {duration_ms}ms")]
    Timeout {
        /// Facade operation
        operation: &'static str,
        /// Duration in milliseconds
        duration_ms: u64,
    },
}

impl StorageError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(id: u64) -> Self {
        Self::NotFound { id }
    }

    /// Create an already exists error.
    #[must_use]
    pub fn already_exists(id: u64) -> Self {
        Self::AlreadyExists { id }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(
        operation: &'static str,
        mode: StorageMode,
        message: impl Into<String>,
    ) -> Self {
        Self::Unavailable {
            operation,
            mode,
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(operation: &'static str, duration_ms: u64) -> Self {
        Self::Timeout {
            operation,
            duration_ms,
        }
    }

    /// Backend failure rather than a caller mistake.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

impl From<(&'static str, redis::RedisError)> for StorageError {
    fn from((operation, err): (&'static str, redis::RedisError)) -> Self {
        Self::unavailable(operation, StorageMode::External, err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = StorageError::not_found(7);
        assert!(matches!(err, StorageError::NotFound { id } if id == 7));

        let err = StorageError::validation("Name is required");
        assert_eq!(err.to_string(), "Name is required");
    }

    #[test]
    fn test_is_unavailable() {
        assert!(StorageError::unavailable("list", StorageMode::External, "reset").is_unavailable());
        assert!(StorageError::timeout("get", 5000).is_unavailable());

        assert!(!StorageError::not_found(1).is_unavailable());
        assert!(!StorageError::validation("bad").is_unavailable());
        assert!(!StorageError::already_exists(1).is_unavailable());
    }

    #[test]
    fn test_redis_error_maps_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = StorageError::from(("create", redis::RedisError::from(io)));

        assert!(matches!(
            err,
            StorageError::Unavailable { operation: "create", mode: StorageMode::External, .. }
        ));
    }
}
