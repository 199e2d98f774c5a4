//! Fault Errors
//!
//! `TigerStyle`: One variant per fault class so monitors can group on `kind()`.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::constants::ERRNO_NO_SPACE;

/// Failures produced by fault scenarios, plus the catalog's own lookup error.
#[derive(Debug, Error)]
pub enum FaultError {
    /// No scenario with this name in the requested category
    #[error("Unknown error type: {name}. Use the list mode to see available types.")]
    UnknownScenario {
        /// Requested name
        name: String,
    },

    /// A runtime panic caught at the unit boundary
    #[error("runtime panic: {message}")]
    Panic {
        /// Panic payload
        message: String,
    },

    /// Value conversion failed
    #[error("invalid literal for integer conversion: {0}")]
    Conversion(#[from] std::num::ParseIntError),

    /// Work did not finish before its wall-clock cutoff
    #[error("{what} timed out after {duration_ms}ms")]
    Timeout {
        /// What was cut off
        what: &'static str,
        /// Cutoff in milliseconds
        duration_ms: u64,
    },

    /// The allocator refused a request
    #[error("failed to allocate {bytes} bytes: {source}")]
    Allocation {
        /// Requested size
        bytes: usize,
        /// Allocator error
        source: TryReserveError,
    },

    /// Filesystem or OS-level failure
    #[error("{context}: {source}")]
    Io {
        /// What was attempted
        context: &'static str,
        /// OS error
        source: std::io::Error,
    },

    /// Structured text could not be parsed
    #[error("{context}: {source}")]
    Decode {
        /// What was being parsed
        context: &'static str,
        /// Parser error
        source: serde_json::Error,
    },

    /// A value could not be serialized
    #[error("serialization failed: {0}")]
    Serialization(serde_json::Error),

    /// Outbound HTTP request failed
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Input rejected by a validation rule
    #[error("{0}")]
    Validation(String),

    /// Application-defined error with a code
    #[error("[{code}] {message}")]
    Custom {
        /// Stable error code
        code: &'static str,
        /// Human-readable message
        message: String,
    },

    /// A spawned task reported failure
    #[error("async operation failed in background task: {0}")]
    Background(String),

    /// External store could not be reached
    #[error("store connection failed: {0}")]
    StoreConnection(String),

    /// External store rejected or failed a command
    #[error("store command failed: {0}")]
    Store(#[from] redis::RedisError),

    /// The process runs without an external store
    #[error("{scenario} needs the external store, which is not available")]
    StoreDetached {
        /// Scenario that needed it
        scenario: &'static str,
    },

    /// External store ran out of memory
    #[error("store memory error: {0}")]
    StoreMemory(String),

    /// A critical key is missing
    #[error("critical configuration key '{key}' not found")]
    KeyNotFound {
        /// Missing key
        key: &'static str,
    },

    /// A multi-step write was aborted
    #[error("transaction rolled back: {reason}")]
    Rollback {
        /// Why it was aborted
        reason: String,
    },

    /// Every connection in a bounded pool is in use
    #[error("connection pool exhausted - all {capacity} connections in use")]
    PoolExhausted {
        /// Pool size
        capacity: u32,
    },
}

impl FaultError {
    /// Create an I/O error with context.
    #[must_use]
    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Create a decode error with context.
    #[must_use]
    pub fn decode(context: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { context, source }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(what: &'static str, duration_ms: u64) -> Self {
        Self::Timeout { what, duration_ms }
    }

    /// Stable class name, used as the `fault` field in responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownScenario { .. } => "unknown_scenario",
            Self::Panic { .. } => "panic",
            Self::Conversion(_) => "conversion",
            Self::Timeout { .. } => "timeout",
            Self::Allocation { .. } => "allocation",
            Self::Io { source, .. } => match (source.raw_os_error(), source.kind()) {
                (Some(ERRNO_NO_SPACE), _) => "disk_full",
                (_, std::io::ErrorKind::NotFound) => "not_found",
                (_, std::io::ErrorKind::PermissionDenied) => "permission_denied",
                _ => "io",
            },
            Self::Decode { .. } => "decode",
            Self::Serialization(_) => "serialization",
            Self::Network(e) if e.is_timeout() => "network_timeout",
            Self::Network(_) => "network",
            Self::Validation(_) => "validation",
            Self::Custom { .. } => "custom",
            Self::Background(_) => "background",
            Self::StoreConnection(_) => "store_connection",
            Self::Store(_) => "store",
            Self::StoreDetached { .. } => "store_detached",
            Self::StoreMemory(_) => "store_memory",
            Self::KeyNotFound { .. } => "key_not_found",
            Self::Rollback { .. } => "rollback",
            Self::PoolExhausted { .. } => "pool_exhausted",
        }
    }

    /// True only for a bad lookup; everything else is a raised fault.
    #[must_use]
    pub fn is_unknown_scenario(&self) -> bool {
        matches!(self, Self::UnknownScenario { .. })
    }
}

/// Result type for fault units.
pub type FaultResult<T> = Result<T, FaultError>;
