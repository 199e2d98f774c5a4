//! Storage Backend Trait
//!
//! TigerStyle: Abstract interface for user storage.
//!
//! Both backends satisfy the same contract; the facade never branches on
//! which one it holds.

use async_trait::async_trait;
use serde::Serialize;

use super::error::StorageResult;
use super::user::{NewUser, UserRecord};

// =============================================================================
// StorageMode
// =============================================================================

/// Which backend the process is using. Decided once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageMode {
    /// External key-value store
    #[serde(rename = "redis")]
    External,
    /// In-process map
    #[serde(rename = "memory")]
    Fallback,
}

impl StorageMode {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "redis",
            Self::Fallback => "memory",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Backend-specific part of the stats report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BackendDetail {
    /// External store server info
    #[serde(rename = "redis_info")]
    External {
        /// Human-readable memory use
        used_memory: String,
        /// Clients connected to the server
        connected_clients: u64,
    },
    /// Fallback map info
    #[serde(rename = "memory_info")]
    Fallback {
        /// Records in the map
        user_count: usize,
    },
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    /// Live records
    pub total_users: usize,
    /// Backend in use
    pub storage: StorageMode,
    /// Backend detail, flattened as `redis_info` or `memory_info`
    #[serde(flatten)]
    pub detail: BackendDetail,
}

// =============================================================================
// UserBackend
// =============================================================================

/// Abstract storage backend for user records.
///
/// TigerStyle: All operations are async, return explicit errors.
#[async_trait]
pub trait UserBackend: Send + Sync {
    /// Mode this backend represents.
    fn mode(&self) -> StorageMode;

    /// All live records.
    async fn list(&self) -> StorageResult<Vec<UserRecord>>;

    /// Store a new record, assigning an id when the candidate has none.
    ///
    /// Fails with `AlreadyExists` if the id is taken.
    async fn create(&self, candidate: NewUser) -> StorageResult<UserRecord>;

    /// Get a record by id.
    ///
    /// Returns None if the record does not exist.
    async fn get(&self, id: u64) -> StorageResult<Option<UserRecord>>;

    /// Delete a record by id.
    ///
    /// Returns true if the record existed and was deleted.
    async fn delete(&self, id: u64) -> StorageResult<bool>;

    /// Count and backend detail.
    async fn stats(&self) -> StorageResult<StoreStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_wire_names() {
        assert_eq!(StorageMode::External.to_string(), "redis");
        assert_eq!(
            serde_json::to_value(StorageMode::Fallback).unwrap(),
            serde_json::json!("memory")
        );
    }

    #[test]
    fn test_stats_flatten_detail() {
        let stats = StoreStats {
            total_users: 2,
            storage: StorageMode::Fallback,
            detail: BackendDetail::Fallback { user_count: 2 },
        };

        let value = serde_json::to_value(&stats).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "total_users": 2,
                "storage": "memory",
                "memory_info": {"user_count": 2}
            })
        );
    }
}
