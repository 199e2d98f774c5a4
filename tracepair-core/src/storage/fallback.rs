//! `FallbackBackend` - In-Process Storage
//!
//! `TigerStyle`: One lock over the map, the insertion order and the counter,
//! so concurrent creates never race on id assignment.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{BackendDetail, StorageMode, StoreStats, UserBackend};
use super::error::{StorageError, StorageResult};
use super::user::{NewUser, UserRecord};
use crate::constants::{USER_ID_FIRST, USER_ID_MAX};

/// Lock-guarded state.
#[derive(Debug)]
struct FallbackState {
    records: HashMap<u64, UserRecord>,
    /// Insertion order of live ids
    order: Vec<u64>,
    /// Always greater than any id ever inserted
    next_id: u64,
}

impl Default for FallbackState {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            next_id: USER_ID_FIRST,
        }
    }
}

/// In-memory user store used when the external store is unreachable.
///
/// Also serves as the upstream service's private buffer. Not persistent;
/// records never expire.
#[derive(Debug, Clone, Default)]
pub struct FallbackBackend {
    state: Arc<RwLock<FallbackState>>,
}

impl FallbackBackend {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next create without a caller-chosen id would get.
    pub async fn next_id(&self) -> u64 {
        self.state.read().await.next_id
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// True when no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl UserBackend for FallbackBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::Fallback
    }

    async fn list(&self) -> StorageResult<Vec<UserRecord>> {
        let state = self.state.read().await;
        Ok(state
            .order
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect())
    }

    #[tracing::instrument(skip(self, candidate), fields(requested_id = ?candidate.id))]
    async fn create(&self, candidate: NewUser) -> StorageResult<UserRecord> {
        candidate.validate()?;

        let mut state = self.state.write().await;
        let id = candidate.id.unwrap_or(state.next_id);
        if state.records.contains_key(&id) {
            return Err(StorageError::already_exists(id));
        }

        if id > USER_ID_MAX {
            return Err(StorageError::validation(format!("id space exhausted at {USER_ID_MAX}")));
        }
        let next_id = state
            .next_id
            .max(id)
            .checked_add(1)
            .ok_or_else(|| StorageError::validation(format!("no id follows {id}")))?;

        let record = candidate.into_record(id)?;
        state.records.insert(id, record.clone());
        state.order.push(id);
        state.next_id = next_id;

        // Postcondition
        assert!(state.next_id > id, "counter must stay ahead of every id");

        Ok(record)
    }

    async fn get(&self, id: u64) -> StorageResult<Option<UserRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn delete(&self, id: u64) -> StorageResult<bool> {
        let mut state = self.state.write().await;
        if state.records.remove(&id).is_none() {
            return Ok(false);
        }
        state.order.retain(|existing| *existing != id);
        Ok(true)
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        let count = self.len().await;
        Ok(StoreStats {
            total_users: count,
            storage: StorageMode::Fallback,
            detail: BackendDetail::Fallback { user_count: count },
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_first_id_is_one() {
        let backend = FallbackBackend::new();

        let user = assert_ok!(backend.create(NewUser::named("Ada")).await);

        assert_eq!(user.id, 1);
        assert_eq!(user.email, "");
        assert_eq!(backend.get(1).await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_ids_never_reused_after_delete() {
        let backend = FallbackBackend::new();
        backend.create(NewUser::named("a")).await.unwrap();
        let b = backend.create(NewUser::named("b")).await.unwrap();

        assert!(backend.delete(b.id).await.unwrap());
        let c = backend.create(NewUser::named("c")).await.unwrap();

        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_supplied_id_advances_counter() {
        let backend = FallbackBackend::new();

        backend.create(NewUser::named("a").with_id(10)).await.unwrap();
        let next = backend.create(NewUser::named("b")).await.unwrap();

        assert_eq!(next.id, 11);
        assert_eq!(backend.next_id().await, 12);
    }

    #[tokio::test]
    async fn test_lower_supplied_id_still_advances_counter() {
        let backend = FallbackBackend::new();
        backend.create(NewUser::named("a").with_id(5)).await.unwrap();

        backend.create(NewUser::named("b").with_id(2)).await.unwrap();

        assert_eq!(backend.next_id().await, 7);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let backend = FallbackBackend::new();
        backend.create(NewUser::named("a").with_id(4)).await.unwrap();

        let err = assert_err!(backend.create(NewUser::named("b").with_id(4)).await);

        assert!(matches!(err, StorageError::AlreadyExists { id: 4 }));
        assert_eq!(backend.get(4).await.unwrap().unwrap().name, "a");
    }

    #[tokio::test]
    async fn test_invalid_candidate_does_not_consume_id() {
        let backend = FallbackBackend::new();

        assert!(backend.create(NewUser::default()).await.is_err());

        assert_eq!(backend.next_id().await, 1);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_in_insertion_order() {
        let backend = FallbackBackend::new();
        backend.create(NewUser::named("x").with_id(9)).await.unwrap();
        backend.create(NewUser::named("y").with_id(3)).await.unwrap();
        backend.create(NewUser::named("z")).await.unwrap();

        let ids: Vec<u64> = backend.list().await.unwrap().iter().map(|u| u.id).collect();

        assert_eq!(ids, vec![9, 3, 11]);
    }

    #[tokio::test]
    async fn test_oversized_id_rejected_without_storing() {
        let backend = FallbackBackend::new();

        for id in [USER_ID_MAX + 1, u64::MAX - 1, u64::MAX] {
            let err = assert_err!(backend.create(NewUser::named("a").with_id(id)).await);
            assert!(matches!(err, StorageError::Validation { .. }));
        }

        assert!(backend.is_empty().await);
        assert_eq!(backend.next_id().await, 1);
    }

    #[tokio::test]
    async fn test_largest_id_then_auto_id() {
        let backend = FallbackBackend::new();
        assert_ok!(backend.create(NewUser::named("a").with_id(USER_ID_MAX - 1)).await);

        let next = assert_ok!(backend.create(NewUser::named("b")).await);

        assert_eq!(next.id, USER_ID_MAX);
        assert_eq!(backend.len().await, 2);

        let err = assert_err!(backend.create(NewUser::named("c")).await);
        assert!(matches!(err, StorageError::Validation { .. }));
        assert_eq!(backend.len().await, 2);
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let backend = FallbackBackend::new();
        assert!(!backend.delete(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_creates_get_unique_ids() {
        let backend = FallbackBackend::new();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let backend = backend.clone();
                tokio::spawn(async move {
                    backend
                        .create(NewUser::named(format!("user{i}")))
                        .await
                        .unwrap()
                        .id
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            assert!(ids.insert(handle.await.unwrap()), "duplicate id assigned");
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(backend.next_id().await, 65);
    }

    #[tokio::test]
    async fn test_stats() {
        let backend = FallbackBackend::new();
        backend.create(NewUser::named("a")).await.unwrap();

        let stats = backend.stats().await.unwrap();

        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.storage, StorageMode::Fallback);
        assert_eq!(stats.detail, BackendDetail::Fallback { user_count: 1 });
    }
}
