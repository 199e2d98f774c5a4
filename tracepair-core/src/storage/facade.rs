//! UserStore - Storage Facade
//!
//! TigerStyle: The backend is chosen by the probe and then frozen. The mode
//! is derived from the backend variant, so the two can never disagree.

use std::sync::Arc;

use super::backend::{StorageMode, StoreStats, UserBackend};
use super::error::{StorageError, StorageResult};
use super::external::{ExternalBackend, ExternalStoreConfig};
use super::fallback::FallbackBackend;
use super::probe::probe;
use super::user::{NewUser, UserRecord};
use crate::latency::{LatencyProfile, Operation};

/// The selected backend.
#[derive(Debug, Clone)]
enum Backend {
    External(ExternalBackend),
    Fallback(FallbackBackend),
}

impl Backend {
    fn as_dyn(&self) -> &dyn UserBackend {
        match self {
            Self::External(backend) => backend,
            Self::Fallback(backend) => backend,
        }
    }
}

/// Backend-agnostic CRUD over user records.
///
/// Cheap to clone; clones share the same backend.
#[derive(Debug, Clone)]
pub struct UserStore {
    backend: Arc<Backend>,
    latency: LatencyProfile,
}

impl UserStore {
    /// Probe the external store and build the facade over whatever answered.
    pub async fn connect(config: &ExternalStoreConfig, latency: LatencyProfile) -> Self {
        match probe(config).await.into_external() {
            Some(external) => Self::external(external, latency),
            None => Self::fallback(latency),
        }
    }

    /// Facade over an already-connected external store.
    #[must_use]
    pub fn external(backend: ExternalBackend, latency: LatencyProfile) -> Self {
        Self {
            backend: Arc::new(Backend::External(backend)),
            latency,
        }
    }

    /// Facade over a fresh in-process store.
    #[must_use]
    pub fn fallback(latency: LatencyProfile) -> Self {
        Self::with_fallback(FallbackBackend::new(), latency)
    }

    /// Facade over an existing in-process store.
    #[must_use]
    pub fn with_fallback(backend: FallbackBackend, latency: LatencyProfile) -> Self {
        Self {
            backend: Arc::new(Backend::Fallback(backend)),
            latency,
        }
    }

    /// Mode decided at construction.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.backend.as_dyn().mode()
    }

    /// The external store, when that is the selected backend.
    #[must_use]
    pub fn external_backend(&self) -> Option<&ExternalBackend> {
        match self.backend.as_ref() {
            Backend::External(backend) => Some(backend),
            Backend::Fallback(_) => None,
        }
    }

    /// All live records.
    ///
    /// # Errors
    /// `Unavailable`/`Timeout` on backend failure.
    pub async fn list(&self) -> StorageResult<Vec<UserRecord>> {
        self.latency.pause(Operation::List).await;
        self.logged("list", None, self.backend.as_dyn().list().await)
    }

    /// Validate and store a new record.
    ///
    /// # Errors
    /// `Validation` for bad input, `AlreadyExists` for a taken id,
    /// `Unavailable`/`Timeout` on backend failure.
    pub async fn create(&self, candidate: NewUser) -> StorageResult<UserRecord> {
        candidate.validate()?;
        self.latency.pause(Operation::Create).await;
        let requested = candidate.id;
        self.logged("create", requested, self.backend.as_dyn().create(candidate).await)
    }

    /// Record with this id.
    ///
    /// # Errors
    /// `NotFound` if absent or expired, `Unavailable`/`Timeout` on backend failure.
    pub async fn get(&self, id: u64) -> StorageResult<UserRecord> {
        self.latency.pause(Operation::Get).await;
        self.logged("get", Some(id), self.backend.as_dyn().get(id).await)?
            .ok_or_else(|| StorageError::not_found(id))
    }

    /// Remove the record with this id.
    ///
    /// # Errors
    /// `NotFound` if absent, `Unavailable`/`Timeout` on backend failure.
    pub async fn delete(&self, id: u64) -> StorageResult<()> {
        self.latency.pause(Operation::Delete).await;
        if self.logged("delete", Some(id), self.backend.as_dyn().delete(id).await)? {
            Ok(())
        } else {
            Err(StorageError::not_found(id))
        }
    }

    /// Count and backend detail.
    ///
    /// # Errors
    /// `Unavailable`/`Timeout` on backend failure.
    pub async fn stats(&self) -> StorageResult<StoreStats> {
        self.logged("stats", None, self.backend.as_dyn().stats().await)
    }

    /// Log backend failures at the operation boundary.
    fn logged<T>(
        &self,
        operation: &'static str,
        id: Option<u64>,
        result: StorageResult<T>,
    ) -> StorageResult<T> {
        if let Err(e) = &result {
            if e.is_unavailable() {
                tracing::error!(
                    operation,
                    id = ?id,
                    mode = %self.mode(),
                    error = %e,
                    "storage operation failed"
                );
            }
        }
        result
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendDetail;
    use tokio_test::{assert_err, assert_ok};

    fn store() -> UserStore {
        UserStore::fallback(LatencyProfile::disabled())
    }

    #[tokio::test]
    async fn test_create_get_delete_cycle() {
        let store = store();

        let ada = assert_ok!(store.create(NewUser::named("Ada")).await);
        assert_eq!(ada.id, 1);
        assert_eq!(ada.name, "Ada");
        assert_eq!(ada.email, "");

        assert_eq!(assert_ok!(store.get(1).await), ada);

        assert_ok!(store.delete(1).await);
        let err = assert_err!(store.get(1).await);
        assert!(matches!(err, StorageError::NotFound { id: 1 }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let err = assert_err!(store().delete(3).await);
        assert!(matches!(err, StorageError::NotFound { id: 3 }));
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let store = store();

        let err = assert_err!(store.create(NewUser::named("")).await);

        assert!(matches!(err, StorageError::Validation { .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_id_past_max() {
        let store = store();

        let err = assert_err!(store.create(NewUser::named("a").with_id(u64::MAX - 1)).await);
        assert!(matches!(err, StorageError::Validation { .. }));

        let next = assert_ok!(store.create(NewUser::named("b")).await);
        assert_eq!(next.id, 1);
        assert_eq!(assert_ok!(store.list().await), vec![next]);
    }

    #[tokio::test]
    async fn test_created_ids_unique_and_readable() {
        let store = store();
        let mut seen = Vec::new();

        for i in 0..20 {
            let user = store.create(NewUser::named(format!("u{i}"))).await.unwrap();
            assert!(!seen.contains(&user.id));
            assert_eq!(store.get(user.id).await.unwrap(), user);
            seen.push(user.id);
        }
    }

    #[tokio::test]
    async fn test_fallback_mode_is_fixed() {
        let store = UserStore::connect(
            &ExternalStoreConfig::new("127.0.0.1", 1),
            LatencyProfile::disabled(),
        )
        .await;

        assert_eq!(store.mode(), StorageMode::Fallback);
        assert!(store.external_backend().is_none());

        store.create(NewUser::named("Ada")).await.unwrap();
        let clone = store.clone();
        assert_eq!(clone.mode(), StorageMode::Fallback);
        assert_eq!(clone.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_fallback() {
        let store = store();
        store.create(NewUser::named("a")).await.unwrap();
        store.create(NewUser::named("b")).await.unwrap();

        let stats = store.stats().await.unwrap();

        assert_eq!(stats.total_users, 2);
        assert_eq!(stats.detail, BackendDetail::Fallback { user_count: 2 });
    }
}
