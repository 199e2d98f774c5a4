//! Upstream Aggregator
//!
//! TigerStyle: The local buffer is authoritative. Downstream calls are
//! bounded, best-effort, and never turn into an upstream error.

use serde::Serialize;
use tracepair_core::{NewUser, StorageResult, UserRecord, UserStore};

use super::downstream::{DownstreamClient, DownstreamError};

/// `source` field of merged listings
pub const SOURCE: &str = "api-service";

/// Merged listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedUsers {
    /// Local records, then unseen downstream records
    pub users: Vec<UserRecord>,
    /// `users.len()`
    pub count: usize,
    /// Always `api-service`
    pub source: &'static str,
}

/// Local records followed by downstream records not identical to a local one.
#[must_use]
pub fn merge(local: Vec<UserRecord>, downstream: Vec<UserRecord>) -> Vec<UserRecord> {
    let mut merged = local;
    let local_count = merged.len();

    for record in downstream {
        if !merged[..local_count]
            .iter()
            .any(|existing| existing.same_identity(&record))
        {
            merged.push(record);
        }
    }

    assert!(merged.len() >= local_count);
    merged
}

/// Local buffer plus downstream forwarding.
#[derive(Debug, Clone)]
pub struct Aggregator {
    local: UserStore,
    downstream: DownstreamClient,
}

impl Aggregator {
    /// Aggregator over `local` forwarding to `downstream`.
    #[must_use]
    pub fn new(local: UserStore, downstream: DownstreamClient) -> Self {
        Self { local, downstream }
    }

    /// Local records merged with whatever downstream returns.
    ///
    /// # Errors
    /// Only local buffer failures; downstream failures degrade to local only.
    #[tracing::instrument(skip(self), fields(downstream = %self.downstream.base_url()))]
    pub async fn list_merged(&self) -> StorageResult<MergedUsers> {
        let local = self.local.list().await?;

        let users = match self.downstream.list_users().await {
            Ok(remote) => merge(local, remote),
            Err(e) => {
                log_downstream_failure("list", None, &e);
                local
            }
        };

        Ok(MergedUsers {
            count: users.len(),
            users,
            source: SOURCE,
        })
    }

    /// Store locally, then forward best-effort.
    ///
    /// Any client-supplied id is dropped; the local buffer assigns one.
    ///
    /// # Errors
    /// `Validation` for bad input.
    pub async fn create(&self, candidate: NewUser) -> StorageResult<UserRecord> {
        let user = self.local.create(candidate.without_id()).await?;

        match self.downstream.create_user(&user).await {
            Ok(()) => tracing::info!(id = user.id, "User forwarded to database service"),
            Err(e) => log_downstream_failure("create", Some(user.id), &e),
        }

        Ok(user)
    }

    /// Read from the local buffer only.
    ///
    /// # Errors
    /// `NotFound` if the buffer has no such record.
    pub async fn get(&self, id: u64) -> StorageResult<UserRecord> {
        self.local.get(id).await
    }

    /// Remove locally, then forward best-effort.
    ///
    /// # Errors
    /// `NotFound` if the buffer has no such record.
    pub async fn delete(&self, id: u64) -> StorageResult<()> {
        self.local.delete(id).await?;

        match self.downstream.delete_user(id).await {
            Ok(()) => tracing::info!(id, "User deleted from database service"),
            Err(e) => log_downstream_failure("delete", Some(id), &e),
        }

        Ok(())
    }
}

fn log_downstream_failure(operation: &'static str, id: Option<u64>, err: &DownstreamError) {
    tracing::warn!(
        operation,
        id = ?id,
        timeout = err.is_timeout(),
        error = %err,
        "Database service call failed; continuing with local data"
    );
}
