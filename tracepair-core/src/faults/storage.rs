//! Storage Faults
//!
//! TigerStyle: Store scenarios run against the facade's own server. Blocking
//! and transactional sequences get a dedicated connection so they never
//! interleave with CRUD traffic on the shared one.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::ser::{Error as _, SerializeStruct};
use serde::{Serialize, Serializer};
use tokio::sync::Semaphore;

use super::catalog::{FaultContext, FaultUnit};
use super::error::{FaultError, FaultResult};
use crate::constants::{
    ERRNO_ACCESS_DENIED, ERRNO_NO_SPACE, FAULT_CORRUPTED_KEY, FAULT_CORRUPTED_PAYLOAD,
    FAULT_CRITICAL_KEY, FAULT_OVERSIZED_KEY, FAULT_OVERSIZED_VALUE_BYTES,
    FAULT_POOL_CONNECTIONS_COUNT, FAULT_STORE_CONNECT_TIMEOUT_MS, FAULT_STORE_SLEEP_SECS,
    FAULT_STORE_TIMEOUT_MS, FAULT_TRANSACTION_KEYS,
};

// =============================================================================
// Connectivity
// =============================================================================

pub(super) struct ConnectionError;

#[async_trait]
impl FaultUnit for ConnectionError {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let url = ctx.unreachable_store_url();
        let client = redis::Client::open(url)?;

        let attempt = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            redis::cmd("PING").query_async::<_, String>(&mut conn).await
        };

        match tokio::time::timeout(Duration::from_millis(FAULT_STORE_CONNECT_TIMEOUT_MS), attempt)
            .await
        {
            Ok(Ok(_pong)) => Ok(format!("connected to {url}")),
            Ok(Err(e)) => Err(FaultError::StoreConnection(format!("{url}: {e}"))),
            Err(_) => Err(FaultError::StoreConnection(format!(
                "{url}: no answer within {FAULT_STORE_CONNECT_TIMEOUT_MS}ms"
            ))),
        }
    }
}

pub(super) struct StoreTimeout;

#[async_trait]
impl FaultUnit for StoreTimeout {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let external = ctx.external("redis_timeout")?;
        let mut conn = external.dedicated_connection().await?;

        let mut cmd = redis::cmd("DEBUG");
        cmd.arg("SLEEP").arg(FAULT_STORE_SLEEP_SECS);
        let sleep = cmd.query_async::<_, ()>(&mut conn);

        // Dropping the future abandons the dedicated connection with it
        tokio::time::timeout(Duration::from_millis(FAULT_STORE_TIMEOUT_MS), sleep)
            .await
            .map_err(|_| FaultError::timeout("store command", FAULT_STORE_TIMEOUT_MS))??;
        Ok("store operation completed".to_string())
    }
}

pub(super) struct PoolExhausted;

#[async_trait]
impl FaultUnit for PoolExhausted {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let capacity = FAULT_POOL_CONNECTIONS_COUNT;
        let exhausted = || FaultError::PoolExhausted { capacity };
        let pool = Semaphore::new(capacity as usize);

        let _in_use = pool.try_acquire_many(capacity).map_err(|_| exhausted())?;
        debug_assert_eq!(pool.available_permits(), 0);

        let _extra = pool.try_acquire().map_err(|_| exhausted())?;
        Ok("acquired a connection past capacity".to_string())
    }
}

// =============================================================================
// Data
// =============================================================================

pub(super) struct MemoryPressure;

#[async_trait]
impl FaultUnit for MemoryPressure {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let external = ctx.external("redis_memory_error")?;
        let mut conn = external.connection();
        let value = "x".repeat(FAULT_OVERSIZED_VALUE_BYTES);

        conn.set::<_, _, ()>(FAULT_OVERSIZED_KEY, value)
            .await
            .map_err(|e| FaultError::StoreMemory(e.to_string()))?;
        let _removed: i64 = conn.del(FAULT_OVERSIZED_KEY).await?;

        Ok(format!(
            "stored and removed {FAULT_OVERSIZED_VALUE_BYTES} bytes under {FAULT_OVERSIZED_KEY}"
        ))
    }
}

pub(super) struct DataCorruption;

#[async_trait]
impl FaultUnit for DataCorruption {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let raw = match ctx.external("data_corruption") {
            Ok(external) => {
                let mut conn = external.connection();
                conn.set::<_, _, ()>(FAULT_CORRUPTED_KEY, FAULT_CORRUPTED_PAYLOAD)
                    .await?;
                conn.get::<_, String>(FAULT_CORRUPTED_KEY).await?
            }
            Err(_) => FAULT_CORRUPTED_PAYLOAD.to_string(),
        };

        let parsed: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| FaultError::decode("data corruption detected in user data", e))?;
        Ok(parsed.to_string())
    }
}

/// A session snapshot that still owns an open file.
struct SessionSnapshot {
    user: &'static str,
    handle: std::fs::File,
}

impl Serialize for SessionSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SessionSnapshot", 2)?;
        state.serialize_field("user", self.user)?;
        Err(S::Error::custom(format!(
            "cannot serialize field `handle`: open file {:?} has no serialized form",
            self.handle
        )))
    }
}

pub(super) struct SerializationError;

#[async_trait]
impl FaultUnit for SerializationError {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        let snapshot = SessionSnapshot {
            user: "ada",
            handle: tempfile::tempfile().map_err(|e| FaultError::io("open scratch file", e))?,
        };

        serde_json::to_string(&snapshot).map_err(FaultError::Serialization)
    }
}

pub(super) struct KeyNotFound;

#[async_trait]
impl FaultUnit for KeyNotFound {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let external = ctx.external("key_not_found")?;
        let mut conn = external.connection();

        let value: Option<String> = conn.get(FAULT_CRITICAL_KEY).await?;
        match value {
            Some(value) => Ok(format!("{FAULT_CRITICAL_KEY} = {value}")),
            None => Err(FaultError::KeyNotFound {
                key: FAULT_CRITICAL_KEY,
            }),
        }
    }
}

pub(super) struct TransactionRollback;

#[async_trait]
impl FaultUnit for TransactionRollback {
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String> {
        let external = ctx.external("transaction_rollback")?;
        let mut conn = external.dedicated_connection().await?;

        redis::cmd("MULTI").query_async::<_, ()>(&mut conn).await?;
        let [first, _second] = FAULT_TRANSACTION_KEYS;
        redis::cmd("SET")
            .arg(first)
            .arg("value1")
            .query_async::<_, ()>(&mut conn)
            .await?;

        // Second step fails before it is queued
        redis::cmd("DISCARD").query_async::<_, ()>(&mut conn).await?;

        let visible: i64 = redis::cmd("EXISTS")
            .arg(&FAULT_TRANSACTION_KEYS[..])
            .query_async(&mut conn)
            .await?;
        if visible > 0 {
            return Err(FaultError::Rollback {
                reason: format!("discard left {visible} staged keys visible"),
            });
        }

        Err(FaultError::Rollback {
            reason: "Transaction failed at step 2".to_string(),
        })
    }
}

// =============================================================================
// Host
// =============================================================================

pub(super) struct DiskFull;

#[async_trait]
impl FaultUnit for DiskFull {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        Err(FaultError::io(
            "cannot write to database",
            io::Error::from_raw_os_error(ERRNO_NO_SPACE),
        ))
    }
}

pub(super) struct PermissionDenied;

#[async_trait]
impl FaultUnit for PermissionDenied {
    async fn induce(&self, _ctx: &FaultContext) -> FaultResult<String> {
        Err(FaultError::io(
            "cannot access database files",
            io::Error::from_raw_os_error(ERRNO_ACCESS_DENIED),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::latency::LatencyProfile;
    use crate::storage::{ExternalBackend, ExternalStoreConfig, UserStore};

    async fn induce_detached(unit: impl FaultUnit) -> FaultError {
        unit.induce(&FaultContext::detached()).await.unwrap_err()
    }

    /// Context bound to the test server, if one is configured.
    async fn attached_context() -> Option<FaultContext> {
        let addr = std::env::var("TEST_REDIS_ADDR").ok()?;
        let (host, port) = addr.rsplit_once(':')?;
        let config = ExternalStoreConfig::new(host, port.parse().ok()?);
        let backend = ExternalBackend::connect(&config, Duration::from_secs(2))
            .await
            .ok()?;
        Some(FaultContext::new(&UserStore::external(
            backend,
            LatencyProfile::disabled(),
        )))
    }

    macro_rules! require_redis {
        () => {
            match attached_context().await {
                Some(ctx) => ctx,
                None => {
                    eprintln!("Skipping test: TEST_REDIS_ADDR not set");
                    return;
                }
            }
        };
    }

    #[tokio::test]
    async fn test_connection_error_refused() {
        let ctx = FaultContext::detached().with_unreachable_store("redis://127.0.0.1:1/");

        let err = ConnectionError.induce(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), "store_connection");
    }

    #[tokio::test]
    async fn test_detached_store_scenarios_report_directly() {
        for err in [
            induce_detached(StoreTimeout).await,
            induce_detached(MemoryPressure).await,
            induce_detached(KeyNotFound).await,
            induce_detached(TransactionRollback).await,
        ] {
            assert!(matches!(err, FaultError::StoreDetached { .. }), "{err}");
        }
    }

    #[tokio::test]
    async fn test_data_corruption_detached_still_parses() {
        let err = induce_detached(DataCorruption).await;
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_serialization_error() {
        let err = induce_detached(SerializationError).await;
        assert_eq!(err.kind(), "serialization");
        assert!(err.to_string().contains("handle"));
    }

    #[tokio::test]
    async fn test_pool_exhausted() {
        let err = induce_detached(PoolExhausted).await;
        assert!(matches!(
            err,
            FaultError::PoolExhausted {
                capacity: FAULT_POOL_CONNECTIONS_COUNT
            }
        ));
    }

    #[tokio::test]
    async fn test_host_errors() {
        let full = induce_detached(DiskFull).await;
        assert_eq!(full.kind(), "disk_full");

        let denied = induce_detached(PermissionDenied).await;
        assert_eq!(denied.kind(), "permission_denied");
    }

    #[tokio::test]
    async fn test_redis_key_not_found() {
        let ctx = require_redis!();
        let mut conn = ctx.external("test").unwrap().connection();
        let _: i64 = conn.del(FAULT_CRITICAL_KEY).await.unwrap();

        let err = KeyNotFound.induce(&ctx).await.unwrap_err();

        assert!(matches!(err, FaultError::KeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_redis_timeout_cut_off_client_side() {
        let ctx = require_redis!();

        let err = StoreTimeout.induce(&ctx).await.unwrap_err();

        assert!(
            matches!(
                err,
                FaultError::Timeout {
                    duration_ms: FAULT_STORE_TIMEOUT_MS,
                    ..
                }
            ),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_redis_rollback_leaves_nothing() {
        let ctx = require_redis!();

        let err = TransactionRollback.induce(&ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "transaction rolled back: Transaction failed at step 2");
        let mut conn = ctx.external("test").unwrap().connection();
        let value: Option<String> = conn.get(FAULT_TRANSACTION_KEYS[0]).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_redis_data_corruption_leaves_key() {
        let ctx = require_redis!();

        let err = DataCorruption.induce(&ctx).await.unwrap_err();

        assert_eq!(err.kind(), "decode");
        let mut conn = ctx.external("test").unwrap().connection();
        let raw: String = conn.get(FAULT_CORRUPTED_KEY).await.unwrap();
        assert_eq!(raw, FAULT_CORRUPTED_PAYLOAD);
    }
}
