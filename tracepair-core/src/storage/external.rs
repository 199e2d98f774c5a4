//! ExternalBackend - Redis Storage
//!
//! TigerStyle: Real key-value storage with per-key expiry.
//!
//! # Layout
//!
//! ```text
//! user:<id>        HASH { id, name, email, created_at }   EXPIRE 3600
//! users:next_id    STRING counter (no expiry)
//! ```
//!
//! Creates run as one server-side script so id allocation, the existence
//! check and the write cannot interleave with another create.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult, Script};

use super::backend::{BackendDetail, StorageMode, StoreStats, UserBackend};
use super::error::{StorageError, StorageResult};
use super::user::{unix_now_secs, NewUser, UserRecord};
use crate::constants::{
    STORE_HOST_DEFAULT, STORE_OPERATION_TIMEOUT_MS, STORE_PORT_DEFAULT, USER_ID_SEQUENCE_KEY,
    USER_KEY_PATTERN, USER_KEY_PREFIX, USER_RECORD_TTL_SECS,
};

/// Allocate or bump the id sequence, refuse taken ids, write the hash.
///
/// Returns the id, or its negation when the key already exists.
const CREATE_USER_LUA: &str = r"
local id = ARGV[1]
local seq = tonumber(redis.call('GET', KEYS[1]) or '0')
if id == '' then
  id = tostring(redis.call('INCR', KEYS[1]))
elseif tonumber(id) > seq then
  redis.call('SET', KEYS[1], id)
end
local key = ARGV[6] .. id
if redis.call('EXISTS', key) == 1 then
  return -tonumber(id)
end
redis.call('HSET', key, 'id', id, 'name', ARGV[2], 'email', ARGV[3], 'created_at', ARGV[4])
redis.call('EXPIRE', key, ARGV[5])
return tonumber(id)
";

static CREATE_USER_SCRIPT: Lazy<Script> = Lazy::new(|| Script::new(CREATE_USER_LUA));

/// Hash key for a user id.
#[must_use]
pub fn user_key(id: u64) -> String {
    format!("{USER_KEY_PREFIX}{id}")
}

// =============================================================================
// Configuration
// =============================================================================

/// Where the external store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalStoreConfig {
    /// Host name or address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Default for ExternalStoreConfig {
    fn default() -> Self {
        Self {
            host: STORE_HOST_DEFAULT.to_string(),
            port: STORE_PORT_DEFAULT,
        }
    }
}

impl ExternalStoreConfig {
    /// Config for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, for logs.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

// =============================================================================
// ExternalBackend
// =============================================================================

/// Redis storage backend.
///
/// Holds one multiplexed connection shared by every request; commands that
/// block or open a transaction must use [`ExternalBackend::dedicated_connection`].
#[derive(Clone)]
pub struct ExternalBackend {
    client: Client,
    conn: MultiplexedConnection,
    address: String,
    operation_timeout: Duration,
}

impl std::fmt::Debug for ExternalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalBackend")
            .field("address", &self.address)
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}

impl ExternalBackend {
    /// Connect and `PING`, bounded by `timeout`.
    ///
    /// # Errors
    /// Returns `Unavailable` if the URL is invalid, the connection fails or
    /// the server does not answer the ping; `Timeout` if `timeout` elapses.
    pub async fn connect(config: &ExternalStoreConfig, timeout: Duration) -> StorageResult<Self> {
        let client = Client::open(config.url()).map_err(|e| StorageError::from(("connect", e)))?;

        let attempt = async {
            let mut conn = client.get_multiplexed_async_connection().await?;
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(conn)
        };

        let conn = tokio::time::timeout(timeout, attempt)
            .await
            .map_err(|_| StorageError::timeout("connect", duration_ms(timeout)))?
            .map_err(|e| StorageError::from(("connect", e)))?;

        Ok(Self {
            client,
            conn,
            address: config.address(),
            operation_timeout: Duration::from_millis(STORE_OPERATION_TIMEOUT_MS),
        })
    }

    /// `host:port` of the server.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Handle to the shared connection.
    #[must_use]
    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    /// A fresh connection nobody else writes to.
    ///
    /// # Errors
    /// Returns the client error if the connection cannot be opened.
    pub async fn dedicated_connection(&self) -> RedisResult<MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// Remove every user hash and the id sequence.
    ///
    /// Primarily for testing.
    ///
    /// # Errors
    /// Returns `Unavailable`/`Timeout` on backend failure.
    pub async fn clear(&self) -> StorageResult<()> {
        let mut conn = self.connection();
        let mut keys: Vec<String> = self
            .bounded("clear", USER_KEY_PATTERN, conn.keys(USER_KEY_PATTERN))
            .await?;
        keys.push(USER_ID_SEQUENCE_KEY.to_string());

        let _removed: i64 = self.bounded("clear", USER_KEY_PATTERN, conn.del(&keys)).await?;
        Ok(())
    }

    /// Run one store command under the operation timeout, logging failures
    /// with operation, key and mode.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        key: &str,
        command: impl Future<Output = RedisResult<T>>,
    ) -> StorageResult<T> {
        match tokio::time::timeout(self.operation_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(
                    operation,
                    key,
                    mode = %StorageMode::External,
                    error = %e,
                    "external store operation failed"
                );
                Err(StorageError::from((operation, e)))
            }
            Err(_) => {
                tracing::error!(
                    operation,
                    key,
                    mode = %StorageMode::External,
                    timeout_ms = duration_ms(self.operation_timeout),
                    "external store operation timed out"
                );
                Err(StorageError::timeout(
                    operation,
                    duration_ms(self.operation_timeout),
                ))
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl UserBackend for ExternalBackend {
    fn mode(&self) -> StorageMode {
        StorageMode::External
    }

    #[tracing::instrument(skip(self), fields(address = %self.address))]
    async fn list(&self) -> StorageResult<Vec<UserRecord>> {
        let mut conn = self.connection();
        let keys: Vec<String> = self
            .bounded("list", USER_KEY_PATTERN, conn.keys(USER_KEY_PATTERN))
            .await?;

        let mut users = Vec::with_capacity(keys.len());
        for key in &keys {
            let fields: HashMap<String, String> =
                self.bounded("list", key, conn.hgetall(key)).await?;
            // Expired between KEYS and HGETALL
            if fields.is_empty() {
                continue;
            }
            users.push(UserRecord::from_fields(&fields));
        }

        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    #[tracing::instrument(
        skip(self, candidate),
        fields(address = %self.address, requested_id = ?candidate.id)
    )]
    async fn create(&self, candidate: NewUser) -> StorageResult<UserRecord> {
        candidate.validate()?;

        let requested = candidate.id.map(|id| id.to_string()).unwrap_or_default();
        let name = candidate.name.unwrap_or_default();
        let email = candidate.email.unwrap_or_default();
        let created_at = candidate.created_at.unwrap_or_else(unix_now_secs);

        let mut invocation = CREATE_USER_SCRIPT.key(USER_ID_SEQUENCE_KEY);
        invocation
            .arg(&requested)
            .arg(&name)
            .arg(&email)
            .arg(created_at.to_string())
            .arg(USER_RECORD_TTL_SECS)
            .arg(USER_KEY_PREFIX);

        let mut conn = self.connection();
        let key = format!("{USER_KEY_PREFIX}{requested}");
        let assigned: i64 = self
            .bounded("create", &key, invocation.invoke_async(&mut conn))
            .await?;

        if assigned < 0 {
            return Err(StorageError::already_exists(assigned.unsigned_abs()));
        }
        let id = u64::try_from(assigned).map_err(|_| {
            StorageError::unavailable("create", StorageMode::External, "invalid id from store")
        })?;

        Ok(UserRecord {
            id,
            name,
            email,
            created_at,
        })
    }

    async fn get(&self, id: u64) -> StorageResult<Option<UserRecord>> {
        let key = user_key(id);
        let mut conn = self.connection();
        let fields: HashMap<String, String> = self.bounded("get", &key, conn.hgetall(&key)).await?;

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(UserRecord::from_fields(&fields)))
    }

    async fn delete(&self, id: u64) -> StorageResult<bool> {
        let key = user_key(id);
        let mut conn = self.connection();
        let removed: i64 = self.bounded("delete", &key, conn.del(&key)).await?;
        Ok(removed > 0)
    }

    async fn stats(&self) -> StorageResult<StoreStats> {
        let mut conn = self.connection();
        let keys: Vec<String> = self
            .bounded("stats", USER_KEY_PATTERN, conn.keys(USER_KEY_PATTERN))
            .await?;
        let info: redis::InfoDict = self
            .bounded("stats", "INFO", redis::cmd("INFO").query_async(&mut conn))
            .await?;

        Ok(StoreStats {
            total_users: keys.len(),
            storage: StorageMode::External,
            detail: BackendDetail::External {
                used_memory: info
                    .get::<String>("used_memory_human")
                    .unwrap_or_else(|| "N/A".to_string()),
                connected_clients: info.get::<u64>("connected_clients").unwrap_or_default(),
            },
        })
    }
}

// =============================================================================
// Tests (require running Redis)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Test server from the environment, as `host:port`.
    fn test_store_config() -> Option<ExternalStoreConfig> {
        let addr = env::var("TEST_REDIS_ADDR").ok()?;
        let (host, port) = addr.rsplit_once(':')?;
        Some(ExternalStoreConfig::new(host, port.parse().ok()?))
    }

    /// Skip test if no server available.
    macro_rules! require_redis {
        () => {
            match test_store_config() {
                Some(config) => {
                    let backend = ExternalBackend::connect(&config, Duration::from_secs(2))
                        .await
                        .unwrap();
                    backend.clear().await.unwrap();
                    backend
                }
                None => {
                    eprintln!("Skipping test: TEST_REDIS_ADDR not set");
                    return;
                }
            }
        };
    }

    #[test]
    fn test_config_url() {
        let config = ExternalStoreConfig::new("cache", 6380);
        assert_eq!(config.url(), "redis://cache:6380/");
        assert_eq!(config.address(), "cache:6380");
        assert_eq!(ExternalStoreConfig::default().address(), "localhost:6379");
    }

    #[test]
    fn test_user_key_outside_sequence_pattern() {
        assert_eq!(user_key(3), "user:3");
        assert!(!USER_ID_SEQUENCE_KEY.starts_with(USER_KEY_PREFIX));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let config = ExternalStoreConfig::new("127.0.0.1", 1);

        let result = ExternalBackend::connect(&config, Duration::from_secs(2)).await;

        assert!(result.unwrap_err().is_unavailable());
    }

    #[tokio::test]
    async fn test_redis_crud() {
        let backend = require_redis!();

        let user = backend.create(NewUser::named("Ada")).await.unwrap();
        assert_eq!(user.id, 1);

        let fetched = backend.get(user.id).await.unwrap().unwrap();
        assert!(fetched.same_identity(&user));

        assert!(backend.delete(user.id).await.unwrap());
        assert!(backend.get(user.id).await.unwrap().is_none());
        assert!(!backend.delete(user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_redis_sequence_follows_supplied_ids() {
        let backend = require_redis!();

        backend.create(NewUser::named("a").with_id(41)).await.unwrap();
        let next = backend.create(NewUser::named("b")).await.unwrap();

        assert_eq!(next.id, 42);
    }

    #[tokio::test]
    async fn test_redis_duplicate_rejected() {
        let backend = require_redis!();
        backend.create(NewUser::named("a").with_id(5)).await.unwrap();

        let err = backend.create(NewUser::named("b").with_id(5)).await.unwrap_err();

        assert!(matches!(err, StorageError::AlreadyExists { id: 5 }));
    }

    #[tokio::test]
    async fn test_redis_list_sorted_and_ttl_set() {
        let backend = require_redis!();
        backend.create(NewUser::named("b").with_id(2)).await.unwrap();
        backend.create(NewUser::named("a").with_id(1)).await.unwrap();

        let ids: Vec<u64> = backend.list().await.unwrap().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let mut conn = backend.connection();
        let ttl: i64 = conn.ttl(user_key(1)).await.unwrap();
        assert!(ttl > 0 && ttl <= USER_RECORD_TTL_SECS);
    }

    #[tokio::test]
    async fn test_redis_list_keeps_partial_records() {
        let backend = require_redis!();
        let mut conn = backend.connection();
        let _: () = conn.hset(user_key(9), "name", "partial").await.unwrap();

        let users = backend.list().await.unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 0);
        assert_eq!(users[0].name, "partial");
        assert_eq!(users[0].email, "");
    }

    #[tokio::test]
    async fn test_redis_stats() {
        let backend = require_redis!();
        backend.create(NewUser::named("a")).await.unwrap();

        let stats = backend.stats().await.unwrap();

        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.storage, StorageMode::External);
        assert!(matches!(stats.detail, BackendDetail::External { .. }));
    }
}
