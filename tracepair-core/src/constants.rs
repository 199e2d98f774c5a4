//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`.
//! Every constant carries its unit in the name (`_MS`, `_SECS`, `_BYTES`).

// =============================================================================
// User Records
// =============================================================================

/// Maximum length of a user name
pub const USER_NAME_BYTES_MAX: usize = 256;

/// Maximum length of a user email
pub const USER_EMAIL_BYTES_MAX: usize = 256;

/// First id handed out by a fresh store
pub const USER_ID_FIRST: u64 = 1;

/// Largest accepted id; the store's server-side scripts hold ids as doubles
pub const USER_ID_MAX: u64 = (1 << 53) - 1;

// =============================================================================
// External Store Layout
// =============================================================================

/// Key prefix for user hashes (`user:<id>`)
pub const USER_KEY_PREFIX: &str = "user:";

/// Pattern matching every user hash
pub const USER_KEY_PATTERN: &str = "user:*";

/// Id sequence key; deliberately outside `USER_KEY_PATTERN`
pub const USER_ID_SEQUENCE_KEY: &str = "users:next_id";

/// Expiry applied to every user hash
pub const USER_RECORD_TTL_SECS: i64 = 3600;

/// Default external store host
pub const STORE_HOST_DEFAULT: &str = "localhost";

/// Default external store port
pub const STORE_PORT_DEFAULT: u16 = 6379;

/// Upper bound for the startup probe (connect + PING)
pub const STORE_PROBE_TIMEOUT_MS: u64 = 2_000;

/// Upper bound for a single facade operation against the external store
pub const STORE_OPERATION_TIMEOUT_MS: u64 = 5_000;

// =============================================================================
// Simulated Latency
// =============================================================================

/// Downstream list latency range
pub const LATENCY_LIST_MS_MIN: u64 = 100;
/// Downstream list latency range
pub const LATENCY_LIST_MS_MAX: u64 = 400;

/// Downstream point operation (get/create/delete) latency range
pub const LATENCY_POINT_MS_MIN: u64 = 50;
/// Downstream point operation (get/create/delete) latency range
pub const LATENCY_POINT_MS_MAX: u64 = 200;

/// Upstream list latency range
pub const LATENCY_UPSTREAM_LIST_MS_MIN: u64 = 100;
/// Upstream list latency range
pub const LATENCY_UPSTREAM_LIST_MS_MAX: u64 = 300;

/// Upstream read/delete latency range
pub const LATENCY_UPSTREAM_POINT_MS_MIN: u64 = 50;
/// Upstream read/delete latency range
pub const LATENCY_UPSTREAM_POINT_MS_MAX: u64 = 150;

// =============================================================================
// Fault Catalog
// =============================================================================

/// Keyword that lists scenarios instead of triggering one
pub const FAULT_LIST_KEYWORD: &str = "list";

/// Wall-clock cutoff for the runaway loop scenario
pub const FAULT_LOOP_TIMEOUT_MS: u64 = 2_000;

/// Allocation request that no allocator can satisfy
pub const FAULT_ALLOCATION_BYTES: usize = usize::MAX / 4;

/// Client-side timeout for the network timeout scenario
pub const FAULT_NETWORK_TIMEOUT_MS: u64 = 1_000;

/// Background task delay before it fails
pub const FAULT_BACKGROUND_DELAY_MS: u64 = 100;

/// Address that never resolves
pub const FAULT_UNREACHABLE_STORE_URL: &str = "redis://nonexistent-redis-host:6379/";

/// Connect cutoff for the unreachable store scenario
pub const FAULT_STORE_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Server-side sleep requested by the store timeout scenario
pub const FAULT_STORE_SLEEP_SECS: u64 = 10;

/// Client-side cutoff for the store timeout scenario
pub const FAULT_STORE_TIMEOUT_MS: u64 = 2_000;

/// Size of the oversized write
pub const FAULT_OVERSIZED_VALUE_BYTES: usize = 100 * 1024 * 1024;

/// Key used by the oversized write
pub const FAULT_OVERSIZED_KEY: &str = "large_key";

/// Key left behind by the corruption scenario
pub const FAULT_CORRUPTED_KEY: &str = "corrupted_user";

/// Payload the corruption scenario writes
pub const FAULT_CORRUPTED_PAYLOAD: &str = "invalid:json:data:structure";

/// Key expected to always exist
pub const FAULT_CRITICAL_KEY: &str = "critical_config_key";

/// Keys staged by the rollback scenario
pub const FAULT_TRANSACTION_KEYS: [&str; 2] = ["tx_key1", "tx_key2"];

/// Size of the bounded pool exhausted by the pool scenario
pub const FAULT_POOL_CONNECTIONS_COUNT: u32 = 10;

/// `ENOSPC` on Linux and macOS
pub const ERRNO_NO_SPACE: i32 = 28;

/// `EACCES` on Linux and macOS
pub const ERRNO_ACCESS_DENIED: i32 = 13;
