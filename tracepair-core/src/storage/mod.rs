//! Storage - Backend Trait and Implementations
//!
//! TigerStyle: Abstract storage, decided once at startup.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 UserStore (probe-selected)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    UserBackend Trait                         │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │ FallbackBackend │           │ ExternalBackend │
//! │  (in-process)   │           │     (Redis)     │
//! └─────────────────┘           └─────────────────┘
//! ```

mod backend;
mod error;
mod external;
mod facade;
mod fallback;
mod probe;
mod user;

pub use backend::{BackendDetail, StorageMode, StoreStats, UserBackend};
pub use error::{StorageError, StorageResult};
pub use external::{ExternalBackend, ExternalStoreConfig};
pub use facade::UserStore;
pub use fallback::FallbackBackend;
pub use probe::{probe, ProbeResult};
pub use user::{unix_now_secs, NewUser, UserRecord};
