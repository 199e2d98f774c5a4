//! tracepair core - User Store and Fault Catalog
//!
//! TigerStyle: one storage contract, two backends, a fixed fault table.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               UserStore (facade)             │
//! ├─────────────────────────────────────────────┤
//! │  ExternalBackend        │ Redis hashes + TTL │
//! │  FallbackBackend        │ in-process map     │
//! ├─────────────────────────────────────────────┤
//! │  Probe                  │ decides once       │
//! │  FaultCatalog           │ named failures     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use tracepair_core::{ExternalStoreConfig, LatencyProfile, NewUser, UserStore};
//!
//! let store = UserStore::connect(&ExternalStoreConfig::default(), LatencyProfile::disabled()).await;
//! let user = store.create(NewUser::named("Ada")).await?;
//! assert_eq!(store.get(user.id).await?, user);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod constants;
pub mod faults;
pub mod latency;
pub mod storage;

pub use faults::{
    FaultCatalog, FaultCategory, FaultContext, FaultError, FaultOutcome, FaultResult,
    FaultScenario, FaultUnit,
};
pub use latency::{LatencyProfile, Operation};
pub use storage::{
    probe, BackendDetail, ExternalBackend, ExternalStoreConfig, FallbackBackend, NewUser,
    ProbeResult, StorageError, StorageMode, StorageResult, StoreStats, UserBackend, UserRecord,
    UserStore,
};
