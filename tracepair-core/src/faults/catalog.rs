//! Fault Catalog
//!
//! TigerStyle: Fixed, ordered, read-only. Lookup fails closed.

use std::fmt;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::Serialize;

use super::error::{FaultError, FaultResult};
use super::{application, storage};
use crate::constants::FAULT_UNREACHABLE_STORE_URL;
use crate::storage::{ExternalBackend, UserStore};

// =============================================================================
// Types
// =============================================================================

/// Which service exposes a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultCategory {
    /// Runtime faults, exposed by the api service
    Application,
    /// Storage faults, exposed by the database service
    Storage,
}

impl FaultCategory {
    /// Wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for FaultCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resources a unit may touch.
#[derive(Debug, Clone)]
pub struct FaultContext {
    external: Option<ExternalBackend>,
    unreachable_store_url: String,
}

impl FaultContext {
    /// Share the facade's external store, if it has one.
    #[must_use]
    pub fn new(store: &UserStore) -> Self {
        Self {
            external: store.external_backend().cloned(),
            unreachable_store_url: FAULT_UNREACHABLE_STORE_URL.to_string(),
        }
    }

    /// No external store.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            external: None,
            unreachable_store_url: FAULT_UNREACHABLE_STORE_URL.to_string(),
        }
    }

    /// Dial `url` instead of the default unreachable host.
    #[must_use]
    pub fn with_unreachable_store(mut self, url: impl Into<String>) -> Self {
        self.unreachable_store_url = url.into();
        self
    }

    /// External store, or `StoreDetached` naming the scenario that needed it.
    ///
    /// # Errors
    /// `StoreDetached` when the process runs in-process only.
    pub fn external(&self, scenario: &'static str) -> FaultResult<&ExternalBackend> {
        self.external
            .as_ref()
            .ok_or(FaultError::StoreDetached { scenario })
    }

    /// Address the connection scenario dials.
    #[must_use]
    pub fn unreachable_store_url(&self) -> &str {
        &self.unreachable_store_url
    }
}

/// A scenario that completed without faulting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultOutcome {
    /// Scenario name
    pub scenario: &'static str,
    /// What happened
    pub result: String,
}

/// Reproduces one failure mode.
#[async_trait]
pub trait FaultUnit: Send + Sync {
    /// Induce the fault. `Ok` carries a description when nothing failed.
    async fn induce(&self, ctx: &FaultContext) -> FaultResult<String>;
}

/// One catalog entry.
pub struct FaultScenario {
    /// Lookup key
    pub name: &'static str,
    /// Owning service
    pub category: FaultCategory,
    /// Expected effect, for listings and logs
    pub effect: &'static str,
    unit: Box<dyn FaultUnit>,
}

impl fmt::Debug for FaultScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultScenario")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("effect", &self.effect)
            .finish_non_exhaustive()
    }
}

impl FaultScenario {
    fn new(
        name: &'static str,
        category: FaultCategory,
        effect: &'static str,
        unit: impl FaultUnit + 'static,
    ) -> Self {
        Self {
            name,
            category,
            effect,
            unit: Box::new(unit),
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

static CATALOG: Lazy<FaultCatalog> = Lazy::new(FaultCatalog::build);

/// The fixed table of scenarios.
#[derive(Debug)]
pub struct FaultCatalog {
    scenarios: Vec<FaultScenario>,
}

impl FaultCatalog {
    /// Process-wide catalog.
    #[must_use]
    pub fn global() -> &'static Self {
        &CATALOG
    }

    fn build() -> Self {
        use FaultCategory::{Application, Storage};

        let scenarios = vec![
            FaultScenario::new(
                "division_by_zero",
                Application,
                "integer division by zero",
                application::DivisionByZero,
            ),
            FaultScenario::new(
                "null_pointer",
                Application,
                "use of an absent value",
                application::NullPointer,
            ),
            FaultScenario::new(
                "index_out_of_bounds",
                Application,
                "index past the end of a list",
                application::IndexOutOfBounds,
            ),
            FaultScenario::new(
                "type_error",
                Application,
                "text parsed as an integer",
                application::TypeError,
            ),
            FaultScenario::new(
                "infinite_loop",
                Application,
                "runaway loop cut off after 2s",
                application::InfiniteLoop,
            ),
            FaultScenario::new(
                "memory_error",
                Application,
                "allocation the allocator refuses",
                application::MemoryError,
            ),
            FaultScenario::new(
                "file_not_found",
                Application,
                "read of a missing file",
                application::FileNotFound,
            ),
            FaultScenario::new(
                "json_decode_error",
                Application,
                "malformed JSON",
                application::JsonDecodeError,
            ),
            FaultScenario::new(
                "network_timeout",
                Application,
                "HTTP request that never gets an answer",
                application::NetworkTimeout,
            ),
            FaultScenario::new(
                "database_error",
                Application,
                "database file that cannot be opened",
                application::DatabaseError,
            ),
            FaultScenario::new(
                "validation_error",
                Application,
                "record that fails validation",
                application::ValidationError,
            ),
            FaultScenario::new(
                "custom_exception",
                Application,
                "application error with a code",
                application::CustomException,
            ),
            FaultScenario::new(
                "async_error",
                Application,
                "background task failure",
                application::AsyncError,
            ),
            FaultScenario::new(
                "redis_connection_error",
                Storage,
                "connect to an unreachable store",
                storage::ConnectionError,
            ),
            FaultScenario::new(
                "redis_timeout",
                Storage,
                "store command abandoned after 2s",
                storage::StoreTimeout,
            ),
            FaultScenario::new(
                "redis_memory_error",
                Storage,
                "100 MiB value written to the store",
                storage::MemoryPressure,
            ),
            FaultScenario::new(
                "data_corruption",
                Storage,
                "stored value is not valid JSON",
                storage::DataCorruption,
            ),
            FaultScenario::new(
                "serialization_error",
                Storage,
                "value holding a file handle serialized",
                storage::SerializationError,
            ),
            FaultScenario::new(
                "key_not_found",
                Storage,
                "critical key missing",
                storage::KeyNotFound,
            ),
            FaultScenario::new(
                "transaction_rollback",
                Storage,
                "multi-key write discarded",
                storage::TransactionRollback,
            ),
            FaultScenario::new(
                "connection_pool_exhausted",
                Storage,
                "bounded pool has no free slot",
                storage::PoolExhausted,
            ),
            FaultScenario::new(
                "disk_full",
                Storage,
                "write fails with ENOSPC",
                storage::DiskFull,
            ),
            FaultScenario::new(
                "permission_denied",
                Storage,
                "open fails with EACCES",
                storage::PermissionDenied,
            ),
        ];

        Self { scenarios }
    }

    /// Scenario names of `category`, in catalog order.
    #[must_use]
    pub fn names(&self, category: FaultCategory) -> Vec<&'static str> {
        self.scenarios
            .iter()
            .filter(|scenario| scenario.category == category)
            .map(|scenario| scenario.name)
            .collect()
    }

    /// Scenario by name, in any category.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FaultScenario> {
        self.scenarios.iter().find(|scenario| scenario.name == name)
    }

    /// Run the scenario `name` if it belongs to `category`.
    ///
    /// # Errors
    /// `UnknownScenario` for a name outside `category`; otherwise whatever
    /// fault the unit raised.
    pub async fn trigger(
        &self,
        name: &str,
        category: FaultCategory,
        ctx: &FaultContext,
    ) -> FaultResult<FaultOutcome> {
        let scenario = self
            .get(name)
            .filter(|scenario| scenario.category == category)
            .ok_or_else(|| FaultError::UnknownScenario {
                name: name.to_string(),
            })?;

        tracing::info!(
            scenario = scenario.name,
            %category,
            effect = scenario.effect,
            "Triggering fault scenario"
        );

        match scenario.unit.induce(ctx).await {
            Ok(result) => Ok(FaultOutcome {
                scenario: scenario.name,
                result,
            }),
            Err(e) => {
                tracing::error!(
                    scenario = scenario.name,
                    %category,
                    fault = e.kind(),
                    error = %e,
                    "Fault scenario raised"
                );
                Err(e)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
