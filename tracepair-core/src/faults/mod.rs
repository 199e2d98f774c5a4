//! Faults - Named Failure Reproduction
//!
//! TigerStyle: A closed table of scenarios, one unit per failure mode.
//!
//! # Architecture
//!
//! ```text
//! trigger(name, category, ctx)
//!        │
//!        ▼
//! ┌──────────────────────┐   unknown / other category
//! │ FaultCatalog (static)│ ─────────────────────────────▶ UnknownScenario
//! └──────────────────────┘
//!        │ Box<dyn FaultUnit>
//!        ▼
//!   application.rs  (api service)
//!   storage.rs      (database service, shares the facade's store)
//! ```

mod application;
mod catalog;
mod error;
mod storage;

pub use catalog::{
    FaultCatalog, FaultCategory, FaultContext, FaultOutcome, FaultScenario, FaultUnit,
};
pub use error::{FaultError, FaultResult};
