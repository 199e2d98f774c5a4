//! tracepair - Upstream/Downstream User Services
//!
//! Two cooperating HTTP services for exercising monitoring pipelines:
//!
//! - `api`: serves a local buffer, forwards writes and merges reads from
//!   the database service
//! - `database`: persists records in Redis, or in-process when Redis is
//!   unreachable at startup
//!
//! Both expose a fault endpoint that reproduces named failures on demand.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod service;
pub mod telemetry;

use axum::Router;
use tracepair_core::UserStore;

use crate::api::{Aggregator, ApiState, DownstreamClient};
use crate::config::{ServiceConfig, ServiceKind};
use crate::database::DatabaseState;
use crate::service::ServiceInfo;

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Application name
pub const APP_NAME: &str = "tracepair";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Assembly
// =============================================================================

/// Database service router, after probing the external store.
pub async fn database_app(config: &ServiceConfig) -> Router {
    assert_eq!(config.kind, ServiceKind::Database);

    let store = UserStore::connect(&config.store, config.latency_profile()).await;
    tracing::info!(storage = %store.mode(), "Storage selected");

    let info = ServiceInfo::from_config(config);
    let router = database::router(DatabaseState::new(store, info.clone()));
    telemetry::with_request_layers(router, &info)
}

/// Api service router.
///
/// # Errors
/// Returns the HTTP client builder error.
pub fn api_app(config: &ServiceConfig) -> Result<Router, reqwest::Error> {
    assert_eq!(config.kind, ServiceKind::Api);

    let downstream = DownstreamClient::new(&config.database_service_url)?;
    let local = UserStore::fallback(config.latency_profile());

    let info = ServiceInfo::from_config(config);
    let router = api::router(ApiState::new(Aggregator::new(local, downstream), info.clone()));
    Ok(telemetry::with_request_layers(router, &info))
}
