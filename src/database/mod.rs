//! Database Service
//!
//! TigerStyle: Thin handlers over `UserStore`; every body carries the
//! storage mode so traces show which backend answered.
//!
//! # Routes
//!
//! ```text
//! GET    /health
//! GET    /database/users
//! POST   /database/users
//! GET    /database/users/:id
//! DELETE /database/users/:id
//! GET    /database/errors/test?type=<name|list>
//! GET    /database/simulate-slow-query?duration=<secs>
//! GET    /database/stats
//! ```

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracepair_core::{
    FaultCategory, FaultContext, NewUser, StorageMode, StoreStats, UserRecord, UserStore,
};

use crate::error::ApiError;
use crate::service::{fault_endpoint, FaultQuery, FaultResponse, Health, ServiceInfo};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default slow query duration
pub const SLOW_QUERY_SECS_DEFAULT: f64 = 1.0;

/// Longest slow query a caller may request
pub const SLOW_QUERY_SECS_MAX: f64 = 300.0;

/// Fault endpoint path
pub const FAULT_PATH: &str = "/database/errors/test";

/// `source` field of list responses
pub const SOURCE: &str = "database-service";

// =============================================================================
// State
// =============================================================================

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct DatabaseState {
    store: UserStore,
    faults: FaultContext,
    info: ServiceInfo,
}

impl DatabaseState {
    /// State over `store`; storage faults share its connection.
    #[must_use]
    pub fn new(store: UserStore, info: ServiceInfo) -> Self {
        let faults = FaultContext::new(&store);
        Self {
            store,
            faults,
            info,
        }
    }

    /// Override the fault context (tests point it at local addresses).
    #[must_use]
    pub fn with_faults(mut self, faults: FaultContext) -> Self {
        self.faults = faults;
        self
    }

    fn storage(&self) -> StorageMode {
        self.store.mode()
    }
}

/// Build the router.
pub fn router(state: DatabaseState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/database/users", get(list_users).post(create_user))
        .route("/database/users/:id", get(get_user).delete(delete_user))
        .route(FAULT_PATH, get(test_errors))
        .route("/database/simulate-slow-query", get(simulate_slow_query))
        .route("/database/stats", get(stats))
        .with_state(state)
}

// =============================================================================
// Bodies
// =============================================================================

/// List response.
#[derive(Debug, Serialize)]
pub struct UserList {
    /// Records
    pub users: Vec<UserRecord>,
    /// `users.len()`
    pub count: usize,
    /// Always `database-service`
    pub source: &'static str,
    /// Backend that answered
    pub storage: StorageMode,
}

/// A record plus the backend that answered.
#[derive(Debug, Serialize)]
pub struct StoredUser {
    /// Record fields
    #[serde(flatten)]
    pub user: UserRecord,
    /// Backend that answered
    pub storage: StorageMode,
}

/// Delete response.
#[derive(Debug, Serialize)]
pub struct Deleted {
    /// `User <id> deleted`
    pub message: String,
    /// Backend that answered
    pub storage: StorageMode,
}

/// `?duration=` for the slow query endpoint.
#[derive(Debug, Deserialize)]
pub struct SlowQuery {
    /// Seconds to sleep
    pub duration: Option<f64>,
}

/// Slow query response.
#[derive(Debug, Serialize)]
pub struct SlowQueryDone {
    /// Completion message
    pub message: String,
    /// Backend mode
    pub storage: StorageMode,
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<DatabaseState>) -> Json<Health> {
    Json(state.info.health(Some(state.storage())))
}

async fn list_users(State(state): State<DatabaseState>) -> Result<Json<UserList>, ApiError> {
    let users = state.store.list().await?;
    Ok(Json(UserList {
        count: users.len(),
        users,
        source: SOURCE,
        storage: state.storage(),
    }))
}

async fn create_user(
    State(state): State<DatabaseState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<StoredUser>), ApiError> {
    let Json(candidate) = payload?;
    let user = state.store.create(candidate).await?;

    tracing::info!(id = user.id, storage = %state.storage(), "User stored");
    Ok((
        StatusCode::CREATED,
        Json(StoredUser {
            user,
            storage: state.storage(),
        }),
    ))
}

async fn get_user(
    State(state): State<DatabaseState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<StoredUser>, ApiError> {
    let Path(id) = id?;
    let user = state.store.get(id).await?;
    Ok(Json(StoredUser {
        user,
        storage: state.storage(),
    }))
}

async fn delete_user(
    State(state): State<DatabaseState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Deleted>, ApiError> {
    let Path(id) = id?;
    state.store.delete(id).await?;
    Ok(Json(Deleted {
        message: format!("User {id} deleted"),
        storage: state.storage(),
    }))
}

async fn test_errors(
    State(state): State<DatabaseState>,
    query: Result<Query<FaultQuery>, QueryRejection>,
) -> Result<Json<FaultResponse>, ApiError> {
    let Query(query) = query?;
    fault_endpoint(FAULT_PATH, FaultCategory::Storage, query, &state.faults).await
}

async fn simulate_slow_query(
    State(state): State<DatabaseState>,
    query: Result<Query<SlowQuery>, QueryRejection>,
) -> Result<Json<SlowQueryDone>, ApiError> {
    let Query(query) = query?;
    let duration = query.duration.unwrap_or(SLOW_QUERY_SECS_DEFAULT);

    if !duration.is_finite() || !(0.0..=SLOW_QUERY_SECS_MAX).contains(&duration) {
        return Err(ApiError::Validation(format!(
            "duration must be between 0 and {SLOW_QUERY_SECS_MAX} seconds"
        )));
    }

    tokio::time::sleep(Duration::from_secs_f64(duration)).await;
    Ok(Json(SlowQueryDone {
        message: format!("Slow query completed in {duration} seconds"),
        storage: state.storage(),
    }))
}

async fn stats(State(state): State<DatabaseState>) -> Result<Json<StoreStats>, ApiError> {
    Ok(Json(state.store.stats().await?))
}
