//! Api Service
//!
//! TigerStyle: Serves its own buffer and forwards to the database service.
//!
//! # Routes
//!
//! ```text
//! GET    /health
//! GET    /api/users
//! POST   /api/users
//! GET    /api/users/:id
//! DELETE /api/users/:id
//! GET    /api/errors/test?type=<name|list>
//! GET    /api/simulate-error?type=timeout|server|<other>
//! ```

pub mod aggregator;
pub mod downstream;

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracepair_core::{FaultCategory, FaultContext, NewUser, UserRecord};

pub use aggregator::{merge, Aggregator, MergedUsers};
pub use downstream::{DownstreamClient, DownstreamError};

use crate::error::ApiError;
use crate::service::{fault_endpoint, FaultQuery, FaultResponse, Health, ServiceInfo};

/// Fault endpoint path
pub const FAULT_PATH: &str = "/api/errors/test";

/// Delay before the legacy endpoint answers 408
pub const SIMULATED_TIMEOUT_MS: u64 = 2_000;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    aggregator: Aggregator,
    faults: FaultContext,
    info: ServiceInfo,
}

impl ApiState {
    /// State over `aggregator`. Application faults need no store.
    #[must_use]
    pub fn new(aggregator: Aggregator, info: ServiceInfo) -> Self {
        Self {
            aggregator,
            faults: FaultContext::detached(),
            info,
        }
    }
}

/// Build the router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/:id", get(get_user).delete(delete_user))
        .route(FAULT_PATH, get(test_errors))
        .route("/api/simulate-error", get(simulate_error))
        .with_state(state)
}

/// Delete response.
#[derive(Debug, Serialize)]
pub struct Deleted {
    /// `User <id> deleted`
    pub message: String,
}

/// `?type=` for the legacy endpoint.
#[derive(Debug, Deserialize)]
pub struct SimulateQuery {
    /// `timeout`, `server`, or anything else
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

async fn health(State(state): State<ApiState>) -> Json<Health> {
    Json(state.info.health(None))
}

async fn list_users(State(state): State<ApiState>) -> Result<Json<MergedUsers>, ApiError> {
    Ok(Json(state.aggregator.list_merged().await?))
}

async fn create_user(
    State(state): State<ApiState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let Json(candidate) = payload?;
    let user = state.aggregator.create(candidate).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<ApiState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<UserRecord>, ApiError> {
    let Path(id) = id?;
    Ok(Json(state.aggregator.get(id).await?))
}

async fn delete_user(
    State(state): State<ApiState>,
    id: Result<Path<u64>, PathRejection>,
) -> Result<Json<Deleted>, ApiError> {
    let Path(id) = id?;
    state.aggregator.delete(id).await?;
    Ok(Json(Deleted {
        message: format!("User {id} deleted"),
    }))
}

async fn test_errors(
    State(state): State<ApiState>,
    query: Result<Query<FaultQuery>, QueryRejection>,
) -> Result<Json<FaultResponse>, ApiError> {
    let Query(query) = query?;
    fault_endpoint(FAULT_PATH, FaultCategory::Application, query, &state.faults).await
}

async fn simulate_error(query: Result<Query<SimulateQuery>, QueryRejection>) -> ApiError {
    let kind = query.ok().and_then(|Query(q)| q.kind);

    match kind.as_deref() {
        Some("timeout") => {
            tokio::time::sleep(Duration::from_millis(SIMULATED_TIMEOUT_MS)).await;
            ApiError::Simulated {
                status: StatusCode::REQUEST_TIMEOUT,
                message: "Request timed out",
            }
        }
        Some("server") => ApiError::Simulated {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error",
        },
        _ => ApiError::Simulated {
            status: StatusCode::BAD_REQUEST,
            message: "Simulated error",
        },
    }
}
