//! HTTP Errors
//!
//! TigerStyle: One error type at the HTTP edge, one status per variant.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracepair_core::{FaultError, StorageError};

/// Errors returned by handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad client input
    #[error("{0}")]
    Validation(String),

    /// Missing entity
    #[error("{0}")]
    NotFound(String),

    /// Id already taken
    #[error("{0}")]
    Conflict(String),

    /// Backend I/O failure on an operation
    #[error("{0}")]
    StorageUnavailable(String),

    /// Bad diagnostic request
    #[error("{0}")]
    UnknownScenario(String),

    /// A fault raised by the catalog
    #[error("{message}")]
    Fault {
        /// Scenario name
        scenario: String,
        /// Fault class
        fault: &'static str,
        /// Fault message
        message: String,
    },

    /// Legacy simulated status with a fixed message
    #[error("{message}")]
    Simulated {
        /// Status to return
        status: StatusCode,
        /// Message to return
        message: &'static str,
    },
}

impl ApiError {
    /// Wrap a catalog result for `scenario`.
    #[must_use]
    pub fn fault(scenario: &str, err: FaultError) -> Self {
        if err.is_unknown_scenario() {
            return Self::UnknownScenario(err.to_string());
        }
        Self::Fault {
            scenario: scenario.to_string(),
            fault: err.kind(),
            message: err.to_string(),
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownScenario(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::StorageUnavailable(_) | Self::Fault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Simulated { status, .. } => *status,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation { .. } => Self::Validation(err.to_string()),
            StorageError::NotFound { .. } => Self::NotFound("User not found".to_string()),
            StorageError::AlreadyExists { .. } => Self::Conflict(err.to_string()),
            StorageError::Unavailable { .. } | StorageError::Timeout { .. } => {
                Self::StorageUnavailable(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fault: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let body = match &self {
            Self::Fault {
                scenario, fault, ..
            } => ErrorBody {
                error: &message,
                scenario: Some(scenario),
                fault: Some(fault),
            },
            _ => ErrorBody {
                error: &message,
                scenario: None,
                fault: None,
            },
        };

        // Faults are logged by the catalog with their scenario
        if status.is_server_error() && !matches!(self, Self::Fault { .. }) {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_statuses() {
        assert_eq!(
            ApiError::from(StorageError::validation("Name is required")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(StorageError::not_found(1)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StorageError::already_exists(1)).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StorageError::timeout("get", 5_000)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fault_mapping() {
        let unknown = ApiError::fault(
            "nope",
            FaultError::UnknownScenario {
                name: "nope".to_string(),
            },
        );
        assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

        let raised = ApiError::fault("key_not_found", FaultError::KeyNotFound { key: "k" });
        assert_eq!(raised.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(raised, ApiError::Fault { fault: "key_not_found", .. }));
    }
}
