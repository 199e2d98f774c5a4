//! Shared Service Pieces
//!
//! TigerStyle: Health and fault endpoints behave identically in both services;
//! only the catalog category and the URL prefix differ.

use axum::Json;
use serde::{Deserialize, Serialize};
use tracepair_core::constants::FAULT_LIST_KEYWORD;
use tracepair_core::{FaultCatalog, FaultCategory, FaultContext, FaultOutcome, StorageMode};

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Version reported by `/health`
pub const SERVICE_VERSION: &str = "1.0.0";

/// Identity of a running service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Service name
    pub name: String,
    /// Scenario label
    pub scenario: String,
    /// Commit, for span tags
    pub commit: String,
}

impl ServiceInfo {
    /// Identity from configuration.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            name: config.service_name.clone(),
            scenario: config.scenario.clone(),
            commit: config.commit_sha.clone(),
        }
    }

    /// Health body, with the storage mode when the service has one.
    #[must_use]
    pub fn health(&self, storage: Option<StorageMode>) -> Health {
        Health {
            status: "healthy",
            service: self.name.clone(),
            scenario: self.scenario.clone(),
            version: SERVICE_VERSION,
            storage,
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct Health {
    /// Always `healthy`
    pub status: &'static str,
    /// Service name
    pub service: String,
    /// Scenario label
    pub scenario: String,
    /// Service version
    pub version: &'static str,
    /// Storage mode (database service only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageMode>,
}

/// `?type=` for the fault endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FaultQuery {
    /// Scenario name, or `list`
    #[serde(rename = "type")]
    pub scenario: Option<String>,
}

/// Listing returned by list mode.
#[derive(Debug, Serialize)]
pub struct FaultListing {
    /// Names in catalog order
    pub available_errors: Vec<&'static str>,
    /// URL template
    pub usage: String,
    /// Example URL
    pub example: String,
}

/// Response of the fault endpoint when nothing failed.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum FaultResponse {
    /// List mode
    Listing(FaultListing),
    /// Scenario completed normally
    Completed(FaultOutcome),
}

/// Serve the fault endpoint at `path` for `category`.
///
/// # Errors
/// `UnknownScenario` for an unknown name, `Fault` for a raised fault.
pub async fn fault_endpoint(
    path: &str,
    category: FaultCategory,
    query: FaultQuery,
    ctx: &FaultContext,
) -> Result<Json<FaultResponse>, ApiError> {
    let catalog = FaultCatalog::global();

    let name = match query.scenario.as_deref() {
        None | Some(FAULT_LIST_KEYWORD) => {
            let available_errors = catalog.names(category);
            let first = available_errors.first().copied().unwrap_or_default();
            let example = format!("{path}?type={first}");
            return Ok(Json(FaultResponse::Listing(FaultListing {
                available_errors,
                usage: format!("{path}?type=<error_type>"),
                example,
            })));
        }
        Some(name) => name,
    };

    catalog
        .trigger(name, category, ctx)
        .await
        .map(|outcome| Json(FaultResponse::Completed(outcome)))
        .map_err(|e| ApiError::fault(name, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_default_and_keyword() {
        let ctx = FaultContext::detached();

        let Json(FaultResponse::Listing(default)) = fault_endpoint(
            "/api/errors/test",
            FaultCategory::Application,
            FaultQuery::default(),
            &ctx,
        )
        .await
        .unwrap() else {
            panic!("expected listing");
        };

        let Json(FaultResponse::Listing(keyword)) = fault_endpoint(
            "/api/errors/test",
            FaultCategory::Application,
            FaultQuery {
                scenario: Some("list".to_string()),
            },
            &ctx,
        )
        .await
        .unwrap() else {
            panic!("expected listing");
        };

        assert_eq!(default.available_errors, keyword.available_errors);
        assert_eq!(default.usage, "/api/errors/test?type=<error_type>");
        assert_eq!(default.example, "/api/errors/test?type=division_by_zero");
    }

    #[test]
    fn test_health_storage_optional() {
        let info = ServiceInfo {
            name: "api-service".to_string(),
            scenario: "default".to_string(),
            commit: "not set".to_string(),
        };

        let api = serde_json::to_value(info.health(None)).unwrap();
        assert!(api.get("storage").is_none());
        assert_eq!(api["status"], "healthy");
        assert_eq!(api["version"], "1.0.0");

        let database = serde_json::to_value(info.health(Some(StorageMode::Fallback))).unwrap();
        assert_eq!(database["storage"], "memory");
    }
}
