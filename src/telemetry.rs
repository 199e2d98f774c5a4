//! Logging and Request Tracing
//!
//! TigerStyle: `RUST_LOG` wins; otherwise verbosity picks the filter.

use std::any::Any;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServiceConfig;
use crate::service::ServiceInfo;

/// Filter used when `RUST_LOG` is unset.
#[must_use]
pub fn default_filter(verbose: u8, debug: bool) -> &'static str {
    match (verbose, debug) {
        (0, false) => "info,tower_http=debug",
        (0 | 1, _) => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init_logging(verbose: u8, debug: bool) {
    let filter = default_filter(verbose, debug);

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .try_init();
}

/// Startup banner with the effective configuration.
pub fn log_banner(config: &ServiceConfig) {
    tracing::info!("=== {} Configuration ===", config.kind);
    tracing::info!("Service Name: {}", config.service_name);
    tracing::info!("Scenario: {}", config.scenario);
    tracing::info!("OTLP Endpoint: {}", config.otlp_endpoint);
    tracing::info!("Git Commit SHA: {}", config.commit_sha);
    tracing::info!("Git Repository URL: {}", config.repository_url);
    tracing::info!("Simulated latency: {}", config.simulate_latency);
}

/// Wrap `router` with request spans and the panic boundary.
pub fn with_request_layers(router: Router, info: &ServiceInfo) -> Router {
    let service = info.name.clone();
    let scenario = info.scenario.clone();
    let commit = info.commit.clone();

    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(
            TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    service = %service,
                    scenario = %scenario,
                    commit = %commit,
                )
            }),
        )
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    };

    tracing::error!(panic = %message, "Handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert_eq!(default_filter(0, false), "info,tower_http=debug");
        assert_eq!(default_filter(1, false), "debug");
        assert_eq!(default_filter(0, true), "debug");
        assert_eq!(default_filter(2, false), "trace");
        assert_eq!(default_filter(3, true), "trace");
    }

    #[test]
    fn test_panic_response_is_500() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
