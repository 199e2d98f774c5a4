//! Service Configuration
//!
//! TigerStyle: Read the environment once at startup, fail fast on bad values.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;
use tracepair_core::{ExternalStoreConfig, LatencyProfile};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Default api service port
pub const API_PORT_DEFAULT: u16 = 5001;

/// Default database service port
pub const DATABASE_PORT_DEFAULT: u16 = 5002;

/// Default downstream base URL
pub const DATABASE_SERVICE_URL_DEFAULT: &str = "http://localhost:5002";

/// Default scenario label
pub const SCENARIO_DEFAULT: &str = "default";

/// Placeholder for unset telemetry variables
pub const NOT_SET: &str = "not set";

// =============================================================================
// Types
// =============================================================================

/// Which of the two services this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Upstream service
    Api,
    /// Downstream service
    Database,
}

impl ServiceKind {
    /// Service name reported when `OTEL_SERVICE_NAME` is unset.
    #[must_use]
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::Api => "api-service",
            Self::Database => "database-service",
        }
    }

    /// Port used when `PORT` is unset.
    #[must_use]
    pub fn default_port(&self) -> u16 {
        match self {
            Self::Api => API_PORT_DEFAULT,
            Self::Database => DATABASE_PORT_DEFAULT,
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => f.write_str("api"),
            Self::Database => f.write_str("database"),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Variable present but unparseable
    #[error("invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Everything a service needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Which service
    pub kind: ServiceKind,
    /// Listen port on all interfaces
    pub port: u16,
    /// Debug-level logging
    pub debug: bool,
    /// Downstream base URL (api service)
    pub database_service_url: String,
    /// External store location (database service)
    pub store: ExternalStoreConfig,
    /// Label reported by health and request spans
    pub scenario: String,
    /// Sleep-based latency on/off
    pub simulate_latency: bool,
    /// Service name for health and spans
    pub service_name: String,
    /// Exporter endpoint, reported only
    pub otlp_endpoint: String,
    /// Commit, reported and attached to spans
    pub commit_sha: String,
    /// Repository, reported only
    pub repository_url: String,
}

impl ServiceConfig {
    /// Defaults for `kind`, ignoring the environment.
    #[must_use]
    pub fn defaults(kind: ServiceKind) -> Self {
        Self {
            kind,
            port: kind.default_port(),
            debug: false,
            database_service_url: DATABASE_SERVICE_URL_DEFAULT.to_string(),
            store: ExternalStoreConfig::default(),
            scenario: SCENARIO_DEFAULT.to_string(),
            simulate_latency: true,
            service_name: kind.default_name().to_string(),
            otlp_endpoint: NOT_SET.to_string(),
            commit_sha: NOT_SET.to_string(),
            repository_url: NOT_SET.to_string(),
        }
    }

    /// Load from process environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for an unparseable numeric or boolean variable.
    pub fn from_env(kind: ServiceKind) -> Result<Self, ConfigError> {
        Self::from_lookup(kind, |var| std::env::var(var).ok())
    }

    /// Load through `lookup`, which maps a variable name to its value.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` for an unparseable numeric or boolean variable.
    pub fn from_lookup(
        kind: ServiceKind,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(kind);

        if let Some(value) = lookup("PORT") {
            config.port = parse_number("PORT", value)?;
        }
        if let Some(value) = lookup("DEBUG") {
            config.debug = parse_flag("DEBUG", value)?;
        }
        if let Some(value) = lookup("DATABASE_SERVICE_URL") {
            config.database_service_url = value.trim_end_matches('/').to_string();
        }
        if let Some(value) = lookup("REDIS_HOST") {
            config.store.host = value;
        }
        if let Some(value) = lookup("REDIS_PORT") {
            config.store.port = parse_number("REDIS_PORT", value)?;
        }
        if let Some(value) = lookup("SCENARIO") {
            config.scenario = value;
        }
        if let Some(value) = lookup("SIMULATE_LATENCY") {
            config.simulate_latency = parse_flag("SIMULATE_LATENCY", value)?;
        }
        if let Some(value) = lookup("OTEL_SERVICE_NAME") {
            config.service_name = value;
        }
        if let Some(value) = lookup("OTEL_EXPORTER_OTLP_ENDPOINT") {
            config.otlp_endpoint = value;
        }
        if let Some(value) = lookup("DD_GIT_COMMIT_SHA") {
            config.commit_sha = value;
        }
        if let Some(value) = lookup("DD_GIT_REPOSITORY_URL") {
            config.repository_url = value;
        }

        Ok(config)
    }

    /// `0.0.0.0:<port>`.
    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Latency profile for this service, or none when disabled.
    #[must_use]
    pub fn latency_profile(&self) -> LatencyProfile {
        let profile = match self.kind {
            ServiceKind::Api => LatencyProfile::upstream(),
            ServiceKind::Database => LatencyProfile::downstream(),
        };
        LatencyProfile::enabled_or_disabled(self.simulate_latency, profile)
    }
}

fn parse_number<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
        value,
    })
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected true or false".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(kind: ServiceKind, vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(kind, |var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_per_service() {
        let api = load(ServiceKind::Api, &[]).unwrap();
        assert_eq!(api.port, 5001);
        assert_eq!(api.service_name, "api-service");
        assert_eq!(api.database_service_url, "http://localhost:5002");
        assert_eq!(api.commit_sha, "not set");
        assert!(api.simulate_latency);

        let database = load(ServiceKind::Database, &[]).unwrap();
        assert_eq!(database.port, 5002);
        assert_eq!(database.service_name, "database-service");
        assert_eq!(database.store.address(), "localhost:6379");
    }

    #[test]
    fn test_overrides() {
        let config = load(
            ServiceKind::Database,
            &[
                ("PORT", "8080"),
                ("REDIS_HOST", "cache"),
                ("REDIS_PORT", "6380"),
                ("SCENARIO", "slow-db"),
                ("SIMULATE_LATENCY", "false"),
                ("DEBUG", "TRUE"),
            ],
        )
        .unwrap();

        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.store.address(), "cache:6380");
        assert_eq!(config.scenario, "slow-db");
        assert!(config.debug);
        assert!(config.latency_profile().is_disabled());
    }

    #[test]
    fn test_bad_port_is_error() {
        let err = load(ServiceKind::Api, &[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "PORT", .. }));
    }

    #[test]
    fn test_bad_flag_is_error() {
        let err = load(ServiceKind::Api, &[("SIMULATE_LATENCY", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SIMULATE_LATENCY", .. }));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config =
            load(ServiceKind::Api, &[("DATABASE_SERVICE_URL", "http://db:5002/")]).unwrap();
        assert_eq!(config.database_service_url, "http://db:5002");
    }
}
