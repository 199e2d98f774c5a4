//! Backend Probe
//!
//! TigerStyle: Decide once, never flap.
//!
//! Runs at startup. A failed probe pins the process to the fallback store for
//! its whole lifetime, so records written earlier never become invisible
//! because the backend changed underneath them.

use std::time::Duration;

use super::backend::StorageMode;
use super::external::{ExternalBackend, ExternalStoreConfig};
use crate::constants::STORE_PROBE_TIMEOUT_MS;

/// What the startup probe found.
#[derive(Debug)]
pub struct ProbeResult {
    external: Option<ExternalBackend>,
}

impl ProbeResult {
    /// Mode the process must run in.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        if self.external.is_some() {
            StorageMode::External
        } else {
            StorageMode::Fallback
        }
    }

    /// The connected backend, when the probe succeeded.
    #[must_use]
    pub fn into_external(self) -> Option<ExternalBackend> {
        self.external
    }
}

/// Ping the external store with a bounded timeout.
///
/// Never fails: any error (refused, DNS, timeout, protocol) selects the
/// fallback and is logged here.
pub async fn probe(config: &ExternalStoreConfig) -> ProbeResult {
    let timeout = Duration::from_millis(STORE_PROBE_TIMEOUT_MS);

    match ExternalBackend::connect(config, timeout).await {
        Ok(backend) => {
            tracing::info!("Connected to external store at {}", config.address());
            ProbeResult {
                external: Some(backend),
            }
        }
        Err(e) => {
            tracing::warn!(
                address = %config.address(),
                error = %e,
                "External store not available. Using in-process storage."
            );
            ProbeResult { external: None }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_probe_unreachable_selects_fallback() {
        let config = ExternalStoreConfig::new("127.0.0.1", 1);

        let result = probe(&config).await;

        assert_eq!(result.mode(), StorageMode::Fallback);
        assert!(result.into_external().is_none());
    }

    #[tokio::test]
    async fn test_probe_silent_listener_is_bounded() {
        // Accepts the connection but never answers PING
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _accepting = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let started = Instant::now();
        let result = probe(&ExternalStoreConfig::new("127.0.0.1", port)).await;

        assert_eq!(result.mode(), StorageMode::Fallback);
        assert!(started.elapsed() < Duration::from_millis(STORE_PROBE_TIMEOUT_MS + 1_000));
    }
}
