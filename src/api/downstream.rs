//! Downstream Client
//!
//! TigerStyle: Bounded calls, no retries. Callers decide what a failure means.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracepair_core::UserRecord;

/// Timeout applied to every downstream call
pub const DOWNSTREAM_TIMEOUT_MS: u64 = 5_000;

/// Downstream call failures.
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// Connect, send or timeout failure
    #[error("downstream request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// Non-2xx answer
    #[error("downstream answered {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Body did not parse
    #[error("downstream body did not parse: {0}")]
    Decode(#[source] reqwest::Error),
}

impl DownstreamError {
    /// True when the call was cut off by the timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_timeout())
    }
}

#[derive(Debug, Deserialize)]
struct UserListBody {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// HTTP client for the database service.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl DownstreamClient {
    /// Client for `base_url` with the default timeout.
    ///
    /// # Errors
    /// Returns the builder error if the HTTP client cannot be created.
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, Duration::from_millis(DOWNSTREAM_TIMEOUT_MS))
    }

    /// Client for `base_url` with a custom timeout.
    ///
    /// # Errors
    /// Returns the builder error if the HTTP client cannot be created.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base URL, without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn users_url(&self) -> String {
        format!("{}/database/users", self.base_url)
    }

    /// `GET /database/users`.
    ///
    /// # Errors
    /// Any transport, status or decode failure.
    pub async fn list_users(&self) -> Result<Vec<UserRecord>, DownstreamError> {
        let response = self
            .http
            .get(self.users_url())
            .send()
            .await
            .map_err(DownstreamError::Transport)?;
        let response = check_status(response)?;

        let body: UserListBody = response.json().await.map_err(DownstreamError::Decode)?;
        Ok(body.users)
    }

    /// `POST /database/users` with the full record, id included.
    ///
    /// # Errors
    /// Any transport or status failure.
    pub async fn create_user(&self, user: &UserRecord) -> Result<(), DownstreamError> {
        let response = self
            .http
            .post(self.users_url())
            .json(user)
            .send()
            .await
            .map_err(DownstreamError::Transport)?;
        check_status(response)?;
        Ok(())
    }

    /// `DELETE /database/users/{id}`.
    ///
    /// # Errors
    /// Any transport or status failure.
    pub async fn delete_user(&self, id: u64) -> Result<(), DownstreamError> {
        let response = self
            .http
            .delete(format!("{}/{id}", self.users_url()))
            .send()
            .await
            .map_err(DownstreamError::Transport)?;
        check_status(response)?;
        Ok(())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, DownstreamError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DownstreamError::Status {
            status: status.as_u16(),
        })
    }
}
