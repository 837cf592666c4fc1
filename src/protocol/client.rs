use std::time::Duration;

use async_trait::async_trait;
use derive_builder::Builder;
use thiserror::Error;
use tracing::debug;

use crate::protocol::messages::{RelayAction, RelayStatus, ToggleRequest};

#[derive(Error, Debug)]
pub enum RelayClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// Connection options for the relay service.
#[derive(Builder, Debug, Clone)]
pub struct RelayOptions {
    /// Hostname or IP address of the relay service.
    pub host: String,
    /// TCP port the service listens on.
    #[builder(default = "5000")]
    pub port: u16,
    /// Per-request timeout applied to both endpoints.
    #[builder(default = "Duration::from_secs(10)")]
    pub timeout: Duration,
}

impl RelayOptions {
    pub fn builder() -> RelayOptionsBuilder {
        RelayOptionsBuilder::default()
    }
}

/// Read/write access to the relay service. The controller talks to
/// this trait so tests can substitute a scripted double.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// `GET /api/status`.
    async fn status(&self) -> Result<RelayStatus, RelayClientError>;
    /// `POST /api/toggle` with the desired action.
    async fn toggle(&self, action: RelayAction) -> Result<RelayStatus, RelayClientError>;
}

/// HTTP client for the two JSON operations the relay service exposes.
pub struct RelayClient {
    http: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(options: RelayOptions) -> Result<Self, RelayClientError> {
        let http = reqwest::Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.timeout)
            .build()
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;
        Ok(RelayClient {
            http,
            base_url: format!("http://{}:{}", options.host, options.port),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl RelayTransport for RelayClient {
    async fn status(&self) -> Result<RelayStatus, RelayClientError> {
        let response = self
            .http
            .get(self.endpoint("/api/status"))
            .send()
            .await
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RelayClientError::Transport(format!(
                "status fetch failed: HTTP {}",
                response.status()
            )));
        }
        response
            .json::<RelayStatus>()
            .await
            .map_err(|e| RelayClientError::Protocol(e.to_string()))
    }

    async fn toggle(&self, action: RelayAction) -> Result<RelayStatus, RelayClientError> {
        debug!("Sending relay action: {action}");
        let response = self
            .http
            .post(self.endpoint("/api/toggle"))
            .json(&ToggleRequest { action })
            .send()
            .await
            .map_err(|e| RelayClientError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(RelayClientError::Transport(format!(
                "toggle failed: HTTP {}",
                response.status()
            )));
        }
        response
            .json::<RelayStatus>()
            .await
            .map_err(|e| RelayClientError::Protocol(e.to_string()))
    }
}
