//! Control Plane Registration.
//!
//! On startup the node announces its address to the control plane with a
//! single `POST <api_url>/register`. Failure is logged and never stops the
//! daemon.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;

/// Registration client for the control plane.
pub struct RegistrationClient {
    api_url: String,
    node_address: String,
    http_client: reqwest::Client,
}

impl RegistrationClient {
    /// Create a new registration client.
    pub fn new(config: &Config) -> Self {
        Self::with_endpoint(
            config.control_plane.api_url.clone(),
            config.control_plane.node_address.clone(),
        )
    }

    pub fn with_endpoint(api_url: impl Into<String>, node_address: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            api_url: api_url.into(),
            node_address: node_address.into(),
            http_client,
        }
    }

    fn register_url(&self) -> String {
        format!("{}/register", self.api_url.trim_end_matches('/'))
    }

    /// Register with the control plane.
    ///
    /// Returns the response body (JSON when parseable, otherwise a string).
    pub async fn register(&self) -> anyhow::Result<serde_json::Value> {
        let url = self.register_url();
        info!(url = %url, address = %self.node_address, "Registering with control plane");

        let request = serde_json::json!({ "address": self.node_address });

        let resp = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Connection failed: {}", e))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(anyhow::anyhow!("Registration failed: {} - {}", status, body));
        }

        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    /// Register once, logging the outcome.
    pub async fn run(&self) {
        match self.register().await {
            Ok(response) => {
                info!(response = %response, "Registered with control plane");
            }
            Err(e) => {
                warn!(error = %e, "Failed to register node");
            }
        }
    }
}
