//! Lightweight REST client for CLI commands.
//!
//! CLI subcommands (`tetherd status`, `tetherd location set|clear`) use this
//! to talk to the running daemon's HTTP API on localhost.

use anyhow::{anyhow, Context as _, Result};
use serde_json::{json, Value};

use crate::geo::Coordinate;

/// A short-lived HTTP client for CLI-to-daemon calls.
pub struct DaemonClient {
    base_url: String,
    http: reqwest::Client,
}

impl DaemonClient {
    /// Create a client targeting the daemon on the given port.
    pub fn new(port: u16) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: format!("http://127.0.0.1:{port}/api/v1"),
            http,
        })
    }

    /// Probe the daemon with a short (3 s) health request.
    pub async fn is_reachable(&self) -> bool {
        let req = self.http.get(format!("{}/health", self.base_url)).send();
        matches!(
            tokio::time::timeout(std::time::Duration::from_secs(3), req).await,
            Ok(Ok(resp)) if resp.status().is_success()
        )
    }

    /// Fetch the daemon health document.
    pub async fn health(&self) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .context("failed to reach daemon")?;
        Ok(Self::check(resp).await?.json().await?)
    }

    /// Push a location fix into the running daemon.
    pub async fn set_location(&self, coord: Coordinate) -> Result<()> {
        let resp = self
            .http
            .put(format!("{}/location", self.base_url))
            .json(&json!({
                "latitude": coord.latitude,
                "longitude": coord.longitude,
            }))
            .send()
            .await
            .context("failed to reach daemon")?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Mark the location unknown.
    pub async fn clear_location(&self) -> Result<()> {
        let resp = self
            .http
            .delete(format!("{}/location", self.base_url))
            .send()
            .await
            .context("failed to reach daemon")?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Turn non-2xx responses into errors carrying the daemon's `error` field.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .unwrap_or_else(|| "no detail".to_string());
        Err(anyhow!("daemon returned {status}: {detail}"))
    }
}
