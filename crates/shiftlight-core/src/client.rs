//! HTTP client for the ShiftLight bridge REST API.
//!
//! The ESP32 firmware serves a small HTTP API on its access point. This
//! module covers the BLE part of it: status snapshots, scanning and connect
//! requests.
//!
//! # Example
//!
//! ```no_run
//! use shiftlight_core::{Bridge, BridgeClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BridgeClient::new("http://192.168.4.1")?;
//!
//! let status = client.fetch_status().await?;
//! println!("Connected: {:?}", status.connected);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use shiftlight_types::{BleStatus, DeviceIdentity};

use crate::error::{Error, Result};
use crate::traits::Bridge;

/// Default bridge address when running as its own access point.
pub const DEFAULT_BRIDGE_URL: &str = "http://192.168.4.1";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the bridge API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BridgeClient {
    /// Create a new client with the default timeout.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the bridge (e.g., "http://192.168.4.1")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a new client with a custom per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Request)?;

        Ok(Self {
            client,
            base_url: normalize_url(base_url)?,
            timeout,
        })
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check if the bridge answers a status request.
    pub async fn is_reachable(&self) -> bool {
        self.fetch_status().await.is_ok()
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(&self, operation: &str, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(operation, self.timeout)
        } else {
            Error::NotReachable {
                url: url.to_string(),
                source: e,
            }
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .ok()
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty() && body.len() <= 200)
            .unwrap_or_else(|| status.to_string());

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Bridge for BridgeClient {
    async fn fetch_status(&self) -> Result<BleStatus> {
        let url = self.url("/ble/status");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.send_error("fetch_status", &url, e))?;

        let status: BleStatus = Self::check_status(response).await?.json().await?;
        debug!(
            "Bridge status: connected={:?} scanning={} devices={}",
            status.connected,
            status.scanning,
            status.devices.len()
        );
        Ok(status)
    }

    async fn start_scan(&self) -> Result<()> {
        let url = self.url("/ble/scan");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.send_error("start_scan", &url, e))?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn connect_device(&self, device: &DeviceIdentity, attempts: u32) -> Result<()> {
        let url = self.url("/ble/connect-device");
        let attempts = attempts.to_string();
        let form = [
            ("address", device.address.as_str()),
            ("name", device.name.as_str()),
            ("attempts", attempts.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.send_error("connect_device", &url, e))?;

        match Self::check_status(response).await {
            Ok(_) => Ok(()),
            Err(Error::Api { status, message }) => Err(Error::ConnectFailed(format!(
                "{} rejected by bridge ({}): {}",
                device, status, message
            ))),
            Err(e) => Err(e),
        }
    }
}

/// Trim a trailing slash and require an http(s) scheme.
fn normalize_url(base_url: &str) -> Result<String> {
    let base_url = base_url.trim().trim_end_matches('/').to_string();

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Ok(base_url)
}
