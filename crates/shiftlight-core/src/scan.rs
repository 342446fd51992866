//! Bridge-side BLE scanning.
//!
//! The bridge scans on its own once asked to; results appear in later status
//! snapshots and `scanning` drops back to `false` when it is done.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use shiftlight_types::DiscoveredDevice;

use crate::error::{Error, Result};
use crate::traits::Bridge;

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to wait for the bridge to finish scanning.
    pub timeout: Duration,
    /// How often to poll the bridge while it scans.
    pub poll_interval: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the scan timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the status polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config(
                "scan poll interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Start a scan and wait for the bridge to report its results.
///
/// If the bridge is still scanning when the timeout elapses, the devices
/// listed so far are returned.
pub async fn scan<B: Bridge + ?Sized>(
    bridge: &B,
    options: &ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    options.validate()?;

    info!("Starting BLE scan (timeout {:?})", options.timeout);
    bridge.start_scan().await?;

    let deadline = Instant::now() + options.timeout;
    loop {
        sleep(options.poll_interval).await;

        let status = bridge.fetch_status().await?;
        if !status.scanning {
            debug!("Scan finished with {} device(s)", status.devices.len());
            return Ok(status.devices);
        }

        if Instant::now() >= deadline {
            warn!(
                "Bridge still scanning after {:?}, returning {} device(s) found so far",
                options.timeout,
                status.devices.len()
            );
            return Ok(status.devices);
        }
    }
}
