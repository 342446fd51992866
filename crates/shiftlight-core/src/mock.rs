//! Mock bridge implementation for testing.
//!
//! This module provides a mock bridge that can be used for unit testing
//! without an ESP32 on the network.
//!
//! # Features
//!
//! - **Scripted snapshots**: Queue status responses (or failures) returned in order
//! - **Failure injection**: Make status fetches or connect requests fail
//! - **Latency simulation**: Delay status responses to exercise slow ticks
//! - **Call tracking**: Count status fetches and record connect requests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use shiftlight_types::{BleStatus, DeviceIdentity, DiscoveredDevice};

use crate::error::{Error, Result};
use crate::traits::Bridge;

/// One scripted answer to a status fetch.
#[derive(Debug, Clone)]
enum Step {
    Status(BleStatus),
    Fail(String),
}

#[derive(Debug, Default)]
struct MockState {
    script: RwLock<VecDeque<Step>>,
    current: RwLock<BleStatus>,
    discovered: RwLock<Vec<DiscoveredDevice>>,
    connect_requests: RwLock<Vec<(DeviceIdentity, u32)>>,
    fail_status: AtomicBool,
    fail_connect: AtomicBool,
    status_calls: AtomicU32,
    scan_calls: AtomicU32,
    status_latency_ms: AtomicU64,
}

/// A mock bridge for testing.
///
/// Clones share state, so a test can keep a handle to script responses
/// while a [`Poller`](crate::Poller) owns another.
///
/// Once the script is exhausted, the last returned status keeps being
/// returned. A successful connect request makes the bridge report that
/// device as connected.
///
/// # Example
///
/// ```
/// use shiftlight_core::{Bridge, MockBridge};
/// use shiftlight_types::{BleStatus, DeviceIdentity};
///
/// #[tokio::main]
/// async fn main() {
///     let bridge = MockBridge::new();
///     bridge.push_status(BleStatus::connected_to(DeviceIdentity::new("AA:BB", "OBD1"))).await;
///
///     let status = bridge.fetch_status().await.unwrap();
///     assert_eq!(status.connected, Some(true));
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockBridge {
    state: Arc<MockState>,
}

impl MockBridge {
    /// Create a disconnected mock bridge.
    pub fn new() -> Self {
        MockBridgeBuilder::new().build()
    }

    /// Create a builder for a customized mock bridge.
    pub fn builder() -> MockBridgeBuilder {
        MockBridgeBuilder::new()
    }

    /// Queue a status snapshot.
    pub async fn push_status(&self, status: BleStatus) {
        self.state.script.write().await.push_back(Step::Status(status));
    }

    /// Queue a failed status fetch.
    pub async fn push_failure(&self, message: &str) {
        self.state
            .script
            .write()
            .await
            .push_back(Step::Fail(message.to_string()));
    }

    /// Replace the status returned once the script is exhausted.
    pub async fn set_status(&self, status: BleStatus) {
        *self.state.current.write().await = status;
    }

    /// Set devices reported after a scan.
    pub async fn set_discovered(&self, devices: Vec<DiscoveredDevice>) {
        *self.state.discovered.write().await = devices;
    }

    /// Make every status fetch fail (or succeed again).
    pub fn set_fail_status(&self, fail: bool) {
        self.state.fail_status.store(fail, Ordering::SeqCst);
    }

    /// Make connect requests fail (or succeed again).
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Delay every status fetch by `latency`.
    pub fn set_status_latency(&self, latency: Duration) {
        self.state
            .status_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of status fetches so far.
    pub fn status_calls(&self) -> u32 {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    /// Number of scan requests so far.
    pub fn scan_calls(&self) -> u32 {
        self.state.scan_calls.load(Ordering::SeqCst)
    }

    /// Connect requests received, with their attempt counts.
    pub async fn connect_requests(&self) -> Vec<(DeviceIdentity, u32)> {
        self.state.connect_requests.read().await.clone()
    }

    /// Scripted steps not consumed yet.
    pub async fn remaining_steps(&self) -> usize {
        self.state.script.read().await.len()
    }
}

impl Default for MockBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Bridge for MockBridge {
    async fn fetch_status(&self) -> Result<BleStatus> {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.state.status_latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.state.fail_status.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 503,
                message: "Mock failure".to_string(),
            });
        }

        let step = self.state.script.write().await.pop_front();
        match step {
            Some(Step::Status(status)) => {
                *self.state.current.write().await = status.clone();
                Ok(status)
            }
            Some(Step::Fail(message)) => Err(Error::Api {
                status: 503,
                message,
            }),
            None => Ok(self.state.current.read().await.clone()),
        }
    }

    async fn start_scan(&self) -> Result<()> {
        self.state.scan_calls.fetch_add(1, Ordering::SeqCst);
        let discovered = self.state.discovered.read().await.clone();

        let mut current = self.state.current.write().await;
        current.scanning = false;
        current.devices = discovered;
        Ok(())
    }

    async fn connect_device(&self, device: &DeviceIdentity, attempts: u32) -> Result<()> {
        self.state
            .connect_requests
            .write()
            .await
            .push((device.clone(), attempts));

        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::ConnectFailed(format!("{} is unreachable", device)));
        }

        *self.state.current.write().await = BleStatus::connected_to(device.clone());
        Ok(())
    }
}

/// Builder for creating mock bridges with custom settings.
#[derive(Debug, Default)]
pub struct MockBridgeBuilder {
    script: Vec<Step>,
    initial: Option<BleStatus>,
    discovered: Vec<DiscoveredDevice>,
    fail_connect: bool,
    status_latency: Duration,
}

impl MockBridgeBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Status returned when no scripted step is pending.
    pub fn initial_status(mut self, status: BleStatus) -> Self {
        self.initial = Some(status);
        self
    }

    /// Append scripted snapshots.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = BleStatus>) -> Self {
        self.script.extend(statuses.into_iter().map(Step::Status));
        self
    }

    /// Append one scripted fetch failure.
    pub fn failure(mut self, message: &str) -> Self {
        self.script.push(Step::Fail(message.to_string()));
        self
    }

    /// Devices reported after a scan.
    pub fn discovered(mut self, devices: Vec<DiscoveredDevice>) -> Self {
        self.discovered = devices;
        self
    }

    /// Make connect requests fail.
    pub fn fail_connect(mut self, fail: bool) -> Self {
        self.fail_connect = fail;
        self
    }

    /// Delay every status fetch.
    pub fn status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    /// Build the mock bridge.
    pub fn build(self) -> MockBridge {
        let state = MockState {
            script: RwLock::new(self.script.into()),
            current: RwLock::new(self.initial.unwrap_or_else(BleStatus::disconnected)),
            discovered: RwLock::new(self.discovered),
            fail_connect: AtomicBool::new(self.fail_connect),
            status_latency_ms: AtomicU64::new(self.status_latency.as_millis() as u64),
            ..MockState::default()
        };
        MockBridge {
            state: Arc::new(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obd() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB", "OBD1")
    }

    #[tokio::test]
    async fn test_new_bridge_is_disconnected() {
        let bridge = MockBridge::new();
        let status = bridge.fetch_status().await.unwrap();
        assert_eq!(status.connected, Some(false));
        assert_eq!(bridge.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_script_then_sticky_last_status() {
        let bridge = MockBridge::builder()
            .statuses([BleStatus::connected_to(obd())])
            .failure("boom")
            .build();

        assert_eq!(bridge.fetch_status().await.unwrap().connected, Some(true));
        assert!(bridge.fetch_status().await.is_err());
        // Failure does not replace the sticky status
        assert_eq!(bridge.fetch_status().await.unwrap().connected, Some(true));
        assert_eq!(bridge.remaining_steps().await, 0);
    }

    #[tokio::test]
    async fn test_fail_status() {
        let bridge = MockBridge::new();
        bridge.set_fail_status(true);
        assert!(matches!(
            bridge.fetch_status().await,
            Err(Error::Api { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_success_reports_connected() {
        let bridge = MockBridge::new();
        bridge.connect_device(&obd(), 3).await.unwrap();

        let status = bridge.fetch_status().await.unwrap();
        assert_eq!(status.current_device, Some(obd()));
        assert_eq!(bridge.connect_requests().await, vec![(obd(), 3)]);
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let bridge = MockBridge::builder().fail_connect(true).build();
        let result = bridge.connect_device(&obd(), 1).await;

        assert!(matches!(result, Err(Error::ConnectFailed(_))));
        assert_eq!(
            bridge.fetch_status().await.unwrap().connected,
            Some(false)
        );
    }

    #[tokio::test]
    async fn test_scan_populates_devices() {
        let bridge = MockBridge::builder()
            .discovered(vec![DiscoveredDevice {
                address: "CC:DD".to_string(),
                name: "VLINK".to_string(),
                rssi: Some(-70),
            }])
            .build();

        bridge.start_scan().await.unwrap();
        let status = bridge.fetch_status().await.unwrap();
        assert_eq!(status.devices.len(), 1);
        assert_eq!(bridge.scan_calls(), 1);
    }
}
