//! Trait abstraction over the ShiftLight BLE bridge.
//!
//! This module provides the [`Bridge`] trait that abstracts over the real
//! HTTP bridge and the mock bridge used in tests.

use async_trait::async_trait;

use shiftlight_types::{BleStatus, DeviceIdentity};

use crate::error::Result;

/// Operations the ESP32 bridge exposes for its BLE link to the OBD adapter.
///
/// The bridge has no push channel: connection changes can only be observed
/// by polling [`Bridge::fetch_status`].
///
/// # Example
///
/// ```ignore
/// use shiftlight_core::{Bridge, Result};
///
/// async fn print_status<B: Bridge>(bridge: &B) -> Result<()> {
///     let status = bridge.fetch_status().await?;
///     println!("connected: {:?}", status.connected);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Bridge: Send + Sync {
    /// Fetch the current BLE status snapshot.
    async fn fetch_status(&self) -> Result<BleStatus>;

    /// Ask the bridge to start scanning for BLE devices.
    ///
    /// Results show up in later status snapshots.
    async fn start_scan(&self) -> Result<()>;

    /// Ask the bridge to connect to `device`, retrying up to `attempts` times
    /// on its side.
    async fn connect_device(&self, device: &DeviceIdentity, attempts: u32) -> Result<()>;
}

#[async_trait]
impl<B: Bridge + ?Sized> Bridge for std::sync::Arc<B> {
    async fn fetch_status(&self) -> Result<BleStatus> {
        (**self).fetch_status().await
    }

    async fn start_scan(&self) -> Result<()> {
        (**self).start_scan().await
    }

    async fn connect_device(&self, device: &DeviceIdentity, attempts: u32) -> Result<()> {
        (**self).connect_device(device, attempts).await
    }
}
