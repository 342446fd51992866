//! Core types for ShiftLight BLE connection tracking.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{IdentityError, IdentityResult, RecordError};

/// Maximum number of history entries retained per saved device.
pub const MAX_HISTORY_ENTRIES: usize = 50;

/// Disconnect reason recorded when a polled session ends.
pub const REASON_DISCONNECTED: &str = "Disconnected";

/// Disconnect reason recorded when a connect request fails immediately.
pub const REASON_CONNECTION_FAILED: &str = "Connection failed";

/// Identity of a BLE device as reported by the bridge.
///
/// The `address` is the stable key; the `name` is a display label that the
/// device firmware may change between attempts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceIdentity {
    /// Bluetooth address (primary key).
    pub address: String,
    /// Display name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
}

impl DeviceIdentity {
    /// Create a new identity without validation.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }

    /// Create an identity from user input, trimming the address and
    /// rejecting empty ones. An empty name falls back to the address.
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftlight_types::DeviceIdentity;
    ///
    /// let device = DeviceIdentity::parse(" AA:BB:CC:DD:EE:FF ", "").unwrap();
    /// assert_eq!(device.address, "AA:BB:CC:DD:EE:FF");
    /// assert_eq!(device.name, "AA:BB:CC:DD:EE:FF");
    /// assert!(DeviceIdentity::parse("  ", "OBDII").is_err());
    /// ```
    pub fn parse(address: &str, name: &str) -> IdentityResult<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(IdentityError::EmptyAddress);
        }
        let name = name.trim();
        let name = if name.is_empty() { address } else { name };
        Ok(Self::new(address, name))
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A device found by the bridge during a BLE scan.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct DiscoveredDevice {
    /// Bluetooth address.
    pub address: String,
    /// Advertised name.
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    /// Signal strength in dBm, if reported.
    #[cfg_attr(feature = "serde", serde(default))]
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// Identity used when connecting to this device.
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.address.clone(), self.name.clone())
    }
}

/// Point-in-time BLE status snapshot returned by the bridge.
///
/// `connected` is optional so that a malformed response without the flag
/// can be told apart from an explicit disconnect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct BleStatus {
    /// Whether a scan is in progress on the bridge.
    #[cfg_attr(feature = "serde", serde(default))]
    pub scanning: bool,
    /// Whether the bridge currently holds a BLE connection.
    #[cfg_attr(feature = "serde", serde(default))]
    pub connected: Option<bool>,
    /// The device the bridge is connected (or connecting) to.
    #[cfg_attr(feature = "serde", serde(default))]
    pub current_device: Option<DeviceIdentity>,
    /// Results of the most recent scan.
    #[cfg_attr(feature = "serde", serde(default))]
    pub devices: Vec<DiscoveredDevice>,
}

impl BleStatus {
    /// Snapshot with an explicit connection flag and optional device.
    pub fn new(connected: bool, current_device: Option<DeviceIdentity>) -> Self {
        Self {
            connected: Some(connected),
            current_device,
            ..Default::default()
        }
    }

    /// Convenience: connected snapshot for the given device.
    pub fn connected_to(device: DeviceIdentity) -> Self {
        Self::new(true, Some(device))
    }

    /// Convenience: disconnected snapshot with no device.
    pub fn disconnected() -> Self {
        Self::new(false, None)
    }
}

/// One connection outcome produced by the lifecycle monitor or by a
/// user-initiated connect.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct ConnectionAttempt {
    /// Device the attempt belongs to.
    pub device: DeviceIdentity,
    /// Whether the attempt is a success.
    pub success: bool,
    /// Session duration in milliseconds, when known.
    pub duration_ms: Option<u64>,
    /// Reason recorded for failures.
    pub reason: Option<String>,
    /// When the attempt happened.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub at: OffsetDateTime,
}

impl ConnectionAttempt {
    /// Create an attempt with explicit fields.
    pub fn new(
        device: DeviceIdentity,
        success: bool,
        duration_ms: Option<u64>,
        reason: Option<String>,
        at: OffsetDateTime,
    ) -> Self {
        Self {
            device,
            success,
            duration_ms,
            reason,
            at,
        }
    }

    /// A session start detected on a rising edge. Duration is unknown.
    pub fn connected(device: DeviceIdentity, at: OffsetDateTime) -> Self {
        Self::new(device, true, None, None, at)
    }

    /// A session end detected on a falling edge.
    pub fn disconnected(device: DeviceIdentity, duration_ms: u64, at: OffsetDateTime) -> Self {
        Self::new(
            device,
            false,
            Some(duration_ms),
            Some(REASON_DISCONNECTED.to_string()),
            at,
        )
    }

    /// A connect request rejected by the transport.
    pub fn connect_failed(device: DeviceIdentity, at: OffsetDateTime) -> Self {
        Self::new(
            device,
            false,
            None,
            Some(REASON_CONNECTION_FAILED.to_string()),
            at,
        )
    }
}

/// Immutable record of one connection attempt, kept in a device's history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct ConnectionHistoryEntry {
    /// Device address.
    pub address: String,
    /// Device name at the time of the attempt.
    pub name: String,
    /// When the attempt was recorded.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub timestamp: OffsetDateTime,
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Session duration in milliseconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub duration: Option<u64>,
    /// Why the session ended or the attempt failed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub disconnect_reason: Option<String>,
}

impl From<&ConnectionAttempt> for ConnectionHistoryEntry {
    fn from(attempt: &ConnectionAttempt) -> Self {
        Self {
            address: attempt.device.address.clone(),
            name: attempt.device.name.clone(),
            timestamp: attempt.at,
            success: attempt.success,
            duration: attempt.duration_ms,
            disconnect_reason: attempt.reason.clone(),
        }
    }
}

/// Aggregate connection record for one device address.
///
/// Persisted and exported with camelCase keys (`isFavorite`,
/// `totalConnections`, ...), like every other record in this crate.
///
/// Lifetime counters are a ledger that only grows; `history` is a bounded
/// window of the most recent entries (newest first). Fields are private so
/// that the counters can only move through [`SavedDevice::record`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct SavedDevice {
    address: String,
    name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    is_favorite: bool,
    #[cfg_attr(
        feature = "serde",
        serde(default, with = "time::serde::rfc3339::option")
    )]
    last_connected: Option<OffsetDateTime>,
    #[cfg_attr(feature = "serde", serde(default))]
    total_connections: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    successful_connections: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    failed_connections: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    average_connection_duration: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    history: Vec<ConnectionHistoryEntry>,
}

impl SavedDevice {
    /// Create the record for the first attempt seen for an address.
    pub fn from_attempt(attempt: &ConnectionAttempt) -> Self {
        let history = vec![ConnectionHistoryEntry::from(attempt)];
        let average_connection_duration = average_session_duration(&history);

        Self {
            address: attempt.device.address.clone(),
            name: attempt.device.name.clone(),
            is_favorite: false,
            last_connected: attempt.success.then_some(attempt.at),
            total_connections: 1,
            successful_connections: u64::from(attempt.success),
            failed_connections: u64::from(!attempt.success),
            average_connection_duration,
            history,
        }
    }

    /// Apply one attempt: prepend it to the history window, bump exactly one
    /// outcome counter, refresh the name and recompute the average.
    ///
    /// Fails without touching the record if a counter would overflow.
    pub fn record(&mut self, attempt: &ConnectionAttempt) -> Result<(), RecordError> {
        debug_assert_eq!(self.address, attempt.device.address);

        let overflow = || RecordError::CounterOverflow {
            address: self.address.clone(),
        };
        let total = self.total_connections.checked_add(1).ok_or_else(overflow)?;
        let (successful, failed) = if attempt.success {
            let successful = self.successful_connections.checked_add(1);
            (successful.ok_or_else(overflow)?, self.failed_connections)
        } else {
            let failed = self.failed_connections.checked_add(1);
            (self.successful_connections, failed.ok_or_else(overflow)?)
        };

        self.history.insert(0, ConnectionHistoryEntry::from(attempt));
        self.history.truncate(MAX_HISTORY_ENTRIES);

        self.total_connections = total;
        self.successful_connections = successful;
        self.failed_connections = failed;
        if attempt.success {
            self.last_connected = Some(attempt.at);
        }

        self.name = attempt.device.name.clone();
        self.average_connection_duration = average_session_duration(&self.history);
        Ok(())
    }

    /// Flip the favorite flag.
    pub fn toggle_favorite(&mut self) {
        self.is_favorite = !self.is_favorite;
    }

    /// Drop the history window. Counters and `last_connected` are kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.average_connection_duration = None;
    }

    /// Restore invariants on a record read from storage.
    ///
    /// Truncates an oversized history, recomputes the total and the average.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.history.truncate(MAX_HISTORY_ENTRIES);
        // Clamp the failure count so that the sum still fits
        self.failed_connections = self
            .failed_connections
            .min(u64::MAX - self.successful_connections);
        self.total_connections = self.successful_connections + self.failed_connections;
        self.average_connection_duration = average_session_duration(&self.history);
        self
    }

    /// Device address (primary key).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last-seen display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity built from the stored address and name.
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::new(self.address.clone(), self.name.clone())
    }

    /// Whether the user marked this device as a favorite.
    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    /// Time of the last successful attempt.
    pub fn last_connected(&self) -> Option<OffsetDateTime> {
        self.last_connected
    }

    /// Lifetime attempt count.
    pub fn total_connections(&self) -> u64 {
        self.total_connections
    }

    /// Lifetime successful attempts.
    pub fn successful_connections(&self) -> u64 {
        self.successful_connections
    }

    /// Lifetime failed attempts.
    pub fn failed_connections(&self) -> u64 {
        self.failed_connections
    }

    /// Mean duration in milliseconds of successful entries with a known
    /// duration in the current history window.
    pub fn average_connection_duration(&self) -> Option<f64> {
        self.average_connection_duration
    }

    /// Retained history, newest first.
    pub fn history(&self) -> &[ConnectionHistoryEntry] {
        &self.history
    }

    /// Lifetime success rate as a rounded percentage (0 when nothing was recorded).
    ///
    /// # Examples
    ///
    /// ```
    /// use shiftlight_types::{ConnectionAttempt, DeviceIdentity, SavedDevice};
    /// use time::OffsetDateTime;
    ///
    /// let obd = DeviceIdentity::new("AA:BB", "OBD1");
    /// let now = OffsetDateTime::now_utc();
    /// let mut device = SavedDevice::from_attempt(&ConnectionAttempt::connected(obd.clone(), now));
    /// device.record(&ConnectionAttempt::connect_failed(obd.clone(), now)).unwrap();
    /// device.record(&ConnectionAttempt::connect_failed(obd, now)).unwrap();
    /// assert_eq!(device.success_rate(), 33);
    /// ```
    pub fn success_rate(&self) -> u8 {
        if self.total_connections == 0 {
            return 0;
        }
        let rate = self.successful_connections as f64 / self.total_connections as f64 * 100.0;
        rate.round() as u8
    }
}

/// Mean of `duration` over successful entries that carry one.
fn average_session_duration(history: &[ConnectionHistoryEntry]) -> Option<f64> {
    let (sum, count) = history
        .iter()
        .filter(|entry| entry.success)
        .filter_map(|entry| entry.duration)
        .fold((0u128, 0u32), |(sum, count), d| (sum + u128::from(d), count + 1));

    (count > 0).then(|| sum as f64 / f64::from(count))
}

/// Format a millisecond duration for display: `1h 5m`, `3m 20s` or `42s`.
///
/// # Examples
///
/// ```
/// use shiftlight_types::format_duration;
///
/// assert_eq!(format_duration(42_000), "42s");
/// assert_eq!(format_duration(200_000), "3m 20s");
/// assert_eq!(format_duration(3_900_000), "1h 5m");
/// ```
#[must_use]
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
