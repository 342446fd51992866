//! Platform-agnostic types for ShiftLight BLE connection history.
//!
//! This crate provides the data model shared by the lifecycle monitor
//! (shiftlight-core), the persisted history store (shiftlight-store) and the
//! command-line interface.
//!
//! # Features
//!
//! - Device identity and bridge status snapshots
//! - Connection attempts and immutable history entries
//! - The per-device aggregate record with its update rule
//! - The [`AttemptSink`] seam between monitor and store
//!
//! # Example
//!
//! ```
//! use shiftlight_types::{ConnectionAttempt, DeviceIdentity, SavedDevice};
//! use time::OffsetDateTime;
//!
//! let obd = DeviceIdentity::new("AA:BB", "OBD1");
//! let attempt = ConnectionAttempt::new(obd, true, Some(5000), None, OffsetDateTime::now_utc());
//! let device = SavedDevice::from_attempt(&attempt);
//!
//! assert_eq!(device.total_connections(), 1);
//! assert_eq!(device.average_connection_duration(), Some(5000.0));
//! ```

pub mod error;
pub mod sink;
pub mod types;

pub use error::{IdentityError, IdentityResult, RecordError};
pub use sink::AttemptSink;
pub use types::{
    BleStatus, ConnectionAttempt, ConnectionHistoryEntry, DeviceIdentity, DiscoveredDevice,
    MAX_HISTORY_ENTRIES, REASON_CONNECTION_FAILED, REASON_DISCONNECTED, SavedDevice,
    format_duration,
};
