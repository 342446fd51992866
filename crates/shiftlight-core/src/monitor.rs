//! Connection lifecycle detection from polled status snapshots.
//!
//! The bridge only reports its current state, so connects and disconnects
//! have to be inferred by comparing consecutive snapshots. The
//! [`LifecycleMonitor`] is the small state machine that does this and turns
//! each edge into a [`ConnectionAttempt`].
//!
//! ```
//! use shiftlight_core::monitor::{LifecycleMonitor, Transition};
//! use shiftlight_types::{BleStatus, DeviceIdentity};
//! use time::{Duration, OffsetDateTime};
//!
//! let obd = DeviceIdentity::new("AA:BB", "OBD1");
//! let t0 = OffsetDateTime::now_utc();
//! let mut monitor = LifecycleMonitor::new();
//!
//! let up = monitor.on_snapshot_at(&BleStatus::connected_to(obd), t0);
//! assert!(matches!(up, Some(Transition::Attempt(a)) if a.success));
//!
//! let down = monitor.on_snapshot_at(&BleStatus::disconnected(), t0 + Duration::seconds(9));
//! assert!(matches!(down, Some(Transition::Attempt(a)) if a.duration_ms == Some(9000)));
//! ```

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use shiftlight_types::{BleStatus, ConnectionAttempt, DeviceIdentity};

/// Connection state as last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected (or nothing observed yet).
    #[default]
    Idle,
    /// Connected since the rising edge at `since`.
    Connected {
        #[serde(with = "time::serde::rfc3339")]
        since: OffsetDateTime,
    },
}

impl ConnectionState {
    /// Whether the last snapshot reported a connection.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// Direction of a detected transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Disconnected to connected.
    Rising,
    /// Connected to disconnected.
    Falling,
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
        }
    }
}

/// Outcome of evaluating one snapshot that crossed an edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// An attempt ready to be recorded.
    Attempt(ConnectionAttempt),
    /// An edge fired before any device identity was known, so there is
    /// nothing to key a record by.
    Dropped(Edge),
}

impl Transition {
    /// The attempt, if one was produced.
    pub fn attempt(&self) -> Option<&ConnectionAttempt> {
        match self {
            Self::Attempt(attempt) => Some(attempt),
            Self::Dropped(_) => None,
        }
    }
}

/// Edge-detecting state machine over bridge status snapshots.
///
/// State is ephemeral. Evaluations must be serialized by the caller; the
/// [`Poller`](crate::Poller) keeps the monitor behind a mutex for that.
#[derive(Debug, Clone, Default)]
pub struct LifecycleMonitor {
    state: ConnectionState,
    last_known_device: Option<DeviceIdentity>,
    dropped_attempts: u32,
}

impl LifecycleMonitor {
    /// Create a monitor in the idle state with no known device.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate a snapshot taken now.
    pub fn on_snapshot(&mut self, status: &BleStatus) -> Option<Transition> {
        self.on_snapshot_at(status, OffsetDateTime::now_utc())
    }

    /// Evaluate a snapshot taken at `now`.
    ///
    /// A reported `current_device` always replaces the last known device
    /// before edges are evaluated. A snapshot without a `connected` flag is
    /// treated as no change.
    pub fn on_snapshot_at(
        &mut self,
        status: &BleStatus,
        now: OffsetDateTime,
    ) -> Option<Transition> {
        if let Some(device) = &status.current_device {
            self.last_known_device = Some(device.clone());
        }

        let connected = status.connected?;

        match (self.state, connected) {
            (ConnectionState::Idle, true) => {
                self.state = ConnectionState::Connected { since: now };
                Some(self.emit(Edge::Rising, |device| {
                    ConnectionAttempt::connected(device, now)
                }))
            }
            (ConnectionState::Connected { since }, false) => {
                self.state = ConnectionState::Idle;
                let duration_ms = elapsed_ms(since, now);
                Some(self.emit(Edge::Falling, |device| {
                    ConnectionAttempt::disconnected(device, duration_ms, now)
                }))
            }
            _ => None,
        }
    }

    /// A connect request was accepted by the bridge; remember the device
    /// so that the next edges are attributed to it.
    pub fn on_connect_requested(&mut self, device: &DeviceIdentity) {
        debug!("Connect requested for {}", device);
        self.last_known_device = Some(device.clone());
    }

    /// A connect request failed immediately. Produces the failed attempt;
    /// the edge state is not touched.
    pub fn on_connect_failed(
        &mut self,
        device: &DeviceIdentity,
        now: OffsetDateTime,
    ) -> ConnectionAttempt {
        info!("Connection to {} failed", device);
        ConnectionAttempt::connect_failed(device.clone(), now)
    }

    /// Current edge state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether the last snapshot reported a connection.
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Most recently reported or requested device.
    pub fn last_known_device(&self) -> Option<&DeviceIdentity> {
        self.last_known_device.as_ref()
    }

    /// Number of edges skipped because no device identity was known.
    pub fn dropped_attempts(&self) -> u32 {
        self.dropped_attempts
    }

    fn emit(
        &mut self,
        edge: Edge,
        build: impl FnOnce(DeviceIdentity) -> ConnectionAttempt,
    ) -> Transition {
        match self.last_known_device.clone() {
            Some(device) => {
                info!("Detected {} edge for {}", edge, device);
                Transition::Attempt(build(device))
            }
            None => {
                self.dropped_attempts = self.dropped_attempts.saturating_add(1);
                warn!("Dropping {} edge: no device identity known yet", edge);
                Transition::Dropped(edge)
            }
        }
    }
}

fn elapsed_ms(since: OffsetDateTime, now: OffsetDateTime) -> u64 {
    u64::try_from((now - since).whole_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftlight_types::{REASON_CONNECTION_FAILED, REASON_DISCONNECTED};
    use time::Duration;

    fn obd() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB", "OBD1")
    }

    fn t(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap() + Duration::seconds(secs)
    }

    fn status(connected: Option<bool>, device: Option<DeviceIdentity>) -> BleStatus {
        BleStatus {
            connected,
            current_device: device,
            ..BleStatus::default()
        }
    }

    fn attempts(transitions: impl IntoIterator<Item = Option<Transition>>) -> Vec<ConnectionAttempt> {
        transitions
            .into_iter()
            .flatten()
            .filter_map(|t| t.attempt().cloned())
            .collect()
    }

    #[test]
    fn test_connect_then_disconnect_sequence() {
        let mut m = LifecycleMonitor::new();
        let out = attempts([
            m.on_snapshot_at(&status(Some(false), None), t(0)),
            m.on_snapshot_at(&status(Some(true), Some(obd())), t(3)),
            m.on_snapshot_at(&status(Some(true), None), t(6)),
            m.on_snapshot_at(&status(Some(false), None), t(9)),
        ]);

        assert_eq!(out.len(), 2);
        assert!(out[0].success);
        assert_eq!(out[0].duration_ms, None);
        assert_eq!(out[0].device, obd());
        assert_eq!(out[0].at, t(3));

        assert!(!out[1].success);
        assert_eq!(out[1].duration_ms, Some(6000));
        assert_eq!(out[1].reason.as_deref(), Some(REASON_DISCONNECTED));
        assert_eq!(out[1].device, obd());
    }

    #[test]
    fn test_identity_from_same_snapshot_is_used_on_rising_edge() {
        let mut m = LifecycleMonitor::new();
        let t1 = m.on_snapshot_at(&status(Some(true), Some(obd())), t(0));
        assert_eq!(t1.unwrap().attempt().unwrap().device, obd());
    }

    #[test]
    fn test_steady_states_emit_nothing() {
        let mut m = LifecycleMonitor::new();
        assert!(m.on_snapshot_at(&status(Some(false), None), t(0)).is_none());
        assert!(m.on_snapshot_at(&status(Some(false), None), t(3)).is_none());

        m.on_snapshot_at(&status(Some(true), Some(obd())), t(6));
        assert!(m.on_snapshot_at(&status(Some(true), Some(obd())), t(9)).is_none());
        assert!(m.is_connected());
    }

    #[test]
    fn test_missing_connected_flag_is_no_change() {
        let mut m = LifecycleMonitor::new();
        m.on_snapshot_at(&status(Some(true), Some(obd())), t(0));

        assert!(m.on_snapshot_at(&status(None, None), t(3)).is_none());
        assert_eq!(m.state(), ConnectionState::Connected { since: t(0) });

        // Session timing is unaffected by the gap
        let down = m.on_snapshot_at(&status(Some(false), None), t(10));
        assert_eq!(down.unwrap().attempt().unwrap().duration_ms, Some(10_000));
    }

    #[test]
    fn test_missing_connected_flag_still_updates_identity() {
        let mut m = LifecycleMonitor::new();
        m.on_snapshot_at(&status(None, Some(obd())), t(0));
        assert_eq!(m.last_known_device(), Some(&obd()));
    }

    #[test]
    fn test_edge_without_identity_is_dropped() {
        let mut m = LifecycleMonitor::new();

        let up = m.on_snapshot_at(&status(Some(true), None), t(0));
        assert_eq!(up, Some(Transition::Dropped(Edge::Rising)));
        assert!(m.is_connected());

        let down = m.on_snapshot_at(&status(Some(false), None), t(5));
        assert_eq!(down, Some(Transition::Dropped(Edge::Falling)));
        assert_eq!(m.dropped_attempts(), 2);
    }

    #[test]
    fn test_falling_edge_uses_last_known_device() {
        let mut m = LifecycleMonitor::new();
        m.on_snapshot_at(&status(Some(true), Some(obd())), t(0));

        let down = m.on_snapshot_at(&status(Some(false), None), t(4));
        assert_eq!(down.unwrap().attempt().unwrap().device, obd());
    }

    #[test]
    fn test_connect_requested_sets_identity() {
        let mut m = LifecycleMonitor::new();
        m.on_connect_requested(&obd());

        let up = m.on_snapshot_at(&status(Some(true), None), t(0));
        assert_eq!(up.unwrap().attempt().unwrap().device, obd());
    }

    #[test]
    fn test_connect_failed_attempt() {
        let mut m = LifecycleMonitor::new();
        let attempt = m.on_connect_failed(&obd(), t(0));

        assert!(!attempt.success);
        assert_eq!(attempt.duration_ms, None);
        assert_eq!(attempt.reason.as_deref(), Some(REASON_CONNECTION_FAILED));
        assert_eq!(m.state(), ConnectionState::Idle);
    }

    #[test]
    fn test_flapping_records_every_edge() {
        let mut m = LifecycleMonitor::new();
        let mut snapshots = Vec::new();
        for i in 0..6 {
            let connected = i % 2 == 0;
            snapshots.push(m.on_snapshot_at(&status(Some(connected), Some(obd())), t(i)));
        }
        assert_eq!(attempts(snapshots).len(), 6);
    }

    #[test]
    fn test_clock_going_backwards_yields_zero_duration() {
        let mut m = LifecycleMonitor::new();
        m.on_snapshot_at(&status(Some(true), Some(obd())), t(10));
        let down = m.on_snapshot_at(&status(Some(false), None), t(5));
        assert_eq!(down.unwrap().attempt().unwrap().duration_ms, Some(0));
    }

    #[test]
    fn test_state_serializes_with_tag() {
        let json = serde_json::to_value(ConnectionState::Connected { since: t(0) }).unwrap();
        assert_eq!(json["state"], "connected");
        assert_eq!(json["since"], "2023-11-14T22:13:20Z");
    }
}
