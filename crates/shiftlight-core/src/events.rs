//! Monitor event system for connection notifications.
//!
//! The [`Poller`](crate::Poller) broadcasts a [`MonitorEvent`] for every
//! detected edge, failed connect, swallowed poll error and dropped attempt,
//! so presentation code can react without polling the store.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;

use shiftlight_types::{ConnectionAttempt, DeviceIdentity};

use crate::monitor::Edge;

/// Events emitted while monitoring the bridge.
///
/// All events are serializable for logging and IPC.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
#[non_exhaustive]
pub enum MonitorEvent {
    /// Rising edge: the bridge reports a connection.
    Connected {
        device: DeviceIdentity,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    /// Falling edge: the session ended.
    Disconnected {
        device: DeviceIdentity,
        duration_ms: Option<u64>,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    /// A connect request failed immediately.
    ConnectFailed {
        device: DeviceIdentity,
        error: String,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    },
    /// A status fetch failed; the tick was skipped.
    PollFailed {
        error: String,
        consecutive_failures: u32,
    },
    /// An edge fired with no known device and was not recorded.
    AttemptDropped { edge: Edge },
    /// An attempt could not be persisted.
    RecordFailed {
        device: DeviceIdentity,
        error: String,
    },
}

impl MonitorEvent {
    /// Event describing an attempt produced by an edge.
    pub fn from_edge(attempt: &ConnectionAttempt) -> Self {
        if attempt.success {
            Self::Connected {
                device: attempt.device.clone(),
                at: attempt.at,
            }
        } else {
            Self::Disconnected {
                device: attempt.device.clone(),
                duration_ms: attempt.duration_ms,
                at: attempt.at,
            }
        }
    }
}

/// Sender for monitor events.
pub type EventSender = broadcast::Sender<MonitorEvent>;

/// Receiver for monitor events.
pub type EventReceiver = broadcast::Receiver<MonitorEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: MonitorEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(100)
    }
}
