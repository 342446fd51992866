//! BLE bridge client and connection lifecycle monitor for ShiftLight.
//!
//! The ShiftLight controller reaches the car's OBD-II adapter through a BLE
//! bridge that only exposes its *current* status over HTTP. This crate turns
//! that polled status into discrete connection attempts.
//!
//! # Features
//!
//! - **Bridge client**: status, scan and connect requests over HTTP
//! - **Lifecycle detection**: rising/falling edge state machine over snapshots
//! - **Polling**: non-reentrant interval loop with cancellation
//! - **Events**: broadcast notifications for edges and failures
//! - **Testing**: a scriptable [`MockBridge`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shiftlight_core::{BridgeClient, Poller, PollerConfig};
//! use shiftlight_types::ConnectionAttempt;
//! use tokio::sync::Mutex;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = BridgeClient::new("http://192.168.4.1")?;
//!     let attempts = Arc::new(Mutex::new(Vec::<ConnectionAttempt>::new()));
//!     let poller = Poller::new(bridge, attempts, PollerConfig::default())?;
//!
//!     let mut events = poller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("{:?}", event);
//!         }
//!     });
//!
//!     poller.run(CancellationToken::new()).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod events;
pub mod mock;
pub mod monitor;
pub mod poller;
pub mod scan;
pub mod traits;

pub use client::{BridgeClient, DEFAULT_BRIDGE_URL, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventReceiver, EventSender, MonitorEvent};
pub use mock::{MockBridge, MockBridgeBuilder};
pub use monitor::{ConnectionState, Edge, LifecycleMonitor, Transition};
pub use poller::{DEFAULT_CONNECT_ATTEMPTS, DEFAULT_POLL_INTERVAL, Poller, PollerConfig};
pub use scan::{ScanOptions, scan};
pub use traits::Bridge;

// Re-export the data model
pub use shiftlight_types;
