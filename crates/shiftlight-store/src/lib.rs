//! Persisted BLE connection history for ShiftLight.
//!
//! This crate keeps one aggregate record per device address, updated on
//! every connection attempt, and writes the whole collection back to durable
//! storage after each change.
//!
//! # Features
//!
//! - Upsert a device record per attempt (bounded newest-first history)
//! - Favorites, history clearing and removal
//! - Listing sorted by favorite flag and recency
//! - SQLite storage, or an in-memory backend for tests
//! - CSV and JSON export
//!
//! # Example
//!
//! ```no_run
//! use shiftlight_store::HistoryStore;
//! use shiftlight_types::DeviceIdentity;
//!
//! let mut store = HistoryStore::open_default()?;
//! let obd = DeviceIdentity::new("AA:BB:CC:DD:EE:FF", "OBDII");
//!
//! store.record_attempt(&obd, true, None, None)?;
//! for device in store.list_sorted() {
//!     println!("{} ({}%)", device.name(), device.success_rate());
//! }
//! # Ok::<(), shiftlight_store::Error>(())
//! ```

mod backend;
mod error;
pub mod export;
mod schema;
mod store;

pub use backend::{Backend, Change, MemoryBackend, SqliteBackend};
pub use error::{Error, Result};
pub use store::{HistoryStore, STORE_KEY};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/shiftlight/history.db`
/// - macOS: `~/Library/Application Support/shiftlight/history.db`
/// - Windows: `C:\Users\<user>\AppData\Local\shiftlight\history.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("shiftlight")
        .join("history.db")
}
