//! Main store implementation.

use std::path::Path;

use time::OffsetDateTime;
use tracing::{debug, info};

use shiftlight_types::{AttemptSink, ConnectionAttempt, DeviceIdentity, SavedDevice};

use crate::backend::{Backend, Change, SqliteBackend};
use crate::error::Result;

/// Key under which the device collection is persisted.
pub const STORE_KEY: &str = "ble-device-history";

/// Persisted collection of per-device connection aggregates.
///
/// Reads are served from an in-memory view. Every mutation re-reads the
/// stored collection inside one backend transaction, applies the change and
/// writes the result back, so several stores (or processes) sharing one
/// database never undo each other's changes. The view is refreshed from
/// that transaction; a failed mutation leaves both the backend and the view
/// unchanged.
pub struct HistoryStore<B = SqliteBackend> {
    backend: B,
    key: String,
    devices: Vec<SavedDevice>,
}

impl HistoryStore<SqliteBackend> {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_backend(SqliteBackend::open(path)?)
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::with_backend(SqliteBackend::open_in_memory()?)
    }
}

impl<B: Backend> HistoryStore<B> {
    /// Load the collection from `backend` under the default key.
    pub fn with_backend(backend: B) -> Result<Self> {
        Self::with_backend_and_key(backend, STORE_KEY)
    }

    /// Load the collection from `backend` under a custom key.
    pub fn with_backend_and_key(backend: B, key: &str) -> Result<Self> {
        let devices = normalize(backend.load(key)?);

        info!("Loaded {} saved device(s)", devices.len());

        Ok(Self {
            backend,
            key: key.to_string(),
            devices,
        })
    }

    /// Record one connection attempt happening now.
    ///
    /// Creates the record on the first attempt for an address. Every call is
    /// a distinct attempt; identical calls are not merged.
    pub fn record_attempt(
        &mut self,
        device: &DeviceIdentity,
        success: bool,
        duration_ms: Option<u64>,
        disconnect_reason: Option<&str>,
    ) -> Result<SavedDevice> {
        let attempt = ConnectionAttempt::new(
            device.clone(),
            success,
            duration_ms,
            disconnect_reason.map(str::to_string),
            OffsetDateTime::now_utc(),
        );
        self.record(&attempt)
    }

    /// Record a prepared attempt and return the updated record.
    pub fn record(&mut self, attempt: &ConnectionAttempt) -> Result<SavedDevice> {
        let address = attempt.device.address.as_str();

        let updated = self.mutate(|devices| {
            let updated = match devices.iter_mut().find(|d| d.address() == address) {
                Some(existing) => {
                    existing.record(attempt)?;
                    existing.clone()
                }
                None => {
                    let created = SavedDevice::from_attempt(attempt);
                    devices.insert(0, created.clone());
                    created
                }
            };
            Ok(Change::Commit(updated))
        })?;

        debug!(
            "Recorded {} attempt for {} (total {})",
            if attempt.success { "successful" } else { "failed" },
            address,
            updated.total_connections()
        );

        Ok(updated)
    }

    /// Flip the favorite flag. Returns the new flag, or `None` for an
    /// unknown address (nothing is written in that case).
    pub fn toggle_favorite(&mut self, address: &str) -> Result<Option<bool>> {
        self.mutate(|devices| {
            Ok(match devices.iter_mut().find(|d| d.address() == address) {
                Some(device) => {
                    device.toggle_favorite();
                    Change::Commit(Some(device.is_favorite()))
                }
                None => Change::Skip(None),
            })
        })
    }

    /// Delete a device record and its history. Returns the removed record.
    pub fn remove_device(&mut self, address: &str) -> Result<Option<SavedDevice>> {
        let removed = self.mutate(|devices| {
            Ok(match devices.iter().position(|d| d.address() == address) {
                Some(index) => Change::Commit(Some(devices.remove(index))),
                None => Change::Skip(None),
            })
        })?;

        if removed.is_some() {
            info!("Removed {} from connection history", address);
        }
        Ok(removed)
    }

    /// Empty a device's history window, keeping its lifetime counters.
    /// Returns `false` for an unknown address.
    pub fn clear_history(&mut self, address: &str) -> Result<bool> {
        self.mutate(|devices| {
            Ok(match devices.iter_mut().find(|d| d.address() == address) {
                Some(device) => {
                    device.clear_history();
                    Change::Commit(true)
                }
                None => Change::Skip(false),
            })
        })
    }

    /// Look up a device by address.
    pub fn get_device(&self, address: &str) -> Option<&SavedDevice> {
        self.devices.iter().find(|d| d.address() == address)
    }

    /// All devices: favorites first, then most recently connected first.
    ///
    /// Devices that never connected sort last within their group. Ties keep
    /// the stored order, in which newly created devices come first.
    pub fn list_sorted(&self) -> Vec<&SavedDevice> {
        let mut sorted: Vec<&SavedDevice> = self.devices.iter().collect();
        sorted.sort_by(|a, b| {
            b.is_favorite()
                .cmp(&a.is_favorite())
                .then_with(|| b.last_connected().cmp(&a.last_connected()))
        });
        sorted
    }

    /// Devices in stored order.
    pub fn devices(&self) -> &[SavedDevice] {
        &self.devices
    }

    /// Number of saved devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no device has been saved yet.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Key the collection is persisted under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Apply `change` to the freshly read collection and refresh the view.
    fn mutate<T, F>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<SavedDevice>) -> Result<Change<T>>,
    {
        let (devices, value) = self.backend.update(&self.key, |devices| {
            *devices = normalize(std::mem::take(devices));
            change(devices)
        })?;
        self.devices = devices;
        Ok(value)
    }
}

fn normalize(devices: Vec<SavedDevice>) -> Vec<SavedDevice> {
    devices.into_iter().map(SavedDevice::normalized).collect()
}

impl<B: Backend> AttemptSink for HistoryStore<B> {
    type Error = crate::Error;

    fn record_attempt(&mut self, attempt: &ConnectionAttempt) -> Result<()> {
        self.record(attempt).map(|_| ())
    }
}
