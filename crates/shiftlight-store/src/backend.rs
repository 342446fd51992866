//! Key/value persistence backends for the history store.
//!
//! The store persists its whole device collection under one key. Every
//! mutation goes through [`Backend::update`], which re-reads the stored
//! collection and writes the changed one back as a single atomic step, so
//! processes sharing one database never overwrite each other's changes.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use time::OffsetDateTime;
use tracing::{debug, info};

use shiftlight_types::SavedDevice;

use crate::error::{Error, Result};
use crate::schema;

/// How long a writer waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a change applied by [`Backend::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum Change<T> {
    /// Write the modified collection back.
    Commit(T),
    /// Leave the stored collection untouched.
    Skip(T),
}

/// Durable storage for the saved-device collection.
pub trait Backend: Send {
    /// Load the collection stored under `key`; empty if nothing was saved yet.
    fn load(&self, key: &str) -> Result<Vec<SavedDevice>>;

    /// Read-modify-write the collection under `key` atomically.
    ///
    /// `change` sees the collection as currently stored. On
    /// [`Change::Commit`] the modified collection is written back; on
    /// [`Change::Skip`] or an error nothing is written. Returns the
    /// collection as stored afterwards together with the change's value.
    fn update<T, F>(&mut self, key: &str, change: F) -> Result<(Vec<SavedDevice>, T)>
    where
        F: FnOnce(&mut Vec<SavedDevice>) -> Result<Change<T>>;
}

/// SQLite-backed storage.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }
}

fn read_collection(conn: &Connection, key: &str) -> Result<Vec<SavedDevice>> {
    let value: Option<String> = conn
        .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
        .optional()?;

    match value {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(Vec::new()),
    }
}

impl Backend for SqliteBackend {
    fn load(&self, key: &str) -> Result<Vec<SavedDevice>> {
        read_collection(&self.conn, key)
    }

    fn update<T, F>(&mut self, key: &str, change: F) -> Result<(Vec<SavedDevice>, T)>
    where
        F: FnOnce(&mut Vec<SavedDevice>) -> Result<Change<T>>,
    {
        // IMMEDIATE takes the write lock before the read, so no other
        // writer can slip in between
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut devices = read_collection(&tx, key)?;

        let value = match change(&mut devices)? {
            Change::Commit(value) => value,
            Change::Skip(value) => return Ok((devices, value)),
        };

        let json = serde_json::to_string(&devices)?;
        let now = OffsetDateTime::now_utc().unix_timestamp();
        tx.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = ?2,
                updated_at = ?3",
            rusqlite::params![key, json, now],
        )?;
        tx.commit()?;

        debug!("Saved {} device(s) under '{}'", devices.len(), key);
        Ok((devices, value))
    }
}

/// In-memory storage, used in tests.
///
/// Clones share the same underlying map, so a second store opened on a
/// clone sees what the first one saved. Writes can be made to fail with
/// [`MemoryBackend::set_fail_writes`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_writes: Arc<AtomicBool>,
    write_count: Arc<AtomicU32>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Raw JSON stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    /// Store raw JSON under `key`, bypassing serialization.
    pub fn insert_raw(&self, key: &str, json: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), json.to_string());
        }
    }
}

impl Backend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Vec<SavedDevice>> {
        match self.raw(key) {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn update<T, F>(&mut self, key: &str, change: F) -> Result<(Vec<SavedDevice>, T)>
    where
        F: FnOnce(&mut Vec<SavedDevice>) -> Result<Change<T>>,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| Error::Backend("memory backend lock poisoned".to_string()))?;
        let mut devices = match entries.get(key) {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };

        let value = match change(&mut devices)? {
            Change::Commit(value) => value,
            Change::Skip(value) => return Ok((devices, value)),
        };

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Backend("writes are disabled".to_string()));
        }

        entries.insert(key.to_string(), serde_json::to_string(&devices)?);
        self.write_count.fetch_add(1, Ordering::SeqCst);
        Ok((devices, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiftlight_types::{ConnectionAttempt, DeviceIdentity};

    fn sample() -> Vec<SavedDevice> {
        let attempt = ConnectionAttempt::connected(
            DeviceIdentity::new("AA:BB", "OBD1"),
            OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        );
        vec![SavedDevice::from_attempt(&attempt)]
    }

    fn replace<B: Backend>(backend: &mut B, key: &str, next: Vec<SavedDevice>) -> Result<()> {
        backend
            .update(key, |devices| {
                *devices = next;
                Ok(Change::Commit(()))
            })
            .map(|_| ())
    }

    #[test]
    fn test_sqlite_load_missing_key_is_empty() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        assert!(backend.load("nothing").unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_update_and_load() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        replace(&mut backend, "k", sample()).unwrap();
        assert_eq!(backend.load("k").unwrap(), sample());

        // The change sees what is stored
        let (devices, seen) = backend
            .update("k", |devices| Ok(Change::Skip(devices.len())))
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(devices, sample());

        replace(&mut backend, "k", Vec::new()).unwrap();
        assert!(backend.load("k").unwrap().is_empty());
    }

    #[test]
    fn test_sqlite_failed_change_writes_nothing() {
        let mut backend = SqliteBackend::open_in_memory().unwrap();
        replace(&mut backend, "k", sample()).unwrap();

        let result: Result<(Vec<SavedDevice>, ())> = backend.update("k", |devices| {
            devices.clear();
            Err(Error::Backend("refused".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(backend.load("k").unwrap(), sample());

        // The connection is usable again after the rollback
        replace(&mut backend, "k", Vec::new()).unwrap();
    }

    #[test]
    fn test_sqlite_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        let mut backend = SqliteBackend::open(&path).unwrap();
        replace(&mut backend, "k", sample()).unwrap();
        drop(backend);

        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.load("k").unwrap().len(), 1);
    }

    #[test]
    fn test_sqlite_update_sees_other_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let mut first = SqliteBackend::open(&path).unwrap();
        let mut second = SqliteBackend::open(&path).unwrap();

        replace(&mut first, "k", sample()).unwrap();
        let (devices, ()) = second
            .update("k", |devices| {
                devices[0].toggle_favorite();
                Ok(Change::Commit(()))
            })
            .unwrap();

        assert_eq!(devices.len(), 1);
        assert!(first.load("k").unwrap()[0].is_favorite());
    }

    #[test]
    fn test_memory_clones_share_state() {
        let mut a = MemoryBackend::new();
        let b = a.clone();
        replace(&mut a, "k", sample()).unwrap();

        assert_eq!(b.load("k").unwrap().len(), 1);
        assert_eq!(b.write_count(), 1);
    }

    #[test]
    fn test_memory_skip_does_not_write() {
        let mut backend = MemoryBackend::new();
        let (devices, ()) = backend.update("k", |_| Ok(Change::Skip(()))).unwrap();

        assert!(devices.is_empty());
        assert!(backend.raw("k").is_none());
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_memory_fail_writes() {
        let mut backend = MemoryBackend::new();
        backend.set_fail_writes(true);

        let result = replace(&mut backend, "k", sample());
        assert!(matches!(result, Err(Error::Backend(_))));
        assert!(backend.raw("k").is_none());
        assert_eq!(backend.write_count(), 0);
    }

    #[test]
    fn test_memory_corrupt_json_is_an_error() {
        let backend = MemoryBackend::new();
        backend.insert_raw("k", "not json");
        assert!(matches!(backend.load("k"), Err(Error::Serialization(_))));
    }
}
