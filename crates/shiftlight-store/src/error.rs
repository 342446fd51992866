//! Error types for shiftlight-store.

use std::path::PathBuf;

/// Result type for shiftlight-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shiftlight-store.
///
/// Every mutating [`HistoryStore`](crate::HistoryStore) operation surfaces
/// these to the caller; the in-memory collection is left untouched when a
/// mutation fails.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stored collection could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV export failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The attempt could not be applied to the device record.
    #[error("Record update refused: {0}")]
    Record(#[from] shiftlight_types::RecordError),

    /// Backend refused the operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
