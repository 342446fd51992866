//! Error types for shiftlight-core.
//!
//! Errors here come from talking to the bridge over HTTP or from invalid
//! configuration. None of them is fatal: the [`Poller`](crate::Poller)
//! treats a failed status fetch as a skipped tick, and a failed connect
//! request is recorded as a failed attempt before the error is returned.
//! When that recording fails too, [`Error::Record`] carries both causes.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when talking to the ShiftLight bridge.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The bridge did not answer at all.
    #[error("Bridge not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed after a connection was made.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid bridge URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Bridge answered with a non-success status.
    #[error("Bridge error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The bridge refused or failed a connect request.
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A connect request failed and the failed attempt could not be saved.
    #[error("{connect} (failed attempt not saved: {source})")]
    Record {
        /// Why the connect request failed.
        connect: Box<Error>,
        /// Why the attempt sink refused the attempt.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias using shiftlight-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
