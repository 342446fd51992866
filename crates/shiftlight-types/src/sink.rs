//! Destination for connection attempts.

use std::convert::Infallible;

use crate::types::ConnectionAttempt;

/// Something that records connection attempts.
///
/// The lifecycle monitor produces attempts; a sink persists them. The
/// history store implements this trait, and `Vec<ConnectionAttempt>` does
/// too so that attempts can be collected in tests.
pub trait AttemptSink: Send {
    /// Error raised when the attempt could not be recorded.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Record a single attempt.
    fn record_attempt(&mut self, attempt: &ConnectionAttempt) -> Result<(), Self::Error>;
}

impl AttemptSink for Vec<ConnectionAttempt> {
    type Error = Infallible;

    fn record_attempt(&mut self, attempt: &ConnectionAttempt) -> Result<(), Self::Error> {
        self.push(attempt.clone());
        Ok(())
    }
}
