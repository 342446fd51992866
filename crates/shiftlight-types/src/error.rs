//! Error types for shiftlight-types.

use thiserror::Error;

/// Errors raised when constructing identity values from user input.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdentityError {
    /// The device address was empty or whitespace only.
    #[error("Device address must not be empty")]
    EmptyAddress,
}

/// Result type alias using shiftlight-types' IdentityError type.
pub type IdentityResult<T> = std::result::Result<T, IdentityError>;

/// Errors raised when applying an attempt to a [`SavedDevice`](crate::SavedDevice).
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordError {
    /// A lifetime counter would overflow; the record was left unchanged.
    #[error("Connection counters for {address} are exhausted")]
    CounterOverflow { address: String },
}
