//! Decoding errors for persisted cache data.

use thiserror::Error;

/// Error produced when a stored blob cannot be turned back into a typed value.
///
/// Backends never let this error reach the validator: a corrupt entry is
/// reported as absent so the request degrades to a cache miss.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The binary record is truncated, has the wrong shape or is not a record at all.
    #[error("malformed record: {0}")]
    Malformed(#[from] bitcode::Error),

    /// A timestamp field could not be parsed.
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        /// Raw field value.
        value: String,
        /// Parser error.
        #[source]
        source: chrono::ParseError,
    },

    /// An epoch value is outside of the representable date range.
    #[error("epoch seconds {0} out of range")]
    EpochOutOfRange(i64),

    /// Stored status code is not a valid HTTP status.
    #[error("invalid status code {0}")]
    Status(u16),

    /// A stored header name or value is not valid HTTP.
    #[error("invalid header {0:?}")]
    Header(String),
}
