//! Error types for Redis backend operations.
//!
//! All errors convert into [`BackendError`], so they flow through the same
//! degrade-to-miss handling as every other backend failure.
//!
//! [`BackendError`]: revalid_backend::BackendError

use redis::RedisError;
use revalid_backend::BackendError;

/// Error type for Redis backend operations.
///
/// # When You'll Encounter This
///
/// - [`RedisBackendBuilder::build`] with an invalid URL or without any
///   connection configured
/// - the first cache operation when Redis is unreachable (connections are
///   acquired lazily)
/// - reads of a hash that was not written by this backend
///
/// [`RedisBackendBuilder::build`]: crate::RedisBackendBuilder::build
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client.
    #[error("Redis backend error: {0}")]
    Redis(#[from] RedisError),

    /// No connection was configured when building the backend.
    ///
    /// Call [`RedisBackendBuilder::connection`] before [`RedisBackendBuilder::build`].
    ///
    /// [`RedisBackendBuilder::connection`]: crate::RedisBackendBuilder::connection
    /// [`RedisBackendBuilder::build`]: crate::RedisBackendBuilder::build
    #[error("Connection not specified. Call .connection() before .build()")]
    MissingConnection,

    /// A stored hash lacks one of the entry fields.
    #[error("stored entry is missing field {0:?}")]
    MissingField(&'static str),

    /// The stored status is not an HTTP status code.
    #[error("stored status {0} is out of range")]
    InvalidStatus(i64),

    /// The compression flag byte has unknown bits set.
    #[error("unknown compression flags {0:#04b}")]
    InvalidFlags(i64),
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        match error {
            Error::Redis(ref redis) if redis.is_io_error() || redis.is_timeout() => {
                Self::ConnectionError(Box::new(error))
            }
            other => Self::InternalError(Box::new(other)),
        }
    }
}
