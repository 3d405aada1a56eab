use revalid_backend::BackendError;
use thiserror::Error;

/// Errors raised while setting the cache up.
///
/// Request handling never returns these: storage failures during a request
/// degrade to a cache miss and are only logged.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Error from the storage backend.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Invalid settings, fatal at startup.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),
}

#[cfg(feature = "redis")]
impl From<revalid_redis::Error> for CacheError {
    fn from(error: revalid_redis::Error) -> Self {
        match error {
            revalid_redis::Error::MissingConnection | revalid_redis::Error::Redis(_) => {
                Self::Configuration(error.to_string())
            }
            other => Self::Backend(other.into()),
        }
    }
}
