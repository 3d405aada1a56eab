//! Deployment settings.
//!
//! Backend selection and the key namespace are chosen once at startup,
//! typically deserialized from the application's configuration file.
//!
//! ```
//! use revalid::config::{BackendSettings, Settings};
//!
//! let settings: Settings = serde_json::from_str(
//!     r#"{ "backend": { "type": "in_memory" }, "default_expires_in": "5m" }"#,
//! ).unwrap();
//! assert_eq!(settings.backend, BackendSettings::InMemory);
//! assert_eq!(settings.version_header, "accept-version");
//! ```

use std::sync::Arc;
use std::time::Duration;

use revalid_backend::{Backend, InMemoryBackend};
use revalid_core::DEFAULT_KEY_PREFIX;
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::policy::DEFAULT_VERSION_HEADER;

/// Which store holds cached entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendSettings {
    /// [`InMemoryBackend`], private to this process.
    #[default]
    InMemory,
    /// `RedisBackend` connected lazily to `url`.
    #[cfg(feature = "redis")]
    Redis {
        /// Connection URL, e.g. `redis://127.0.0.1:6379/1`.
        url: String,
        /// Fields at or above this many bytes are compressed.
        #[serde(default = "default_compression_threshold")]
        compression_threshold: usize,
    },
}

#[cfg(feature = "redis")]
fn default_compression_threshold() -> usize {
    revalid_redis::DEFAULT_COMPRESSION_THRESHOLD
}

/// Deployment-wide cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Storage backend.
    pub backend: BackendSettings,
    /// Header selecting the API version.
    pub version_header: String,
    /// Key namespace.
    pub key_prefix: String,
    /// Lifetime of captured entries when a policy does not set one
    /// (e.g. "30s", "5m").
    #[serde(default, with = "humantime_serde")]
    pub default_expires_in: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            version_header: DEFAULT_VERSION_HEADER.to_owned(),
            key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
            default_expires_in: None,
        }
    }
}

impl Settings {
    /// Instantiates the configured backend.
    ///
    /// Never performs network I/O; remote stores connect on first use.
    pub fn build_backend(&self) -> Result<Arc<dyn Backend>, CacheError> {
        match &self.backend {
            BackendSettings::InMemory => Ok(Arc::new(InMemoryBackend::new())),
            #[cfg(feature = "redis")]
            BackendSettings::Redis {
                url,
                compression_threshold,
            } => {
                let backend = revalid_redis::RedisBackend::builder()
                    .server(url.clone())
                    .compression_threshold(*compression_threshold)
                    .build()?;
                Ok(Arc::new(backend))
            }
        }
    }
}
