use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use revalid_core::{CacheKey, CachedResponse, EntryMetadata, StoredEntry};
use tracing::{trace, warn};

use crate::BackendError;

/// Result of a raw backend operation.
pub type BackendResult<T> = Result<T, BackendError>;

/// Raw storage operations every backend implements.
///
/// Implementations report every failure, including undecodable records, as
/// [`BackendError`]. The degrade-to-miss behaviour the cache relies on lives
/// in [`CacheBackend`], which is implemented for every `Backend`.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reads the full entry stored under `key`.
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>>;

    /// Reads only the metadata stored under `key`.
    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>>;

    /// Persists `response` and `metadata` under `key`, replacing any previous entry.
    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()>;

    /// Removes every entry.
    async fn clear(&self) -> BackendResult<()>;

    /// Returns the name of this backend, used in logs.
    fn name(&self) -> &str {
        "backend"
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for &B {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>> {
        (**self).read(key).await
    }

    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>> {
        (**self).read_metadata(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()> {
        (**self).write(key, response, metadata).await
    }

    async fn clear(&self) -> BackendResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Box<B> {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>> {
        (**self).read(key).await
    }

    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>> {
        (**self).read_metadata(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()> {
        (**self).write(key, response, metadata).await
    }

    async fn clear(&self) -> BackendResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>> {
        (**self).read(key).await
    }

    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>> {
        (**self).read_metadata(key).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()> {
        (**self).write(key, response, metadata).await
    }

    async fn clear(&self) -> BackendResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// The cache-facing contract: `store`, `fetch`, `fetch_metadata`, `flush`.
///
/// Reads never fail. Unknown, undecodable, expired and unreachable entries
/// are all reported as `None`, so a broken cache degrades to a cache miss and
/// never to an error response. Expiry is checked here against the current
/// time, whatever the backend's native TTL handling does.
pub trait CacheBackend: Backend {
    /// Stores an entry, overwriting any previous one under `key`.
    fn store(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> impl Future<Output = BackendResult<()>> + Send {
        async move {
            let result = self.write(key, response, metadata).await;
            match &result {
                Ok(()) => trace!(backend = self.name(), %key, "cache entry stored"),
                Err(error) => {
                    warn!(backend = self.name(), %key, %error, "failed to store cache entry")
                }
            }
            result
        }
    }

    /// Returns the stored response, or `None` when there is no usable entry.
    fn fetch(&self, key: &CacheKey) -> impl Future<Output = Option<CachedResponse>> + Send {
        async move {
            match self.read(key).await {
                Ok(Some(entry)) if entry.metadata.is_expired(Utc::now()) => {
                    trace!(backend = self.name(), %key, "cache entry expired");
                    None
                }
                Ok(Some(entry)) => Some(entry.response),
                Ok(None) => None,
                Err(error) => {
                    warn!(backend = self.name(), %key, %error, "cache read failed, treating as miss");
                    None
                }
            }
        }
    }

    /// Returns the stored metadata, or `None` when there is no usable entry.
    fn fetch_metadata(
        &self,
        key: &CacheKey,
    ) -> impl Future<Output = Option<EntryMetadata>> + Send {
        async move {
            match self.read_metadata(key).await {
                Ok(Some(metadata)) if metadata.is_expired(Utc::now()) => {
                    trace!(backend = self.name(), %key, "cache metadata expired");
                    None
                }
                Ok(metadata) => metadata,
                Err(error) => {
                    warn!(backend = self.name(), %key, %error, "metadata read failed, treating as miss");
                    None
                }
            }
        }
    }

    /// Removes every entry.
    fn flush(&self) -> impl Future<Output = BackendResult<()>> + Send {
        async move {
            let result = self.clear().await;
            if let Err(error) = &result {
                warn!(backend = self.name(), %error, "failed to flush cache");
            }
            result
        }
    }
}

impl<B: Backend + ?Sized> CacheBackend for B {}
