//! Redis backend implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use revalid_backend::{Backend, BackendResult, Compressor, GzipCompressor};
use revalid_core::{CacheKey, CachedResponse, EntryMetadata, StoredEntry};
use tokio::sync::OnceCell;
use tracing::trace;

use crate::error::Error;
use crate::fields::{self, DEFAULT_COMPRESSION_THRESHOLD, EncodedEntry, FieldsReply};

type ConnectionFuture = Pin<Box<dyn Future<Output = Result<ConnectionManager, RedisError>> + Send>>;

/// Zero-argument async factory producing a connection.
pub type ConnectionFactory = Arc<dyn Fn() -> ConnectionFuture + Send + Sync>;

/// How the backend obtains its Redis connection.
///
/// The connection is resolved at most once, on first use, and then shared by
/// every clone of the backend.
///
/// # Examples
///
/// ```
/// use revalid_redis::ConnectionMode;
///
/// let mode = ConnectionMode::single("redis://127.0.0.1:6379/");
/// ```
pub enum ConnectionMode {
    /// Connect to the server at this URL, lazily.
    Single(String),
    /// An already established connection.
    Manager(ConnectionManager),
    /// A factory called once, on first use.
    Factory(ConnectionFactory),
}

impl ConnectionMode {
    /// Lazy connection to a single server.
    pub fn single(url: impl Into<String>) -> Self {
        Self::Single(url.into())
    }

    /// Uses an established connection.
    pub fn manager(manager: ConnectionManager) -> Self {
        Self::Manager(manager)
    }

    /// Defers connection acquisition to `factory`.
    pub fn factory<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ConnectionManager, RedisError>> + Send + 'static,
    {
        Self::Factory(Arc::new(move || Box::pin(factory())))
    }
}

impl fmt::Debug for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(url) => f.debug_tuple("Single").field(url).finish(),
            Self::Manager(_) => f.write_str("Manager"),
            Self::Factory(_) => f.write_str("Factory"),
        }
    }
}

#[derive(Clone)]
enum Source {
    Client(Client),
    Factory(ConnectionFactory),
    Resolved,
}

impl Source {
    async fn resolve(&self) -> Result<ConnectionManager, Error> {
        match self {
            Self::Client(client) => {
                trace!("Initialize new redis connection manager");
                Ok(client.get_connection_manager().await?)
            }
            Self::Factory(factory) => {
                trace!("Initialize redis connection from factory");
                Ok(factory().await?)
            }
            Self::Resolved => Err(Error::MissingConnection),
        }
    }
}

/// Redis cache backend based on redis-rs crate.
///
/// Each entry is one hash (see [`fields`](crate::fields)) written atomically
/// together with its `EXPIREAT`. Uses a [`ConnectionManager`] for
/// asynchronous network interaction.
///
/// `clear` issues `FLUSHDB`: point the backend at a logical database of its
/// own.
///
/// [`ConnectionManager`]: redis::aio::ConnectionManager
#[derive(Clone)]
pub struct RedisBackend<C = GzipCompressor>
where
    C: Compressor,
{
    source: Source,
    connection: Arc<OnceCell<ConnectionManager>>,
    compressor: C,
    compression_threshold: usize,
    name: Arc<str>,
}

impl RedisBackend<GzipCompressor> {
    /// Creates new RedisBackend builder with default settings.
    #[must_use]
    pub fn builder() -> RedisBackendBuilder<GzipCompressor> {
        RedisBackendBuilder::default()
    }
}

impl<C> RedisBackend<C>
where
    C: Compressor,
{
    /// Lazy connection to redis via [`ConnectionManager`].
    pub async fn connection(&self) -> Result<&ConnectionManager, Error> {
        trace!("Get connection manager");
        self.connection
            .get_or_try_init(|| self.source.resolve())
            .await
    }

    /// Size at or above which fields are compressed.
    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }
}

impl<C: Compressor> fmt::Debug for RedisBackend<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("name", &self.name)
            .field("compressor", &self.compressor)
            .field("compression_threshold", &self.compression_threshold)
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

/// Part of builder pattern implementation for RedisBackend.
pub struct RedisBackendBuilder<C = GzipCompressor>
where
    C: Compressor,
{
    connection: Option<ConnectionMode>,
    compressor: C,
    compression_threshold: usize,
    name: String,
}

impl Default for RedisBackendBuilder<GzipCompressor> {
    fn default() -> Self {
        Self {
            connection: None,
            compressor: GzipCompressor::default(),
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            name: "redis".to_owned(),
        }
    }
}

impl<C> RedisBackendBuilder<C>
where
    C: Compressor,
{
    /// Set how the connection is obtained.
    pub fn connection(mut self, mode: ConnectionMode) -> Self {
        self.connection = Some(mode);
        self
    }

    /// Shorthand for `connection(ConnectionMode::single(url))`.
    pub fn server(self, url: impl Into<String>) -> Self {
        self.connection(ConnectionMode::single(url))
    }

    /// Set the size in bytes at or above which `h` and `b` are compressed.
    pub fn compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Set a custom name for this backend, used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set compressor for large fields.
    pub fn compressor<NewC>(self, compressor: NewC) -> RedisBackendBuilder<NewC>
    where
        NewC: Compressor,
    {
        RedisBackendBuilder {
            connection: self.connection,
            compressor,
            compression_threshold: self.compression_threshold,
            name: self.name,
        }
    }

    /// Create new instance of Redis backend with passed settings.
    ///
    /// No network I/O happens here; URLs are only parsed.
    pub fn build(self) -> Result<RedisBackend<C>, Error> {
        let (source, connection) = match self.connection.ok_or(Error::MissingConnection)? {
            ConnectionMode::Single(url) => (Source::Client(Client::open(url)?), OnceCell::new()),
            ConnectionMode::Factory(factory) => (Source::Factory(factory), OnceCell::new()),
            ConnectionMode::Manager(manager) => (Source::Resolved, OnceCell::new_with(Some(manager))),
        };
        Ok(RedisBackend {
            source,
            connection: Arc::new(connection),
            compressor: self.compressor,
            compression_threshold: self.compression_threshold,
            name: Arc::from(self.name),
        })
    }
}

#[async_trait]
impl<C> Backend for RedisBackend<C>
where
    C: Compressor,
{
    #[tracing::instrument(skip(self), fields(backend = %self.name))]
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>> {
        let mut con = self.connection().await?.clone();

        let reply: FieldsReply = redis::cmd("HMGET")
            .arg(key.as_str())
            .arg(fields::STATUS)
            .arg(fields::HEADERS)
            .arg(fields::BODY)
            .arg(fields::METADATA)
            .arg(fields::FLAGS)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        match fields::from_reply(reply)? {
            Some(encoded) => Ok(Some(encoded.decode(&self.compressor)?)),
            None => Ok(None),
        }
    }

    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>> {
        let mut con = self.connection().await?.clone();

        let metadata: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(key.as_str())
            .arg(fields::METADATA)
            .query_async(&mut con)
            .await
            .map_err(Error::from)?;

        Ok(metadata
            .map(|bytes| EntryMetadata::decode(&bytes))
            .transpose()?)
    }

    #[tracing::instrument(skip(self, response, metadata), fields(backend = %self.name))]
    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()> {
        let encoded = EncodedEntry::encode(
            response,
            metadata,
            &self.compressor,
            self.compression_threshold,
        )?;
        let mut con = self.connection().await?.clone();

        let mut hset = redis::cmd("HSET");
        hset.arg(key.as_str())
            .arg(fields::STATUS)
            .arg(encoded.status)
            .arg(fields::HEADERS)
            .arg(encoded.headers.as_slice())
            .arg(fields::BODY)
            .arg(encoded.body.as_slice())
            .arg(fields::METADATA)
            .arg(encoded.metadata.as_slice())
            .arg(fields::FLAGS)
            .arg(encoded.flags);

        // MULTI/EXEC: readers see the old entry or the new one, never a mix.
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("DEL").arg(key.as_str()).ignore();
        pipe.add_command(hset).ignore();
        if let Some(expire_at) = metadata.expire_at() {
            pipe.cmd("EXPIREAT")
                .arg(key.as_str())
                .arg(expire_at.timestamp())
                .ignore();
        }

        pipe.query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        trace!(flags = encoded.flags, "entry written");
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        let mut con = self.connection().await?.clone();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut con)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_without_connection_fails() {
        let result = RedisBackend::builder().build();
        assert!(matches!(result, Err(Error::MissingConnection)));
    }

    #[test]
    fn test_build_rejects_invalid_url() {
        let result = RedisBackend::builder().server("not a url").build();
        assert!(matches!(result, Err(Error::Redis(_))));
    }

    #[test]
    fn test_build_does_not_connect() {
        let backend = RedisBackend::builder()
            .server("redis://127.0.0.1:1/")
            .compression_threshold(64)
            .name("sessions")
            .build()
            .unwrap();
        assert_eq!(backend.name(), "sessions");
        assert_eq!(backend.compression_threshold(), 64);
        assert!(!backend.connection.initialized());
    }

    #[test]
    fn test_connection_mode_debug_hides_handles() {
        let mode = ConnectionMode::factory(|| async {
            Err(RedisError::from(std::io::Error::other("unreachable")))
        });
        assert_eq!(format!("{mode:?}"), "Factory");
    }
}
