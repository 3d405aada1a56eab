//! In-process backend.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use revalid_core::{CacheKey, CachedResponse, EntryMetadata, StoredEntry};
use tracing::trace;

use crate::{Backend, BackendResult};

#[derive(Debug, Clone)]
struct Record {
    response: CachedResponse,
    metadata: Bytes,
}

impl Record {
    fn metadata(&self) -> BackendResult<EntryMetadata> {
        Ok(EntryMetadata::decode(&self.metadata)?)
    }
}

/// Reference backend keeping entries in a concurrent map inside the process.
///
/// Metadata is kept in its encoded form and decoded on every read, exactly
/// like an external store would. Expired entries are dropped lazily when a
/// read finds them; nothing bounds the number of live entries.
///
/// Clones share the same map, so one instance can be handed to several
/// middleware stacks explicitly.
///
/// ```
/// use revalid_backend::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// let shared = backend.clone();
/// assert!(shared.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<DashMap<CacheKey, Record>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no records are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrites the raw metadata bytes of an existing record.
    ///
    /// Only meant for exercising corrupt-entry handling in tests.
    #[doc(hidden)]
    pub fn corrupt_metadata(&self, key: &CacheKey, bytes: impl Into<Bytes>) {
        if let Some(mut record) = self.entries.get_mut(key) {
            record.metadata = bytes.into();
        }
    }

    // The map guard is released before removal; DashMap shards deadlock otherwise.
    fn get_live(&self, key: &CacheKey) -> BackendResult<Option<(Record, EntryMetadata)>> {
        let Some(record) = self.entries.get(key).map(|record| record.clone()) else {
            return Ok(None);
        };
        let metadata = record.metadata()?;
        if metadata.is_expired(Utc::now()) {
            trace!(%key, "evicting expired entry");
            self.entries
                .remove_if(key, |_, current| current.metadata == record.metadata);
            return Ok(None);
        }
        Ok(Some((record, metadata)))
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn read(&self, key: &CacheKey) -> BackendResult<Option<StoredEntry>> {
        Ok(self.get_live(key)?.map(|(record, metadata)| StoredEntry {
            response: record.response,
            metadata,
        }))
    }

    async fn read_metadata(&self, key: &CacheKey) -> BackendResult<Option<EntryMetadata>> {
        Ok(self.get_live(key)?.map(|(_, metadata)| metadata))
    }

    async fn write(
        &self,
        key: &CacheKey,
        response: &CachedResponse,
        metadata: &EntryMetadata,
    ) -> BackendResult<()> {
        self.entries.insert(
            key.clone(),
            Record {
                response: response.clone(),
                metadata: Bytes::from(metadata.encode()),
            },
        );
        Ok(())
    }

    async fn clear(&self) -> BackendResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use http::StatusCode;

    use super::*;
    use crate::CacheBackend;

    fn key(name: &str) -> CacheKey {
        CacheKey::from_raw(name)
    }

    #[tokio::test]
    async fn test_expired_record_is_evicted_on_read() {
        let backend = InMemoryBackend::new();
        let metadata = EntryMetadata::new().with_expire_at(Utc::now() - Duration::seconds(5));
        backend
            .write(&key("old"), &CachedResponse::new(StatusCode::OK, "x"), &metadata)
            .await
            .unwrap();
        assert_eq!(backend.len(), 1);

        assert!(backend.read(&key("old")).await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_metadata_surfaces_as_error_then_miss() {
        let backend = InMemoryBackend::new();
        backend
            .write(
                &key("k"),
                &CachedResponse::new(StatusCode::OK, "x"),
                &EntryMetadata::new(),
            )
            .await
            .unwrap();
        backend.corrupt_metadata(&key("k"), Bytes::new());

        assert!(backend.read(&key("k")).await.is_err());
        assert!(backend.fetch(&key("k")).await.is_none());
        assert!(backend.fetch_metadata(&key("k")).await.is_none());
    }
}
