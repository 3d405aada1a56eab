use std::sync::Arc;

use http::HeaderName;
use revalid::{Cache, PolicyConfig};
use revalid_backend::CacheBackend;
use tower::Layer;

use crate::DEFAULT_CACHE_STATUS_HEADER;
use crate::service::CacheService;

/// Tower [`Layer`] caching the responses of the wrapped service.
///
/// One layer applies one [`PolicyConfig`]; give each route its own layer and
/// share the backend between them.
pub struct CacheLayer<B: ?Sized> {
    cache: Cache<B>,
    status_header: HeaderName,
}

impl<B> CacheLayer<B>
where
    B: CacheBackend + ?Sized,
{
    /// Layer storing into `backend` under `policy`.
    pub fn new(backend: Arc<B>, policy: impl Into<Arc<PolicyConfig>>) -> Self {
        Self::from_cache(Cache::new(backend, policy))
    }

    /// Layer driving an existing interceptor.
    pub fn from_cache(cache: Cache<B>) -> Self {
        Self {
            cache,
            status_header: HeaderName::from_static(DEFAULT_CACHE_STATUS_HEADER),
        }
    }

    /// Name of the header reporting `HIT`, `MISS` or `NOT_MODIFIED`.
    pub fn cache_status_header(mut self, name: HeaderName) -> Self {
        self.status_header = name;
        self
    }
}

impl<B: ?Sized> Clone for CacheLayer<B> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            status_header: self.status_header.clone(),
        }
    }
}

impl<S, B: ?Sized> Layer<S> for CacheLayer<B> {
    type Service = CacheService<S, B>;

    fn layer(&self, inner: S) -> Self::Service {
        CacheService::new(inner, self.cache.clone(), self.status_header.clone())
    }
}
