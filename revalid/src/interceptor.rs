use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use revalid_backend::CacheBackend;
use revalid_core::{CachedResponse, RequestContext};
use tracing::debug;

use crate::metrics;
use crate::policy::PolicyConfig;
use crate::validator::{Capture, Outcome, Validator};

/// Hooks a request pipeline calls around its handler.
///
/// `before` may answer the request on its own; otherwise the pipeline runs
/// the handler and passes its response to `after`.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Validates the request before the handler runs.
    async fn before(&self, ctx: &mut RequestContext) -> Outcome;

    /// Stores the handler's response. Failures are logged, never returned.
    async fn after(&self, capture: Capture, response: &CachedResponse);

    /// Runs `handler` between the two hooks.
    ///
    /// Only `2xx` responses are captured. The returned response carries the
    /// validator and cache headers computed by `before`.
    async fn handle<H, Fut>(&self, ctx: RequestContext, handler: H) -> CachedResponse
    where
        Self: Sized,
        H: FnOnce(RequestContext) -> Fut + Send,
        Fut: Future<Output = CachedResponse> + Send,
    {
        let handled = self
            .try_handle(ctx, |ctx| async move { Ok::<_, Infallible>(handler(ctx).await) })
            .await;
        match handled {
            Ok(handled) => handled.response,
            Err(never) => match never {},
        }
    }

    /// Fallible [`handle`](Self::handle): a handler error is returned as is
    /// and nothing is stored.
    async fn try_handle<H, Fut, E>(&self, mut ctx: RequestContext, handler: H) -> Result<Handled, E>
    where
        Self: Sized,
        H: FnOnce(RequestContext) -> Fut + Send,
        Fut: Future<Output = Result<CachedResponse, E>> + Send,
        E: Send,
    {
        let outcome = self.before(&mut ctx).await;
        let status = outcome.label();
        let response = match outcome {
            Outcome::NotModified(response) | Outcome::Hit(response) => response,
            Outcome::Miss { capture, headers } => {
                let mut response = handler(ctx).await?;
                if response.status.is_success() {
                    self.after(capture, &response).await;
                }
                response.overlay_headers(&headers);
                response
            }
        };
        Ok(Handled { status, response })
    }
}

/// A response produced by [`Interceptor::try_handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handled {
    /// [`Outcome::label`] of the validation: `NOT_MODIFIED`, `HIT` or `MISS`.
    pub status: &'static str,
    /// The response to send.
    pub response: CachedResponse,
}

/// Caching interceptor: a backend plus the policy of one route.
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use http::{Method, StatusCode};
/// use revalid::{Cache, CachedResponse, Interceptor, PolicyConfig, RequestContext};
/// use revalid_backend::InMemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = Cache::new(
///     Arc::new(InMemoryBackend::new()),
///     PolicyConfig::builder().expires_in(Duration::from_secs(60)).build(),
/// );
///
/// let ctx = RequestContext::new(Method::GET, "/hello");
/// let response = cache
///     .handle(ctx, |_| async { CachedResponse::new(StatusCode::OK, "hello") })
///     .await;
/// assert_eq!(response.body, "hello");
/// # }
/// ```
pub struct Cache<B: ?Sized> {
    backend: Arc<B>,
    validator: Validator,
}

impl<B> Cache<B>
where
    B: CacheBackend + ?Sized,
{
    /// Interceptor storing into `backend` under `policy`.
    pub fn new(backend: Arc<B>, policy: impl Into<Arc<PolicyConfig>>) -> Self {
        Self {
            backend,
            validator: Validator::new(policy),
        }
    }

    /// The backend entries are stored in.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The policy applied.
    pub fn policy(&self) -> &PolicyConfig {
        self.validator.policy()
    }
}

impl<B: ?Sized> Clone for Cache<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            validator: self.validator.clone(),
        }
    }
}

impl<B: ?Sized> std::fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<B> Interceptor for Cache<B>
where
    B: CacheBackend + ?Sized + 'static,
{
    async fn before(&self, ctx: &mut RequestContext) -> Outcome {
        self.validator.validate(ctx, &*self.backend).await
    }

    async fn after(&self, capture: Capture, response: &CachedResponse) {
        let key = capture.key().clone();
        if let Err(error) = capture.commit(&*self.backend, response).await {
            metrics::record_store_error(self.backend.name());
            debug!(backend = self.backend.name(), %key, %error, "response not cached");
        }
    }
}
