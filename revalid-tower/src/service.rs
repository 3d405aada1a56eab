use std::collections::BTreeMap;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use http::request::Parts;
use http::{HeaderName, HeaderValue, Method, Request, Response};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use revalid::{Cache, Interceptor};
use revalid_backend::CacheBackend;
use revalid_core::{CachedResponse, ParamValue, Params, RequestContext};
use tower::{BoxError, Service};
use tracing::debug;

/// Tower [`Service`] produced by [`CacheLayer`](crate::CacheLayer).
///
/// `GET` and `HEAD` requests go through validation. Anything else is passed
/// to the inner service untouched, apart from body collection.
pub struct CacheService<S, B: ?Sized> {
    inner: S,
    cache: Cache<B>,
    status_header: HeaderName,
}

impl<S, B: ?Sized> CacheService<S, B> {
    /// Wraps `inner` with `cache`.
    pub fn new(inner: S, cache: Cache<B>, status_header: HeaderName) -> Self {
        Self {
            inner,
            cache,
            status_header,
        }
    }
}

impl<S: Clone, B: ?Sized> Clone for CacheService<S, B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            cache: self.cache.clone(),
            status_header: self.status_header.clone(),
        }
    }
}

impl<S, B, ReqBody, ResBody> Service<Request<ReqBody>> for CacheService<S, B>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: CacheBackend + ?Sized + 'static,
    ReqBody: Send + 'static,
    ResBody: Body + Send + 'static,
    ResBody::Data: Send,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Full<Bytes>>;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the instance poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let cache = self.cache.clone();
        let status_header = self.status_header.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            if !is_cacheable_method(&parts.method) {
                let response = inner
                    .call(Request::from_parts(parts, body))
                    .await
                    .map_err(Into::<BoxError>::into)?;
                return collect(response).await.map(into_response);
            }

            let ctx = request_context(&parts);
            let path = ctx.path().to_owned();
            let handled = cache
                .try_handle(ctx, move |_ctx| async move {
                    let response = inner
                        .call(Request::from_parts(parts, body))
                        .await
                        .map_err(Into::<BoxError>::into)?;
                    collect(response).await
                })
                .await?;
            debug!(%path, cache_status = handled.status, "request served");

            let mut response = into_response(handled.response);
            response
                .headers_mut()
                .insert(status_header, HeaderValue::from_static(handled.status));
            Ok(response)
        })
    }
}

fn is_cacheable_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Builds the validation context from the request head.
fn request_context(parts: &Parts) -> RequestContext {
    let params = parts
        .uri
        .query()
        .map(parse_query)
        .unwrap_or_default();
    RequestContext::new(parts.method.clone(), parts.uri.path())
        .with_headers(parts.headers.clone())
        .with_params(params)
}

/// Parses flat and indexed-list query strings with `serde_qs`.
///
/// Shapes it rejects, such as repeated names or nested maps, fall back to the
/// decoded pairs grouped by name, so the parameters still tell every query
/// apart.
fn parse_query(query: &str) -> Params {
    serde_qs::Config::new(5, false)
        .deserialize_str::<Params>(query)
        .unwrap_or_else(|error| {
            debug!(%error, query, "query parsed as raw pairs");
            raw_pairs(query)
        })
}

fn raw_pairs(query: &str) -> Params {
    let pairs = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .unwrap_or_else(|_| vec![(String::new(), query.to_owned())]);

    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        grouped.entry(name).or_default().push(value);
    }
    grouped
        .into_iter()
        .map(|(name, mut values)| {
            let value = match values.len() {
                1 => ParamValue::Scalar(values.remove(0)),
                _ => ParamValue::Array(values),
            };
            (name, value)
        })
        .collect()
}

async fn collect<ResBody>(response: Response<ResBody>) -> Result<CachedResponse, BoxError>
where
    ResBody: Body,
    ResBody::Error: Into<BoxError>,
{
    let (parts, body) = response.into_parts();
    let body = body.collect().await.map_err(Into::<BoxError>::into)?.to_bytes();
    Ok(CachedResponse {
        status: parts.status,
        headers: parts.headers,
        body,
    })
}

fn into_response(cached: CachedResponse) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(cached.body));
    *response.status_mut() = cached.status;
    *response.headers_mut() = cached.headers;
    response
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use http::Uri;
    use pretty_assertions::assert_eq;
    use revalid::PolicyConfig;

    use super::*;

    fn parts(uri: &str) -> Parts {
        let (parts, ()) = Request::get(uri.parse::<Uri>().unwrap())
            .header("if-none-match", "\"v1\"")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn context_carries_path_headers_and_params() {
        let ctx = request_context(&parts("/items?page=2&tag[0]=a&tag[1]=b"));

        assert_eq!(ctx.path(), "/items");
        assert_eq!(ctx.if_none_match(), Some("\"v1\""));
        assert_eq!(
            ctx.params().get("page"),
            Some(&ParamValue::Scalar("2".to_owned()))
        );
        assert_eq!(
            ctx.params().get("tag").map(ParamValue::values),
            Some(&["a".to_owned(), "b".to_owned()][..])
        );
    }

    #[test]
    fn repeated_names_are_kept_as_lists() {
        let ctx = request_context(&parts("/items?color=a&color=b&page=1"));

        assert_eq!(
            ctx.params(),
            &Params::new()
                .with("color", vec!["a", "b"])
                .with("page", "1")
        );
    }

    #[test]
    fn nested_names_are_kept_verbatim() {
        let ctx = request_context(&parts("/items?filter[name]=x"));
        assert_eq!(ctx.params(), &Params::new().with("filter[name]", "x"));
    }

    #[test]
    fn distinct_queries_get_distinct_keys() {
        let policy = PolicyConfig::default();
        let queries = [
            "/items?filter[name]=x",
            "/items?filter[name]=y",
            "/items?color=a&color=b",
            "/items?color=a&color=c",
            "/items",
        ];

        let keys: HashSet<_> = queries
            .iter()
            .map(|uri| policy.cache_key(&request_context(&parts(uri)), None))
            .collect();
        assert_eq!(keys.len(), queries.len());
    }

    #[test]
    fn only_safe_methods_are_cached() {
        assert!(is_cacheable_method(&Method::GET));
        assert!(is_cacheable_method(&Method::HEAD));
        assert!(!is_cacheable_method(&Method::POST));
    }
}
