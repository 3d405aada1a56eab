//! Per-request input to caching policies.

use chrono::{DateTime, Utc};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, header};

use crate::Params;
use crate::date::parse_http_date;

/// Everything a caching policy may look at while handling one request.
///
/// Policy functions receive the context by reference instead of capturing
/// ambient state. The prepare hook gets it mutably and may stash typed values
/// in [`extensions`](Self::extensions) for later resolvers, for example the
/// record whose timestamp drives `Last-Modified`.
///
/// ```
/// use http::Method;
/// use revalid_core::{Params, RequestContext};
///
/// let ctx = RequestContext::new(Method::GET, "/articles")
///     .with_header("accept-version", "v2")
///     .with_params(Params::new().with("page", "3"));
///
/// assert_eq!(ctx.header_str("accept-version"), Some("v2"));
/// assert_eq!(ctx.params().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    method: Method,
    path: String,
    headers: HeaderMap,
    params: Params,
    extensions: Extensions,
}

impl RequestContext {
    /// Creates a context for `method` and `path` with no headers or parameters.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Replaces the request headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Appends a header. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Replaces the declared parameters.
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request path, without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared and validated request parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Typed values attached by the prepare hook.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the attached values.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// First value of a header, if present and visible ASCII.
    pub fn header_str(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Raw `If-None-Match` value.
    pub fn if_none_match(&self) -> Option<&str> {
        self.header_str(header::IF_NONE_MATCH)
    }

    /// Parsed `If-Modified-Since`; unparseable dates are ignored.
    pub fn if_modified_since(&self) -> Option<DateTime<Utc>> {
        self.header_str(header::IF_MODIFIED_SINCE)
            .and_then(parse_http_date)
    }

    /// Parsed `If-Unmodified-Since`; unparseable dates are ignored.
    pub fn if_unmodified_since(&self) -> Option<DateTime<Utc>> {
        self.header_str(header::IF_UNMODIFIED_SINCE)
            .and_then(parse_http_date)
    }
}
