//! Cache key construction.
//!
//! A [`CacheKey`] is the storage row identifier of a cached response. It is
//! derived from the request dimensions that select a representation:
//!
//! 1. HTTP method
//! 2. path
//! 3. API version selector
//! 4. declared parameters (optional)
//! 5. a user supplied key contribution (optional)
//! 6. the resolved ETag (optional)
//!
//! The parts are rendered into a canonical url-encoded string, so a value can
//! never spill into a neighbouring part, then hashed with SHA-256. The key is
//! `{prefix}:{hex digest}`.
//!
//! ```
//! use http::Method;
//! use revalid_core::{CacheKey, Params};
//!
//! let a = CacheKey::builder(&Method::GET, "/users")
//!     .version(Some("v1"))
//!     .params(&Params::new().with("page", "1"))
//!     .build();
//! let b = CacheKey::builder(&Method::GET, "/users")
//!     .version(Some("v1"))
//!     .params(&Params::new().with("page", "2"))
//!     .build();
//!
//! assert_ne!(a, b);
//! assert!(a.as_str().starts_with("revalid:"));
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;
use sha2::{Digest, Sha256};

use crate::Params;

/// Default namespace of generated keys.
pub const DEFAULT_KEY_PREFIX: &str = "revalid";

/// Opaque identifier of a cached entry.
///
/// Cloning is cheap: the string is shared behind an [`Arc`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Arc<str>);

impl CacheKey {
    /// Wraps an already computed key string.
    pub fn from_raw(key: impl Into<Arc<str>>) -> Self {
        CacheKey(key.into())
    }

    /// Starts building a key for `method` and `path`.
    pub fn builder<'a>(method: &'a Method, path: &'a str) -> CacheKeyBuilder<'a> {
        CacheKeyBuilder::new(method, path)
    }

    /// The key as stored by backends.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Accumulates the dimensions of a [`CacheKey`].
///
/// Optional dimensions that are not set are still represented in the
/// canonical form (as an absent marker), so "no version" never collides with
/// an empty version string.
#[derive(Debug)]
pub struct CacheKeyBuilder<'a> {
    prefix: &'a str,
    method: &'a Method,
    path: &'a str,
    version: Option<&'a str>,
    params: Option<&'a Params>,
    contribution: Option<String>,
    etag: Option<&'a str>,
}

impl<'a> CacheKeyBuilder<'a> {
    fn new(method: &'a Method, path: &'a str) -> Self {
        Self {
            prefix: DEFAULT_KEY_PREFIX,
            method,
            path,
            version: None,
            params: None,
            contribution: None,
            etag: None,
        }
    }

    /// Overrides the key namespace.
    pub fn prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    /// Sets the API version selector.
    pub fn version(mut self, version: Option<&'a str>) -> Self {
        self.version = version;
        self
    }

    /// Includes the declared parameters.
    pub fn params(mut self, params: &'a Params) -> Self {
        self.params = Some(params);
        self
    }

    /// Includes a user supplied key contribution.
    pub fn contribution(mut self, contribution: Option<String>) -> Self {
        self.contribution = contribution;
        self
    }

    /// Includes the resolved entity tag.
    pub fn etag(mut self, etag: Option<&'a str>) -> Self {
        self.etag = etag;
        self
    }

    /// Canonical, human readable form of the collected dimensions.
    pub fn canonical(&self) -> String {
        let params = self.params.map(Params::canonical);

        let pairs: [(&str, Option<&str>); 6] = [
            ("method", Some(self.method.as_str())),
            ("path", Some(self.path)),
            ("version", self.version),
            ("params", params.as_deref()),
            ("key", self.contribution.as_deref()),
            ("etag", self.etag),
        ];

        pairs
            .into_iter()
            .map(|(name, value)| match value {
                Some(value) => format!("{name}={}", encode_component(value)),
                None => name.to_owned(),
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Hashes the canonical form into a [`CacheKey`].
    pub fn build(self) -> CacheKey {
        let digest = Sha256::digest(self.canonical().as_bytes());
        CacheKey::from_raw(format!("{}:{}", self.prefix, hex::encode(digest)))
    }
}

pub(crate) fn encode_component(value: &str) -> String {
    serde_urlencoded::to_string([("", value)])
        .map(|encoded| encoded.trim_start_matches('=').to_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    static GET: Method = Method::GET;

    fn base() -> CacheKeyBuilder<'static> {
        CacheKey::builder(&GET, "/items").version(Some("v1"))
    }

    #[test]
    fn test_identical_requests_collide() {
        let params = Params::new().with("a", "1").with("b", vec!["x", "y"]);
        let reordered = Params::new().with("b", vec!["x", "y"]).with("a", "1");

        let first = base().params(&params).build();
        let second = base().params(&reordered).build();
        assert_eq!(first, second);
    }

    #[test]
    fn test_every_dimension_changes_the_key() {
        let params = Params::new().with("a", "1");
        let reference = base().params(&params).build();

        let other_params = Params::new().with("a", "2");
        let variants = [
            CacheKey::builder(&Method::HEAD, "/items")
                .version(Some("v1"))
                .params(&params)
                .build(),
            CacheKey::builder(&Method::GET, "/items/1")
                .version(Some("v1"))
                .params(&params)
                .build(),
            base().version(Some("v2")).params(&params).build(),
            base().params(&other_params).build(),
            base().params(&params).contribution(Some("user-1".into())).build(),
            base().params(&params).etag(Some("\"e\"")).build(),
            base().params(&params).prefix("other").build(),
        ];

        for variant in variants {
            assert_ne!(variant, reference);
        }
    }

    #[test]
    fn test_absent_differs_from_empty() {
        let absent = CacheKey::builder(&Method::GET, "/").build();
        let empty = CacheKey::builder(&Method::GET, "/").version(Some("")).build();
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_values_cannot_spill_into_other_parts() {
        let sneaky = CacheKey::builder(&Method::GET, "/a&version=v2").build();
        let honest = CacheKey::builder(&Method::GET, "/a").version(Some("v2")).build();
        assert_ne!(sneaky, honest);
    }

    #[test]
    fn test_canonical_form() {
        let params = Params::new().with("q", "rust lang");
        let canonical = base().params(&params).canonical();
        assert_eq!(
            canonical,
            "method=GET&path=%2Fitems&version=v1&params=q%3Drust%2Blang&key&etag"
        );
    }

    #[test]
    fn test_param_shapes_change_the_key() {
        let scalar = Params::new().with("a[]", "x");
        let list = Params::new().with("a", vec!["x"]);
        assert_ne!(base().params(&scalar).build(), base().params(&list).build());

        let empty_list = Params::new().with("a", Vec::<String>::new());
        assert_ne!(
            base().params(&empty_list).build(),
            base().params(&Params::new()).build()
        );
    }

    #[test]
    fn test_key_shape() {
        let key = base().build();
        let (prefix, digest) = key.as_str().split_once(':').unwrap();
        assert_eq!(prefix, DEFAULT_KEY_PREFIX);
        assert_eq!(digest.len(), 64);
    }
}
