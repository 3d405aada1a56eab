use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use http::{HeaderName, StatusCode};
use revalid_core::{CacheKey, DEFAULT_KEY_PREFIX, RequestContext};
use serde::{Deserialize, Serialize};

use crate::cache_control::CacheControl;
use crate::config::Settings;
use crate::error::CacheError;
use crate::etag::EntityTag;

/// Header carrying the API version, part of every cache key.
pub const DEFAULT_VERSION_HEADER: &str = "accept-version";

/// Hook run before anything else; may write typed extensions.
pub type PrepareFn = Arc<dyn Fn(&mut RequestContext) + Send + Sync>;

/// A policy function over the request context.
pub type ResolveFn<T> = Arc<dyn Fn(&RequestContext) -> T + Send + Sync>;

/// A policy value that is either fixed or computed per request.
pub enum Setting<T> {
    /// Same value for every request.
    Fixed(T),
    /// Computed from the request context.
    Resolver(ResolveFn<T>),
}

impl<T: Clone> Setting<T> {
    /// Value for this request.
    pub fn resolve(&self, ctx: &RequestContext) -> T {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Resolver(resolve) => resolve(ctx),
        }
    }
}

impl<T> Clone for Setting<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(value) => Self::Fixed(value.clone()),
            Self::Resolver(resolve) => Self::Resolver(Arc::clone(resolve)),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Setting<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Resolver(_) => f.write_str("Resolver"),
        }
    }
}

/// Response to a failed `If-Unmodified-Since` precondition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
pub enum PreconditionFailure {
    /// `304 Not Modified`.
    #[default]
    NotModified,
    /// `412 Precondition Failed`, as RFC 7232 §3.4 prescribes.
    Status412,
}

impl PreconditionFailure {
    /// Status code answered.
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotModified => StatusCode::NOT_MODIFIED,
            Self::Status412 => StatusCode::PRECONDITION_FAILED,
        }
    }
}

/// Per-route caching policy.
///
/// Immutable once built and shared by every request of the route. All
/// request-dependent settings are functions of the explicit
/// [`RequestContext`].
///
/// ```
/// use std::time::Duration;
///
/// use revalid::{CacheControl, PolicyConfig};
///
/// let policy = PolicyConfig::builder()
///     .etag(|ctx| ctx.params().get("revision").map(|rev| rev.values().join(",")))
///     .expires_in(Duration::from_secs(300))
///     .max_age(Duration::from_secs(60))
///     .cache_control(CacheControl::from("public"))
///     .vary(["accept-encoding"])
///     .build();
/// assert!(policy.include_params());
/// ```
#[derive(Clone)]
pub struct PolicyConfig {
    prepare: Option<PrepareFn>,
    etag: Option<ResolveFn<Option<String>>>,
    last_modified: Option<ResolveFn<Option<DateTime<Utc>>>>,
    expires_in: Option<ResolveFn<Option<Duration>>>,
    max_age: Option<ResolveFn<Option<Duration>>>,
    cache_key: Option<ResolveFn<Option<String>>>,
    include_params: bool,
    include_etag_in_key: bool,
    cache_control: Option<Setting<CacheControl>>,
    vary: Option<Setting<Vec<String>>>,
    weak_etag: bool,
    hash_etag: bool,
    version_header: HeaderName,
    key_prefix: String,
    precondition_failure: PreconditionFailure,
}

impl PolicyConfig {
    /// Creates a new [`PolicyConfigBuilder`] with default settings.
    pub fn builder() -> PolicyConfigBuilder {
        PolicyConfigBuilder::default()
    }

    /// Builder seeded from deployment [`Settings`].
    pub fn builder_from(settings: &Settings) -> Result<PolicyConfigBuilder, CacheError> {
        let version_header = HeaderName::from_bytes(settings.version_header.as_bytes())
            .map_err(|_| {
                CacheError::Configuration(format!(
                    "invalid version header name {:?}",
                    settings.version_header
                ))
            })?;
        let mut builder = Self::builder()
            .version_header(version_header)
            .key_prefix(settings.key_prefix.clone());
        if let Some(expires_in) = settings.default_expires_in {
            builder = builder.expires_in(expires_in);
        }
        Ok(builder)
    }

    /// Runs the prepare hook.
    pub fn prepare(&self, ctx: &mut RequestContext) {
        if let Some(prepare) = &self.prepare {
            prepare(ctx);
        }
    }

    /// Entity tag for this request, already weakened and hashed as configured.
    pub fn resolve_etag(&self, ctx: &RequestContext) -> Option<EntityTag> {
        let raw = self.etag.as_ref().and_then(|etag| etag(ctx))?;
        Some(EntityTag::from_resolved(&raw, self.weak_etag, self.hash_etag))
    }

    /// Last modification instant, truncated to HTTP-date precision.
    pub fn resolve_last_modified(&self, ctx: &RequestContext) -> Option<DateTime<Utc>> {
        let at = self.last_modified.as_ref().and_then(|resolve| resolve(ctx))?;
        Some(at.duration_trunc(TimeDelta::seconds(1)).unwrap_or(at))
    }

    /// Lifetime of an entry captured for this request.
    pub fn resolve_expires_in(&self, ctx: &RequestContext) -> Option<Duration> {
        self.expires_in.as_ref().and_then(|resolve| resolve(ctx))
    }

    /// `Cache-Control` directives, with the configured max-age injected.
    pub fn resolve_cache_control(&self, ctx: &RequestContext) -> CacheControl {
        let mut directives = self
            .cache_control
            .as_ref()
            .map(|setting| setting.resolve(ctx))
            .unwrap_or_default();
        if let Some(max_age) = self.max_age.as_ref().and_then(|resolve| resolve(ctx)) {
            directives.inject_max_age(max_age);
        }
        directives
    }

    /// `Vary` header names, empty when not configured.
    pub fn resolve_vary(&self, ctx: &RequestContext) -> Vec<String> {
        self.vary
            .as_ref()
            .map(|setting| setting.resolve(ctx))
            .unwrap_or_default()
    }

    /// Storage key of this request.
    pub fn cache_key(&self, ctx: &RequestContext, etag: Option<&EntityTag>) -> CacheKey {
        let contribution = self.cache_key.as_ref().and_then(|resolve| resolve(ctx));
        let etag = etag
            .filter(|_| self.include_etag_in_key)
            .map(ToString::to_string);

        let mut builder = CacheKey::builder(ctx.method(), ctx.path())
            .prefix(&self.key_prefix)
            .version(ctx.header_str(&self.version_header))
            .contribution(contribution)
            .etag(etag.as_deref());
        if self.include_params {
            builder = builder.params(ctx.params());
        }
        builder.build()
    }

    /// Whether declared parameters are part of the key.
    pub fn include_params(&self) -> bool {
        self.include_params
    }

    /// Whether the entity tag is part of the key.
    pub fn include_etag_in_key(&self) -> bool {
        self.include_etag_in_key
    }

    /// Header selecting the API version.
    pub fn version_header(&self) -> &HeaderName {
        &self.version_header
    }

    /// Key namespace.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Answer to a failed `If-Unmodified-Since`.
    pub fn precondition_failure(&self) -> PreconditionFailure {
        self.precondition_failure
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for PolicyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyConfig")
            .field("prepare", &self.prepare.is_some())
            .field("etag", &self.etag.is_some())
            .field("last_modified", &self.last_modified.is_some())
            .field("expires_in", &self.expires_in.is_some())
            .field("max_age", &self.max_age.is_some())
            .field("cache_key", &self.cache_key.is_some())
            .field("include_params", &self.include_params)
            .field("include_etag_in_key", &self.include_etag_in_key)
            .field("cache_control", &self.cache_control)
            .field("vary", &self.vary)
            .field("weak_etag", &self.weak_etag)
            .field("hash_etag", &self.hash_etag)
            .field("version_header", &self.version_header)
            .field("key_prefix", &self.key_prefix)
            .field("precondition_failure", &self.precondition_failure)
            .finish()
    }
}

/// Builder for [`PolicyConfig`].
///
/// Use [`PolicyConfig::builder()`] to create a new builder.
pub struct PolicyConfigBuilder {
    inner: PolicyConfig,
}

impl Default for PolicyConfigBuilder {
    fn default() -> Self {
        Self {
            inner: PolicyConfig {
                prepare: None,
                etag: None,
                last_modified: None,
                expires_in: None,
                max_age: None,
                cache_key: None,
                include_params: true,
                include_etag_in_key: false,
                cache_control: None,
                vary: None,
                weak_etag: false,
                hash_etag: false,
                version_header: HeaderName::from_static(DEFAULT_VERSION_HEADER),
                key_prefix: DEFAULT_KEY_PREFIX.to_owned(),
                precondition_failure: PreconditionFailure::default(),
            },
        }
    }
}

impl PolicyConfigBuilder {
    /// Hook run first on every request, e.g. to load the resource once and
    /// stash it in the context extensions for the other resolvers.
    pub fn prepare<F>(mut self, prepare: F) -> Self
    where
        F: Fn(&mut RequestContext) + Send + Sync + 'static,
    {
        self.inner.prepare = Some(Arc::new(prepare));
        self
    }

    /// Entity tag resolver.
    pub fn etag<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.inner.etag = Some(Arc::new(resolve));
        self
    }

    /// Last modification resolver.
    pub fn last_modified<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<DateTime<Utc>> + Send + Sync + 'static,
    {
        self.inner.last_modified = Some(Arc::new(resolve));
        self
    }

    /// Fixed lifetime of captured entries.
    pub fn expires_in(self, expires_in: Duration) -> Self {
        self.expires_in_with(move |_| Some(expires_in))
    }

    /// Per-request lifetime of captured entries.
    pub fn expires_in_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<Duration> + Send + Sync + 'static,
    {
        self.inner.expires_in = Some(Arc::new(resolve));
        self
    }

    /// Fixed `max-age` directive.
    pub fn max_age(self, max_age: Duration) -> Self {
        self.max_age_with(move |_| Some(max_age))
    }

    /// Per-request `max-age` directive.
    pub fn max_age_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<Duration> + Send + Sync + 'static,
    {
        self.inner.max_age = Some(Arc::new(resolve));
        self
    }

    /// Extra key dimension, e.g. the authenticated user.
    pub fn cache_key<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Option<String> + Send + Sync + 'static,
    {
        self.inner.cache_key = Some(Arc::new(resolve));
        self
    }

    /// Include declared parameters in the key (default `true`).
    pub fn include_params(mut self, include: bool) -> Self {
        self.inner.include_params = include;
        self
    }

    /// Include the entity tag in the key (default `false`).
    pub fn include_etag_in_key(mut self, include: bool) -> Self {
        self.inner.include_etag_in_key = include;
        self
    }

    /// Fixed `Cache-Control` directives.
    pub fn cache_control(mut self, directives: impl Into<CacheControl>) -> Self {
        self.inner.cache_control = Some(Setting::Fixed(directives.into()));
        self
    }

    /// Per-request `Cache-Control` directives.
    pub fn cache_control_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> CacheControl + Send + Sync + 'static,
    {
        self.inner.cache_control = Some(Setting::Resolver(Arc::new(resolve)));
        self
    }

    /// Fixed `Vary` header names.
    pub fn vary<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.inner.vary = Some(Setting::Fixed(names));
        self
    }

    /// Per-request `Vary` header names.
    pub fn vary_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&RequestContext) -> Vec<String> + Send + Sync + 'static,
    {
        self.inner.vary = Some(Setting::Resolver(Arc::new(resolve)));
        self
    }

    /// Emit weak (`W/`) entity tags.
    pub fn weak_etag(mut self, weak: bool) -> Self {
        self.inner.weak_etag = weak;
        self
    }

    /// Replace resolved entity tags by their SHA-256 hex digest.
    pub fn hash_etag(mut self, hash: bool) -> Self {
        self.inner.hash_etag = hash;
        self
    }

    /// Header selecting the API version (default `Accept-Version`).
    pub fn version_header(mut self, name: HeaderName) -> Self {
        self.inner.version_header = name;
        self
    }

    /// Key namespace (default `revalid`).
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.key_prefix = prefix.into();
        self
    }

    /// Answer to a failed `If-Unmodified-Since` (default `304`).
    pub fn on_precondition_failure(mut self, failure: PreconditionFailure) -> Self {
        self.inner.precondition_failure = failure;
        self
    }

    /// Finishes the policy.
    pub fn build(self) -> PolicyConfig {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use http::Method;
    use pretty_assertions::assert_eq;
    use revalid_core::Params;

    use super::*;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/articles")
            .with_header("accept-version", "v2")
            .with_params(Params::new().with("page", "1"))
    }

    #[test]
    fn test_defaults() {
        let policy = PolicyConfig::default();
        assert!(policy.include_params());
        assert!(!policy.include_etag_in_key());
        assert_eq!(policy.version_header(), "accept-version");
        assert_eq!(policy.key_prefix(), "revalid");
        assert_eq!(policy.precondition_failure().status(), StatusCode::NOT_MODIFIED);
        assert!(policy.resolve_etag(&ctx()).is_none());
        assert!(policy.resolve_cache_control(&ctx()).is_empty());
    }

    #[test]
    fn test_etag_is_weakened_and_hashed() {
        let policy = PolicyConfig::builder()
            .etag(|_| Some("abc".to_owned()))
            .weak_etag(true)
            .hash_etag(true)
            .build();
        let tag = policy.resolve_etag(&ctx()).unwrap();
        assert!(tag.is_weak());
        assert_eq!(tag.opaque().len(), 64);
    }

    #[test]
    fn test_last_modified_truncated_to_seconds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + TimeDelta::milliseconds(750);
        let policy = PolicyConfig::builder().last_modified(move |_| Some(at)).build();
        assert_eq!(
            policy.resolve_last_modified(&ctx()),
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_max_age_injected_into_cache_control() {
        let policy = PolicyConfig::builder()
            .cache_control(CacheControl::names(["public"]))
            .max_age(Duration::from_secs(90))
            .build();
        assert_eq!(
            policy.resolve_cache_control(&ctx()).to_string(),
            "public, max-age=90"
        );
    }

    #[test]
    fn test_cache_control_resolver_sees_context() {
        let policy = PolicyConfig::builder()
            .cache_control_with(|ctx| {
                if ctx.header_str("authorization").is_some() {
                    CacheControl::from("private")
                } else {
                    CacheControl::from("public")
                }
            })
            .build();
        let authorized = ctx().with_header("authorization", "Bearer t");
        assert_eq!(policy.resolve_cache_control(&authorized).to_string(), "private");
        assert_eq!(policy.resolve_cache_control(&ctx()).to_string(), "public");
    }

    #[test]
    fn test_key_dimensions() {
        let policy = PolicyConfig::default();
        let base = policy.cache_key(&ctx(), None);
        assert_eq!(base, policy.cache_key(&ctx(), None));
        assert!(base.as_str().starts_with("revalid:"));

        let other_version = ctx().with_header("accept-version", "v3");
        assert_ne!(base, policy.cache_key(&other_version, None));

        let other_page = ctx().with_params(Params::new().with("page", "2"));
        assert_ne!(base, policy.cache_key(&other_page, None));

        let without_params = PolicyConfig::builder().include_params(false).build();
        assert_eq!(
            without_params.cache_key(&ctx(), None),
            without_params.cache_key(&other_page, None)
        );
    }

    #[test]
    fn test_key_contribution_and_etag() {
        let per_user = PolicyConfig::builder()
            .cache_key(|ctx| ctx.header_str("x-user").map(str::to_owned))
            .build();
        assert_ne!(
            per_user.cache_key(&ctx().with_header("x-user", "a"), None),
            per_user.cache_key(&ctx().with_header("x-user", "b"), None)
        );

        let tag = EntityTag::strong("v1");
        let ignored = PolicyConfig::default();
        assert_eq!(ignored.cache_key(&ctx(), Some(&tag)), ignored.cache_key(&ctx(), None));

        let keyed = PolicyConfig::builder().include_etag_in_key(true).build();
        assert_ne!(keyed.cache_key(&ctx(), Some(&tag)), keyed.cache_key(&ctx(), None));
    }

    #[test]
    fn test_builder_from_settings() {
        let settings = Settings {
            version_header: "x-api-version".to_owned(),
            key_prefix: "shop".to_owned(),
            default_expires_in: Some(Duration::from_secs(30)),
            ..Settings::default()
        };
        let policy = PolicyConfig::builder_from(&settings).unwrap().build();
        assert_eq!(policy.version_header(), "x-api-version");
        assert_eq!(policy.key_prefix(), "shop");
        assert_eq!(policy.resolve_expires_in(&ctx()), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builder_from_rejects_bad_header() {
        let settings = Settings {
            version_header: "not a header".to_owned(),
            ..Settings::default()
        };
        assert!(matches!(
            PolicyConfig::builder_from(&settings),
            Err(CacheError::Configuration(_))
        ));
    }
}
