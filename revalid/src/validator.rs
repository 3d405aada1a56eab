//! Conditional-request validation against the backend.
//!
//! Each request walks
//! `Start -> ConditionalCheck -> KeyLookup -> {NotModified | Hit | Miss}`:
//!
//! 1. **ConditionalCheck** resolves the validators (entity tag, last
//!    modification) and answers `If-None-Match`, `If-Modified-Since` and
//!    `If-Unmodified-Since` without touching the backend.
//! 2. **KeyLookup** reads the stored metadata under the request's key and
//!    compares it with the fresh validators. Only when they agree is the full
//!    entry fetched.
//! 3. A **Miss** hands a [`Capture`] to the caller, which runs the handler and
//!    commits its response. The validator itself never stores.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use revalid_backend::{BackendResult, CacheBackend};
use revalid_core::{
    CacheKey, CachedResponse, EntryMetadata, RequestContext, format_http_date,
};
use tracing::{debug, trace};

use crate::etag::EntityTag;
use crate::metrics;
use crate::policy::PolicyConfig;

/// Result of validating one request.
#[derive(Debug)]
pub enum Outcome {
    /// The client's copy is current (`304`), or its `If-Unmodified-Since`
    /// precondition failed (`304`/`412`). Empty body.
    NotModified(CachedResponse),
    /// The stored response, with this request's validator and cache headers.
    Hit(CachedResponse),
    /// The handler must run; its response is committed through `capture`.
    Miss {
        /// Where and how to store the handler's response.
        capture: Capture,
        /// Validator and cache headers to add to the handler's response.
        headers: HeaderMap,
    },
}

impl Outcome {
    /// `NOT_MODIFIED`, `HIT` or `MISS`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotModified(_) => "NOT_MODIFIED",
            Self::Hit(_) => "HIT",
            Self::Miss { .. } => "MISS",
        }
    }
}

/// Instructions for storing the response of a missed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    key: CacheKey,
    metadata: EntryMetadata,
}

impl Capture {
    /// Key the response will be stored under.
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Metadata the response will be stored with.
    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    /// Stores `response`. Consumes the capture, so it happens once.
    pub async fn commit<B>(self, backend: &B, response: &CachedResponse) -> BackendResult<()>
    where
        B: CacheBackend + ?Sized,
    {
        backend.store(&self.key, response, &self.metadata).await
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Start,
    ConditionalCheck,
    KeyLookup,
    NotModified,
    Hit,
    Miss,
}

/// Runs a [`PolicyConfig`] against requests.
#[derive(Debug, Clone)]
pub struct Validator {
    policy: Arc<PolicyConfig>,
}

impl Validator {
    /// Validator for `policy`.
    pub fn new(policy: impl Into<Arc<PolicyConfig>>) -> Self {
        Self {
            policy: policy.into(),
        }
    }

    /// The policy applied.
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Decides how to answer `ctx`.
    ///
    /// Performs at most one metadata read and one full read. Storage errors
    /// have already been turned into absent entries by [`CacheBackend`], so
    /// a broken backend only ever produces misses.
    pub async fn validate<B>(&self, ctx: &mut RequestContext, backend: &B) -> Outcome
    where
        B: CacheBackend + ?Sized,
    {
        let outcome = self.run(ctx, backend).await;
        metrics::record_outcome(&outcome, backend.name());
        outcome
    }

    async fn run<B>(&self, ctx: &mut RequestContext, backend: &B) -> Outcome
    where
        B: CacheBackend + ?Sized,
    {
        let policy = &*self.policy;
        let mut state = State::Start;
        debug!(?state, method = %ctx.method(), path = ctx.path(), "validating request");

        policy.prepare(ctx);
        let ctx = &*ctx;

        state = State::ConditionalCheck;
        debug!(?state);
        let mut headers = HeaderMap::new();

        let etag = policy.resolve_etag(ctx);
        if let Some(tag) = &etag {
            if let Ok(value) = HeaderValue::from_str(&tag.to_string()) {
                headers.insert(header::ETAG, value);
            }
            if ctx
                .if_none_match()
                .is_some_and(|candidates| tag.matches_if_none_match(candidates))
            {
                state = State::NotModified;
                debug!(?state, %tag, "If-None-Match matched");
                return Outcome::NotModified(CachedResponse::bodiless(
                    StatusCode::NOT_MODIFIED,
                    headers,
                ));
            }
        }

        let last_modified = policy.resolve_last_modified(ctx);
        if let Some(modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(&format_http_date(modified)) {
                headers.insert(header::LAST_MODIFIED, value);
            }
            // If-None-Match takes precedence over If-Modified-Since (RFC 7232 §6).
            let none_match_evaluated = etag.is_some() && ctx.if_none_match().is_some();
            if !none_match_evaluated
                && ctx.if_modified_since().is_some_and(|since| modified <= since)
            {
                state = State::NotModified;
                debug!(?state, %modified, "not modified since");
                return Outcome::NotModified(CachedResponse::bodiless(
                    StatusCode::NOT_MODIFIED,
                    headers,
                ));
            }
            if ctx.if_unmodified_since().is_some_and(|since| modified > since) {
                let status = policy.precondition_failure().status();
                state = State::NotModified;
                debug!(?state, %modified, %status, "modified since precondition");
                return Outcome::NotModified(CachedResponse::bodiless(status, headers));
            }
        }

        if let Some(value) = policy.resolve_cache_control(ctx).to_header_value() {
            headers.insert(header::CACHE_CONTROL, value);
        }
        let vary = policy.resolve_vary(ctx);
        if !vary.is_empty()
            && let Ok(value) = HeaderValue::from_str(&vary.join(", "))
        {
            headers.insert(header::VARY, value);
        }

        state = State::KeyLookup;
        let key = policy.cache_key(ctx, etag.as_ref());
        debug!(?state, %key);

        let fresh = match backend.fetch_metadata(&key).await {
            None => {
                trace!(%key, "no stored metadata");
                false
            }
            Some(stored) => {
                // Checked in order: entity tag, then last modification, then
                // plain expiry when neither validator resolved.
                let etag_matches = etag
                    .as_ref()
                    .is_some_and(|tag| stored.etag() == Some(tag.to_string().as_str()));
                let unmodified = last_modified.is_some_and(|modified| {
                    stored
                        .last_modified()
                        .is_some_and(|stored_modified| modified <= stored_modified)
                });
                let unexpired =
                    etag.is_none() && last_modified.is_none() && !stored.is_expired(Utc::now());
                etag_matches || unmodified || unexpired
            }
        };

        if fresh && let Some(mut response) = backend.fetch(&key).await {
            response.overlay_headers(&headers);
            state = State::Hit;
            debug!(?state, %key);
            return Outcome::Hit(response);
        }

        let mut metadata = EntryMetadata::new();
        if let Some(tag) = &etag {
            metadata = metadata.with_etag(tag.to_string());
        }
        if let Some(modified) = last_modified {
            metadata = metadata.with_last_modified(modified);
        }
        if let Some(expire_at) = policy
            .resolve_expires_in(ctx)
            .and_then(|expires_in| TimeDelta::from_std(expires_in).ok())
            .and_then(|expires_in| Utc::now().checked_add_signed(expires_in))
        {
            metadata = metadata.with_expire_at(expire_at);
        }

        state = State::Miss;
        debug!(?state, %key);
        Outcome::Miss {
            capture: Capture { key, metadata },
            headers,
        }
    }
}
