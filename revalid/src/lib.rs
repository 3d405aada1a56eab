#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! HTTP response cache with conditional-request validation.
//!
//! A [`Cache`] sits in front of a request handler. For every request it
//! resolves the route's validators, answers conditional requests with
//! `304 Not Modified`, serves stored responses whose validators still match,
//! and captures fresh handler responses into a pluggable backend.
//!
//! ```text
//!                 ┌──────────────┐  304 / 412
//!   request ────▶ │  Validator   │ ────────────▶ client
//!                 └──────┬───────┘
//!              metadata  │  HIT: stored response
//!              lookup    ▼
//!                 ┌──────────────┐
//!                 │   Backend    │
//!                 └──────▲───────┘
//!              MISS:     │ Capture::commit
//!              handler ──┘
//! ```

/// Cache-Control directive composition.
pub mod cache_control;

/// Deployment settings and backend selection.
pub mod config;

/// Error types for cache setup.
pub mod error;

/// Entity tags and `If-None-Match` matching.
pub mod etag;

/// Interceptor hooks and the [`Cache`] interceptor.
pub mod interceptor;

/// Metrics collection for cache observability.
///
/// When the `metrics` feature is enabled, counters for not-modified, hit,
/// miss and store-error events are recorded per backend.
pub mod metrics;

/// Per-route caching policy.
pub mod policy;

/// The request validation state machine.
pub mod validator;

pub use cache_control::{CacheControl, DirectiveValue};
pub use config::{BackendSettings, Settings};
pub use error::CacheError;
pub use etag::EntityTag;
pub use interceptor::{Cache, Handled, Interceptor};
pub use policy::{PolicyConfig, PolicyConfigBuilder, PreconditionFailure};
pub use validator::{Capture, Outcome, Validator};

pub use revalid_core::{
    CacheKey, CachedResponse, EntryMetadata, ParamValue, Params, RequestContext,
};
