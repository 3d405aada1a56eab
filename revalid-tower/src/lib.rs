//! Tower middleware for the revalid HTTP response cache.
//!
//! [`CacheLayer`] wraps any Tower service answering `http::Request`s. Each
//! `GET` or `HEAD` request is turned into a
//! [`RequestContext`](revalid_core::RequestContext) and validated:
//!
//! - a satisfied conditional request is answered `304 Not Modified` (or
//!   `412 Precondition Failed`) without calling the inner service;
//! - a fresh stored entry is served from the backend;
//! - otherwise the inner service runs, its body is collected, and a `2xx`
//!   response is stored for the next request.
//!
//! The query string is parsed into [`Params`](revalid_core::Params) so that
//! requests differing only by parameters get separate entries.
//!
//! # Quick Start
//!
//! ```
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use http::{Request, Response};
//! use revalid::PolicyConfig;
//! use revalid_backend::InMemoryBackend;
//! use revalid_tower::CacheLayer;
//! use tower::{ServiceBuilder, service_fn};
//!
//! let layer = CacheLayer::new(
//!     Arc::new(InMemoryBackend::new()),
//!     PolicyConfig::builder()
//!         .etag(|_ctx| Some("v1".to_owned()))
//!         .expires_in(Duration::from_secs(60))
//!         .build(),
//! );
//!
//! let service = ServiceBuilder::new()
//!     .layer(layer)
//!     .service(service_fn(|_req: Request<String>| async {
//!         Ok::<_, Infallible>(Response::new("Hello".to_owned()))
//!     }));
//! # drop(service);
//! ```
//!
//! # Response Headers
//!
//! Every validated response carries a cache status header, `x-cache-status`
//! unless renamed with [`CacheLayer::cache_status_header`]:
//!
//! | Header Value   | Meaning                                   |
//! |----------------|-------------------------------------------|
//! | `NOT_MODIFIED` | Answered by validation, no body            |
//! | `HIT`          | Served from the backend                    |
//! | `MISS`         | Served by the inner service                |

mod layer;
mod service;

pub use layer::CacheLayer;
pub use service::CacheService;

/// Default name of the header reporting the cache status.
pub const DEFAULT_CACHE_STATUS_HEADER: &str = "x-cache-status";
