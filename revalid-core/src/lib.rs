#![warn(missing_docs)]
//! # revalid-core
//!
//! Core types of the revalid HTTP response cache.
//!
//! This crate holds the vocabulary shared by the validator and every storage
//! backend:
//!
//! - [`EntryMetadata`] and its binary codec, the freshness oracle stored next
//!   to each cached body
//! - [`CacheKey`], the deterministic storage identifier of a request
//! - [`RequestContext`] and [`Params`], the explicit input of caching policies
//! - [`CachedResponse`] and [`StoredEntry`], the persisted response
//! - [`DecodeError`], raised when persisted bytes cannot be decoded

pub mod context;
pub mod date;
pub mod error;
pub mod key;
pub mod metadata;
pub mod params;
pub mod response;

pub use context::RequestContext;
pub use date::{format_http_date, parse_http_date};
pub use error::DecodeError;
pub use key::{CacheKey, CacheKeyBuilder, DEFAULT_KEY_PREFIX};
pub use metadata::EntryMetadata;
pub use params::{ParamValue, Params};
pub use response::{CachedResponse, StoredEntry, decode_status, pack_headers, unpack_headers};
