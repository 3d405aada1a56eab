#![warn(missing_docs)]
//! Storage backends for the revalid HTTP response cache.
//!
//! If you want to implement your own backend, you are in the right place:
//! implement [`Backend`] and you get the cache-facing [`CacheBackend`]
//! contract (`store` / `fetch` / `fetch_metadata` / `flush`) for free.
//!
//! | Backend | Crate | Use Case |
//! |---------|-------|----------|
//! | [`InMemoryBackend`] | this crate | single process, tests |
//! | `RedisBackend` | `revalid-redis` | shared, durable |

mod backend;
pub mod compressor;
mod error;
mod memory;

pub use backend::{Backend, BackendResult, CacheBackend};
#[cfg(feature = "gzip")]
pub use compressor::GzipCompressor;
#[cfg(feature = "zstd")]
pub use compressor::ZstdCompressor;
pub use compressor::{CompressionError, Compressor, PassthroughCompressor};
pub use error::BackendError;
pub use memory::InMemoryBackend;
