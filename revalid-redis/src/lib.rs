#![warn(missing_docs)]
//! Redis backend for the revalid HTTP response cache.
//!
//! ```no_run
//! use revalid_redis::{ConnectionMode, RedisBackend};
//!
//! # fn main() -> Result<(), revalid_redis::Error> {
//! let backend = RedisBackend::builder()
//!     .connection(ConnectionMode::single("redis://127.0.0.1:6379/1"))
//!     .compression_threshold(16 * 1024)
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! The connection is acquired on first use, so building never touches the
//! network.

pub mod backend;
pub mod error;
pub mod fields;

#[doc(inline)]
pub use crate::backend::{ConnectionFactory, ConnectionMode, RedisBackend, RedisBackendBuilder};
#[doc(inline)]
pub use crate::error::Error;
#[doc(inline)]
pub use crate::fields::DEFAULT_COMPRESSION_THRESHOLD;
