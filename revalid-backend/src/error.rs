//! Error types for backend operations.

use revalid_core::DecodeError;
use thiserror::Error;

use crate::compressor::CompressionError;

/// Error type for backend operations.
///
/// Read-side errors never leave the [`CacheBackend`](crate::CacheBackend)
/// layer: they are logged and reported as an absent entry.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Internal backend error, state or computation error.
    ///
    /// Any error not related to network interaction.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),

    /// Network interaction error.
    ///
    /// Errors occurring during communication with remote backends (e.g., Redis).
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// A stored record could not be decoded.
    #[error(transparent)]
    DecodeError(#[from] DecodeError),

    /// Compression or decompression error.
    #[error(transparent)]
    CompressionError(#[from] CompressionError),
}
