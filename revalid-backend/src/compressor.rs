//! Byte-level compression used by backends that compress stored fields.
//!
//! | Compressor | Feature | Notes |
//! |------------|---------|-------|
//! | [`PassthroughCompressor`] | always | stores bytes verbatim |
//! | [`GzipCompressor`] | `gzip` (default) | flate2, level 6 by default |
//! | [`ZstdCompressor`] | `zstd` | level 3 by default |

use std::fmt::Debug;

use thiserror::Error;

/// Error raised while compressing or decompressing a field.
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Compressing failed.
    #[error("compression failed: {0}")]
    Compress(#[source] std::io::Error),
    /// Decompressing failed, usually because the input is not compressed data.
    #[error("decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
}

/// A reversible byte transform.
pub trait Compressor: Debug + Send + Sync {
    /// Compresses `data`.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;

    /// Reverses [`compress`](Self::compress).
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError>;
}

impl<C: Compressor + ?Sized> Compressor for Box<C> {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).compress(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).decompress(data)
    }
}

impl<C: Compressor + ?Sized> Compressor for std::sync::Arc<C> {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).compress(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        (**self).decompress(data)
    }
}

/// Leaves data untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompressor;

impl Compressor for PassthroughCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        Ok(data.to_vec())
    }
}

/// Gzip compression backed by flate2.
#[cfg(feature = "gzip")]
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: u32,
}

#[cfg(feature = "gzip")]
impl GzipCompressor {
    /// Creates a compressor with an explicit level (0-9).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

#[cfg(feature = "gzip")]
impl Default for GzipCompressor {
    fn default() -> Self {
        Self::with_level(6)
    }
}

#[cfg(feature = "gzip")]
impl Compressor for GzipCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        use std::io::Write;

        let mut encoder = flate2::write::GzEncoder::new(
            Vec::with_capacity(data.len() / 2),
            flate2::Compression::new(self.level),
        );
        encoder.write_all(data).map_err(CompressionError::Compress)?;
        encoder.finish().map_err(CompressionError::Compress)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        use std::io::Read;

        let mut decoder = flate2::read::GzDecoder::new(data);
        let mut out = Vec::with_capacity(data.len() * 2);
        decoder
            .read_to_end(&mut out)
            .map_err(CompressionError::Decompress)?;
        Ok(out)
    }
}

/// Zstandard compression.
#[cfg(feature = "zstd")]
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    level: i32,
}

#[cfg(feature = "zstd")]
impl ZstdCompressor {
    /// Creates a compressor with an explicit level.
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

#[cfg(feature = "zstd")]
impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::with_level(3)
    }
}

#[cfg(feature = "zstd")]
impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        zstd::encode_all(data, self.level).map_err(CompressionError::Compress)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        zstd::decode_all(data).map_err(CompressionError::Decompress)
    }
}
