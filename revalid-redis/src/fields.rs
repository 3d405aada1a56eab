//! Hash field layout of a stored entry.
//!
//! Every cache key maps to one Redis hash:
//!
//! | Field | Content |
//! |-------|---------|
//! | `s` | status code, integer |
//! | `h` | packed headers, possibly compressed |
//! | `b` | body, possibly compressed |
//! | `m` | encoded [`EntryMetadata`] |
//! | `c` | compression flags |
//!
//! `h` and `b` are compressed independently, only when their size reaches the
//! configured threshold.

use bytes::Bytes;
use revalid_backend::{BackendResult, Compressor};
use revalid_core::{CachedResponse, EntryMetadata, StoredEntry, decode_status, unpack_headers};

use crate::error::Error;

/// Status field.
pub const STATUS: &str = "s";
/// Headers field.
pub const HEADERS: &str = "h";
/// Body field.
pub const BODY: &str = "b";
/// Metadata field.
pub const METADATA: &str = "m";
/// Compression flags field.
pub const FLAGS: &str = "c";

/// Flag bit set when `b` is compressed.
pub const BODY_COMPRESSED: u8 = 0b01;
/// Flag bit set when `h` is compressed.
pub const HEADERS_COMPRESSED: u8 = 0b10;

/// Sizes at or above this many bytes are compressed (10 KiB).
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 10 * 1024;

/// An entry in its stored shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedEntry {
    /// `s`
    pub status: u16,
    /// `h`
    pub headers: Vec<u8>,
    /// `b`
    pub body: Vec<u8>,
    /// `m`
    pub metadata: Vec<u8>,
    /// `c`
    pub flags: u8,
}

impl EncodedEntry {
    /// Packs a response and its metadata, compressing large fields.
    pub fn encode(
        response: &CachedResponse,
        metadata: &EntryMetadata,
        compressor: &dyn Compressor,
        threshold: usize,
    ) -> BackendResult<Self> {
        let mut flags = 0;

        let headers = response.pack_headers();
        let headers = if headers.len() >= threshold {
            flags |= HEADERS_COMPRESSED;
            compressor.compress(&headers)?
        } else {
            headers
        };

        let body = if response.body.len() >= threshold {
            flags |= BODY_COMPRESSED;
            compressor.compress(&response.body)?
        } else {
            response.body.to_vec()
        };

        Ok(Self {
            status: response.status.as_u16(),
            headers,
            body,
            metadata: metadata.encode(),
            flags,
        })
    }

    /// Restores the stored entry, decompressing flagged fields.
    pub fn decode(self, compressor: &dyn Compressor) -> BackendResult<StoredEntry> {
        if self.flags & !(BODY_COMPRESSED | HEADERS_COMPRESSED) != 0 {
            return Err(Error::InvalidFlags(i64::from(self.flags)).into());
        }

        let headers = if self.flags & HEADERS_COMPRESSED != 0 {
            compressor.decompress(&self.headers)?
        } else {
            self.headers
        };
        let body = if self.flags & BODY_COMPRESSED != 0 {
            compressor.decompress(&self.body)?
        } else {
            self.body
        };

        Ok(StoredEntry {
            response: CachedResponse {
                status: decode_status(self.status)?,
                headers: unpack_headers(&headers)?,
                body: Bytes::from(body),
            },
            metadata: EntryMetadata::decode(&self.metadata)?,
        })
    }
}

/// Raw `HMGET s h b m c` reply.
pub(crate) type FieldsReply = (
    Option<i64>,
    Option<Vec<u8>>,
    Option<Vec<u8>>,
    Option<Vec<u8>>,
    Option<i64>,
);

/// Validates an `HMGET` reply. `None` when the key does not exist.
pub(crate) fn from_reply(reply: FieldsReply) -> Result<Option<EncodedEntry>, Error> {
    let (status, headers, body, metadata, flags) = reply;
    if status.is_none() && headers.is_none() && body.is_none() && metadata.is_none() {
        return Ok(None);
    }

    let status = status.ok_or(Error::MissingField(STATUS))?;
    let flags = flags.ok_or(Error::MissingField(FLAGS))?;
    Ok(Some(EncodedEntry {
        status: u16::try_from(status).map_err(|_| Error::InvalidStatus(status))?,
        headers: headers.ok_or(Error::MissingField(HEADERS))?,
        body: body.ok_or(Error::MissingField(BODY))?,
        metadata: metadata.ok_or(Error::MissingField(METADATA))?,
        flags: u8::try_from(flags).map_err(|_| Error::InvalidFlags(flags))?,
    }))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use revalid_backend::{BackendError, GzipCompressor, PassthroughCompressor};

    use super::*;

    fn metadata() -> EntryMetadata {
        EntryMetadata::new()
            .with_etag("\"abc\"")
            .with_expire_at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_small_body_is_stored_verbatim() {
        let response = CachedResponse::new(StatusCode::OK, "tiny");
        let encoded = EncodedEntry::encode(
            &response,
            &metadata(),
            &GzipCompressor::default(),
            DEFAULT_COMPRESSION_THRESHOLD,
        )
        .unwrap();

        assert_eq!(encoded.flags & BODY_COMPRESSED, 0);
        assert_eq!(encoded.body, b"tiny".to_vec());
    }

    #[test]
    fn test_body_at_threshold_is_compressed() {
        let body = "a".repeat(DEFAULT_COMPRESSION_THRESHOLD);
        let response = CachedResponse::new(StatusCode::OK, body.clone());
        let compressor = GzipCompressor::default();
        let encoded =
            EncodedEntry::encode(&response, &metadata(), &compressor, DEFAULT_COMPRESSION_THRESHOLD)
                .unwrap();

        assert_eq!(encoded.flags, BODY_COMPRESSED);
        assert!(encoded.body.len() < body.len());

        let decoded = encoded.decode(&compressor).unwrap();
        assert_eq!(decoded.response, response);
        assert_eq!(decoded.metadata, metadata());
    }

    #[test]
    fn test_one_byte_below_threshold_is_not_compressed() {
        let response =
            CachedResponse::new(StatusCode::OK, "a".repeat(DEFAULT_COMPRESSION_THRESHOLD - 1));
        let encoded = EncodedEntry::encode(
            &response,
            &metadata(),
            &GzipCompressor::default(),
            DEFAULT_COMPRESSION_THRESHOLD,
        )
        .unwrap();
        assert_eq!(encoded.flags, 0);
    }

    #[test]
    fn test_headers_and_body_flags_are_independent() {
        let response = CachedResponse::new(StatusCode::OK, "small body")
            .with_header("x-large", &"v".repeat(64));
        let compressor = GzipCompressor::default();
        let encoded = EncodedEntry::encode(&response, &metadata(), &compressor, 32).unwrap();

        assert_eq!(encoded.flags, HEADERS_COMPRESSED);
        assert_eq!(encoded.decode(&compressor).unwrap().response, response);
    }

    #[test]
    fn test_unknown_flag_bits_are_rejected() {
        let mut encoded = EncodedEntry::encode(
            &CachedResponse::new(StatusCode::OK, "x"),
            &metadata(),
            &PassthroughCompressor,
            DEFAULT_COMPRESSION_THRESHOLD,
        )
        .unwrap();
        encoded.flags = 0b100;
        assert!(matches!(
            encoded.decode(&PassthroughCompressor),
            Err(BackendError::InternalError(_))
        ));
    }

    #[test]
    fn test_flagged_but_uncompressed_body_fails_to_decode() {
        let mut encoded = EncodedEntry::encode(
            &CachedResponse::new(StatusCode::OK, "plain"),
            &metadata(),
            &GzipCompressor::default(),
            DEFAULT_COMPRESSION_THRESHOLD,
        )
        .unwrap();
        encoded.flags = BODY_COMPRESSED;
        assert!(matches!(
            encoded.decode(&GzipCompressor::default()),
            Err(BackendError::CompressionError(_))
        ));
    }

    #[test]
    fn test_corrupt_metadata_fails_to_decode() {
        let mut encoded = EncodedEntry::encode(
            &CachedResponse::new(StatusCode::OK, "x"),
            &metadata(),
            &PassthroughCompressor,
            DEFAULT_COMPRESSION_THRESHOLD,
        )
        .unwrap();
        encoded.metadata.clear();
        assert!(matches!(
            encoded.decode(&PassthroughCompressor),
            Err(BackendError::DecodeError(_))
        ));
    }

    #[test]
    fn test_empty_reply_means_absent() {
        assert_eq!(from_reply((None, None, None, None, None)).unwrap(), None);
    }

    #[test]
    fn test_partial_reply_is_an_error() {
        let reply = (Some(200), None, Some(b"x".to_vec()), Some(Vec::new()), Some(0));
        assert!(matches!(
            from_reply(reply),
            Err(Error::MissingField(HEADERS))
        ));
    }

    #[test]
    fn test_out_of_range_status_is_an_error() {
        let reply = (
            Some(70_000),
            Some(Vec::new()),
            Some(Vec::new()),
            Some(Vec::new()),
            Some(0),
        );
        assert!(matches!(from_reply(reply), Err(Error::InvalidStatus(70_000))));
    }
}
