//! Freshness metadata stored alongside every cached response.
//!
//! [`EntryMetadata`] is the oracle the validator consults before touching a
//! stored body: it records the validators (`etag`, `last_modified`) that were
//! current when the response was captured and the instant the entry expires.
//!
//! ## Wire format
//!
//! The metadata is written as a compact bitcode record with three ordered
//! fields:
//!
//! | # | Field | Encoding |
//! |---|-------|----------|
//! | 1 | etag | nullable string |
//! | 2 | last-modified | nullable RFC 3339 UTC string with nine fractional digits |
//! | 3 | expiry | nullable epoch seconds |
//!
//! The last-modified text is fixed width, so encoded timestamps sort in time
//! order. A missing expiry is encoded as the null variant, which keeps it
//! distinct from a real expiry at epoch `0`.
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use revalid_core::EntryMetadata;
//!
//! let metadata = EntryMetadata::new()
//!     .with_etag("\"abc\"")
//!     .with_expire_at(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap());
//!
//! let bytes = metadata.encode();
//! assert_eq!(EntryMetadata::decode(&bytes).unwrap(), metadata);
//! ```

use bitcode::{Decode, Encode};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};

use crate::DecodeError;

/// Validators and expiry of a cached entry.
///
/// `expire_at` is kept with whole-second precision because that is what the
/// wire format carries. Sub-second parts are dropped by
/// [`with_expire_at`](Self::with_expire_at).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EntryMetadata {
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
    expire_at: Option<DateTime<Utc>>,
}

impl EntryMetadata {
    /// Creates metadata with every signal absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entity tag, as it appears in the `ETag` header.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Sets the last-modified instant.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Sets the expiry instant, truncated to whole seconds.
    pub fn with_expire_at(mut self, expire_at: DateTime<Utc>) -> Self {
        self.expire_at = Some(expire_at.trunc_subsecs(0));
        self
    }

    /// Entity tag recorded at capture time.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Last-modified instant recorded at capture time.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Instant after which the entry must no longer be served.
    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    /// Returns `true` once `now` has reached the expiry instant.
    ///
    /// Always `false` for metadata without an expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|expire_at| expire_at <= now)
    }

    /// Serializes the metadata into its binary record.
    pub fn encode(&self) -> Vec<u8> {
        bitcode::encode(&WireMetadata {
            etag: self.etag.clone(),
            last_modified: self
                .last_modified
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Nanos, true)),
            expire_at: self.expire_at.map(|at| at.timestamp()),
        })
    }

    /// Parses a binary record produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireMetadata = bitcode::decode(bytes)?;

        let last_modified = wire
            .last_modified
            .map(|value| {
                DateTime::parse_from_rfc3339(&value)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|source| DecodeError::Timestamp { value, source })
            })
            .transpose()?;

        let expire_at = wire
            .expire_at
            .map(|secs| DateTime::from_timestamp(secs, 0).ok_or(DecodeError::EpochOutOfRange(secs)))
            .transpose()?;

        Ok(Self {
            etag: wire.etag,
            last_modified,
            expire_at,
        })
    }
}

#[derive(Encode, Decode)]
struct WireMetadata {
    etag: Option<String>,
    last_modified: Option<String>,
    expire_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 30, 15).unwrap()
    }

    #[test]
    fn test_roundtrip_all_fields() {
        let metadata = EntryMetadata::new()
            .with_etag("W/\"v1\"")
            .with_last_modified(instant() + Duration::nanoseconds(123_456_789))
            .with_expire_at(instant() + Duration::hours(1));

        let decoded = EntryMetadata::decode(&metadata.encode()).unwrap();
        assert_eq!(decoded, metadata);
        assert_eq!(
            decoded.last_modified().unwrap().timestamp_subsec_nanos(),
            123_456_789
        );
    }

    #[test]
    fn test_roundtrip_all_absent() {
        let metadata = EntryMetadata::new();
        assert_eq!(EntryMetadata::decode(&metadata.encode()).unwrap(), metadata);
    }

    #[test]
    fn test_epoch_zero_expiry_is_not_absent() {
        let epoch = DateTime::from_timestamp(0, 0).unwrap();
        let with_zero = EntryMetadata::new().with_expire_at(epoch);
        let without = EntryMetadata::new();

        assert_ne!(with_zero.encode(), without.encode());
        let decoded = EntryMetadata::decode(&with_zero.encode()).unwrap();
        assert_eq!(decoded.expire_at(), Some(epoch));
    }

    #[test]
    fn test_expire_at_truncated_to_seconds() {
        let metadata = EntryMetadata::new().with_expire_at(instant() + Duration::milliseconds(900));
        assert_eq!(metadata.expire_at(), Some(instant()));
    }

    #[test]
    fn test_is_expired_boundaries() {
        let expire_at = instant();
        let metadata = EntryMetadata::new().with_expire_at(expire_at);

        assert!(!metadata.is_expired(expire_at - Duration::seconds(1)));
        assert!(!metadata.is_expired(expire_at - Duration::nanoseconds(1)));
        assert!(metadata.is_expired(expire_at));
        assert!(metadata.is_expired(expire_at + Duration::days(365)));
    }

    #[test]
    fn test_never_expires_without_expiry() {
        let metadata = EntryMetadata::new().with_etag("\"x\"");
        assert!(!metadata.is_expired(DateTime::<Utc>::MAX_UTC));
    }

    #[test]
    fn test_last_modified_encoding_sorts_in_time_order() {
        let early = instant().to_rfc3339_opts(SecondsFormat::Nanos, true);
        let late = (instant() + Duration::nanoseconds(1)).to_rfc3339_opts(SecondsFormat::Nanos, true);
        assert_eq!(early.len(), late.len());
        assert!(early < late);
    }

    #[test]
    fn test_decode_empty() {
        assert!(EntryMetadata::decode(b"").is_err());
    }

    #[test]
    fn test_decode_truncated() {
        let bytes = EntryMetadata::new()
            .with_etag("\"abcdef\"")
            .with_expire_at(instant())
            .encode();
        assert!(EntryMetadata::decode(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_decode_bad_timestamp() {
        let bytes = bitcode::encode(&WireMetadata {
            etag: None,
            last_modified: Some("yesterday".to_owned()),
            expire_at: None,
        });
        assert!(matches!(
            EntryMetadata::decode(&bytes),
            Err(DecodeError::Timestamp { .. })
        ));
    }

    #[test]
    fn test_decode_epoch_out_of_range() {
        let bytes = bitcode::encode(&WireMetadata {
            etag: None,
            last_modified: None,
            expire_at: Some(i64::MAX),
        });
        assert!(matches!(
            EntryMetadata::decode(&bytes),
            Err(DecodeError::EpochOutOfRange(_))
        ));
    }
}
