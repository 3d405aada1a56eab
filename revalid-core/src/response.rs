//! Cached response representation and header packing.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::{DecodeError, EntryMetadata};

/// A fully buffered HTTP response as the cache stores and serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers, multi-valued headers preserved in order.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl CachedResponse {
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Builder-style header insertion. Invalid names or values are skipped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// An empty-bodied response carrying only `headers`, used for `304` and `412`.
    pub fn bodiless(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    /// Overwrites headers of this response with every header in `headers`.
    pub fn overlay_headers(&mut self, headers: &HeaderMap) {
        for name in headers.keys() {
            self.headers.remove(name);
            for value in headers.get_all(name) {
                self.headers.append(name.clone(), value.clone());
            }
        }
    }

    /// Packs the headers into a compact binary blob.
    pub fn pack_headers(&self) -> Vec<u8> {
        pack_headers(&self.headers)
    }
}

/// A response together with the metadata it was stored with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// The stored response.
    pub response: CachedResponse,
    /// Validators and expiry recorded at capture time.
    pub metadata: EntryMetadata,
}

/// Packs a header map into a bitcode list of `(name, value)` pairs.
pub fn pack_headers(headers: &HeaderMap) -> Vec<u8> {
    let pairs: Vec<(String, Vec<u8>)> = headers
        .iter()
        .map(|(name, value)| (name.as_str().to_owned(), value.as_bytes().to_vec()))
        .collect();
    bitcode::encode(&pairs)
}

/// Restores a header map packed by [`pack_headers`].
pub fn unpack_headers(bytes: &[u8]) -> Result<HeaderMap, DecodeError> {
    let pairs: Vec<(String, Vec<u8>)> = bitcode::decode(bytes)?;
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| DecodeError::Header(name.clone()))?;
        let header_value =
            HeaderValue::from_bytes(&value).map_err(|_| DecodeError::Header(name))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

/// Validates a stored numeric status.
pub fn decode_status(status: u16) -> Result<StatusCode, DecodeError> {
    StatusCode::from_u16(status).map_err(|_| DecodeError::Status(status))
}
