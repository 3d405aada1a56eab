//! HTTP-date formatting and parsing (RFC 7231 §7.1.1.1).

use chrono::{DateTime, Utc};

const IMF_FIXDATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats an instant as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
///
/// Unlike `httpdate`, accepts instants before 1970.
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format(IMF_FIXDATE).to_string()
}

/// Parses an HTTP-date header value in any of the three forms recipients
/// must accept: IMF-fixdate, RFC 850 and asctime.
///
/// Returns `None` for anything that is not a valid date, in which case the
/// conditional header is ignored as RFC 7232 requires.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    httpdate::parse_http_date(value.trim())
        .ok()
        .map(DateTime::<Utc>::from)
}
