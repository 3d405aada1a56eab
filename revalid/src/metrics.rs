//! Metrics declaration and recording.

use crate::validator::Outcome;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of conditional requests answered without a body.
    pub static ref NOT_MODIFIED_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalid_not_modified_total",
            "Total number of requests answered 304 or 412 by validation."
        );
        "revalid_not_modified_total"
    };
    /// Track number of cache hit events.
    pub static ref HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalid_hit_total",
            "Total number of responses served from the backend."
        );
        "revalid_hit_total"
    };
    /// Track number of cache miss events.
    pub static ref MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalid_miss_total",
            "Total number of requests that ran the handler."
        );
        "revalid_miss_total"
    };
    /// Track number of failed captures.
    pub static ref STORE_ERROR_COUNTER: &'static str = {
        metrics::describe_counter!(
            "revalid_store_error_total",
            "Total number of handler responses the backend failed to store."
        );
        "revalid_store_error_total"
    };
}

/// Counts a validation outcome.
///
/// When the `metrics` feature is disabled, this function is a no-op.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_outcome(outcome: &Outcome, backend: &str) {
    let counter = match outcome {
        Outcome::NotModified(_) => *NOT_MODIFIED_COUNTER,
        Outcome::Hit(_) => *HIT_COUNTER,
        Outcome::Miss { .. } => *MISS_COUNTER,
    };
    metrics::counter!(counter, "backend" => backend.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_outcome(_outcome: &Outcome, _backend: &str) {}

/// Counts a failed store.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_store_error(backend: &str) {
    metrics::counter!(*STORE_ERROR_COUNTER, "backend" => backend.to_string()).increment(1);
}

/// No-op version when metrics feature is disabled.
#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_store_error(_backend: &str) {}
