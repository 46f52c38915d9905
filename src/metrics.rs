//! Metric helpers for `pagestream`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking live streams.
pub const STREAMS_LIVE: &str = "pagestream_streams_live";
/// Name of the counter tracking fragments forwarded from live streams.
pub const FRAGMENTS_FORWARDED: &str = "pagestream_fragments_forwarded_total";
/// Name of the counter tracking events dropped because their stream was superseded.
pub const STALE_EVENTS_DROPPED: &str = "pagestream_stale_events_dropped_total";
/// Name of the counter tracking streams replaced by a newer `start`.
pub const STREAMS_SUPERSEDED: &str = "pagestream_streams_superseded_total";
/// Name of the counter tracking failed streams, labelled by `kind`.
pub const STREAM_ERRORS: &str = "pagestream_stream_errors_total";

/// Increment the live streams gauge.
pub fn inc_live_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_LIVE).increment(1.0);
}

/// Decrement the live streams gauge.
pub fn dec_live_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_LIVE).decrement(1.0);
}

/// Record a forwarded fragment.
pub fn inc_fragments() {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_FORWARDED).increment(1);
}

/// Record an event dropped after supersession or cancellation.
pub fn inc_stale_dropped() {
    #[cfg(feature = "metrics")]
    counter!(STALE_EVENTS_DROPPED).increment(1);
}

/// Record a superseded stream.
pub fn inc_superseded() {
    #[cfg(feature = "metrics")]
    counter!(STREAMS_SUPERSEDED).increment(1);
}

/// Record a failed stream of the given kind (`transport` or `malformed`).
pub fn inc_stream_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(STREAM_ERRORS, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
