//! Test support for `pagestream`.
//!
//! Provides a serialised log capture fixture, assertion macros for awaiting
//! stream events with a deadline, helpers producing the server's page JSON,
//! and a scripted event-stream server for exercising the HTTP transport.
//!
//! ```rust
//! use pagestream_testing::{page_json, sse_event};
//!
//! let event = sse_event(&page_json(0, 2, "p0"));
//! assert!(event.starts_with("data: {"));
//! assert!(event.ends_with("}\n\n"));
//! ```

pub mod logging;
pub mod macros;
pub mod sse_server;

pub use logging::{LoggerHandle, logger};
pub use sse_server::{ScriptStep, SseServer};

/// Payload of the end-of-stream sentinel.
pub const SENTINEL: &str = "{}";

/// Page payload in the shape pushed by the chapter endpoint.
#[must_use]
pub fn page_json(idx: i64, total: i64, pic_path: &str) -> String {
    serde_json::json!({ "idx": idx, "total": total, "pic_path": pic_path }).to_string()
}

/// Frame `payload` as one event-stream event.
#[must_use]
pub fn sse_event(payload: &str) -> String { format!("data: {payload}\n\n") }
