//! Error types surfaced by page-stream transports.

use std::io;

use thiserror::Error;

use crate::message::MalformedMessage;

/// Failures of the underlying push subscription.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL cannot be served by this transport.
    #[error("unsupported url {url}: {reason}")]
    InvalidUrl {
        /// Rejected URL.
        url: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// Connecting to the remote endpoint failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// `host:port` that was dialled.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
    /// Connecting took longer than the configured timeout.
    #[error("connecting to {addr} timed out")]
    ConnectTimeout {
        /// `host:port` that was dialled.
        addr: String,
    },
    /// The server answered with a non-success status.
    #[error("server answered with status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
    /// The response head could not be understood.
    #[error("invalid response: {0}")]
    Protocol(String),
    /// An event-stream line exceeded the configured maximum.
    #[error("event-stream line exceeds {max} bytes")]
    LineTooLong {
        /// Configured maximum line length.
        max: usize,
    },
    /// An event-stream line was not valid UTF-8.
    #[error("event-stream line is not valid UTF-8")]
    InvalidUtf8,
    /// I/O failure while reading the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// The remote side reported a failure.
    #[error("remote failure: {0}")]
    Remote(String),
    /// The stream ended before the sentinel arrived.
    #[error("stream closed before completion")]
    Disconnected,
}

/// Terminal error of a single stream.
///
/// Transport failures and malformed payloads are kept apart so callers can
/// decide whether re-requesting the stream makes sense.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The subscription itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A pushed payload was neither a fragment nor the sentinel.
    #[error("malformed stream message: {0}")]
    Malformed(#[from] MalformedMessage),
}

impl StreamError {
    /// Short label used for logging and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Malformed(_) => "malformed",
        }
    }

    /// Returns `true` for [`StreamError::Malformed`].
    #[must_use]
    pub fn is_malformed(&self) -> bool { matches!(self, Self::Malformed(_)) }
}
