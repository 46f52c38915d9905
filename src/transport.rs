//! Transport adapters delivering raw page-stream events.
//!
//! A [`Transport`] opens one [`Subscription`] per URL. The subscription is
//! the live handle of a push stream: it yields decoded [`StreamMessage`]s,
//! closes itself after the sentinel or the first error, and can be closed
//! explicitly at any time. Reconnection is never attempted; a dropped
//! connection surfaces as [`TransportError::Disconnected`].

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, stream::BoxStream};

use crate::message::{StreamMessage, decode_message};

pub mod channel;
pub mod error;
pub mod http;
pub mod sse;

pub use channel::{ChannelListener, ChannelPeer, ChannelTransport};
pub use error::{StreamError, TransportError};
pub use http::{HttpConfig, HttpTransport};
pub use sse::SseCodec;

/// Raw event payloads as produced by a transport, before decoding.
pub type RawEvents = BoxStream<'static, Result<String, TransportError>>;

/// Source of push subscriptions.
///
/// Opening is synchronous; implementations connect lazily when the returned
/// subscription is first polled, and report connection failures through it.
pub trait Transport: Send + Sync + 'static {
    /// Open a subscription to `url`.
    fn open(&self, url: &str) -> Subscription;
}

/// Live handle of one push subscription.
///
/// # Examples
///
/// ```
/// use futures::{StreamExt, executor::block_on, stream};
/// use pagestream::{message::StreamMessage, transport::Subscription};
///
/// block_on(async {
///     let raw = stream::iter(vec![Ok("{}".to_owned())]);
///     let mut subscription = Subscription::new("mem://chapter", raw);
///     let first = subscription.next().await;
///     assert!(matches!(first, Some(Ok(StreamMessage::Sentinel))));
///     assert!(subscription.is_closed());
/// });
/// ```
pub struct Subscription {
    url: String,
    events: Option<RawEvents>,
}

impl Subscription {
    /// Wrap a raw event stream for `url`.
    pub fn new<S>(url: impl Into<String>, events: S) -> Self
    where
        S: Stream<Item = Result<String, TransportError>> + Send + 'static,
    {
        Self {
            url: url.into(),
            events: Some(Box::pin(events)),
        }
    }

    /// A handle that was never opened. Polling it yields nothing.
    #[must_use]
    pub fn closed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            events: None,
        }
    }

    /// URL this subscription was opened for.
    #[must_use]
    pub fn url(&self) -> &str { &self.url }

    /// Close the subscription, releasing the underlying connection.
    ///
    /// Closing an already closed or never opened handle does nothing.
    pub fn close(&mut self) {
        if self.events.take().is_some() {
            tracing::debug!(url = %self.url, "subscription closed");
        }
    }

    /// Whether the subscription has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.events.is_none() }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("url", &self.url)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Stream for Subscription {
    type Item = Result<StreamMessage, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(events) = this.events.as_mut() else {
            return Poll::Ready(None);
        };

        let item = match events.as_mut().poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Some(Ok(raw))) => decode_message(&raw).map_err(StreamError::from),
            Poll::Ready(Some(Err(e))) => Err(StreamError::Transport(e)),
            Poll::Ready(None) => Err(StreamError::Transport(TransportError::Disconnected)),
        };

        if matches!(item, Ok(StreamMessage::Sentinel) | Err(_)) {
            this.close();
        }
        Poll::Ready(Some(item))
    }
}
