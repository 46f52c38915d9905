//! In-memory transport driven from the other end of a channel.
//!
//! Each [`Subscription`] opened by a [`ChannelTransport`] is paired with a
//! [`ChannelPeer`] delivered through the [`ChannelListener`]. The peer plays
//! the server: it pushes raw payloads, the sentinel, or a failure, and can
//! observe when the subscription side has been closed. Embedders use it to
//! bridge foreign event sources; tests use it to script streams.

use futures::stream;
use tokio::sync::mpsc;

use super::{Subscription, Transport, TransportError};

type Event = Result<String, TransportError>;

/// Transport whose subscriptions are fed by [`ChannelPeer`]s.
#[derive(Clone, Debug)]
pub struct ChannelTransport {
    peers: mpsc::UnboundedSender<ChannelPeer>,
}

/// Receives a [`ChannelPeer`] for every subscription opened.
#[derive(Debug)]
pub struct ChannelListener {
    peers: mpsc::UnboundedReceiver<ChannelPeer>,
}

/// Server side of one in-memory subscription.
#[derive(Debug)]
pub struct ChannelPeer {
    url: String,
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelTransport {
    /// Create a transport and the listener receiving its peers.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagestream::transport::{ChannelTransport, Transport};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let (transport, mut listener) = ChannelTransport::new();
    /// let subscription = transport.open("mem://chapter/1");
    /// let peer = listener.accept().await.expect("peer");
    /// assert_eq!(peer.url(), subscription.url());
    /// # }
    /// ```
    #[must_use]
    pub fn new() -> (Self, ChannelListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { peers: tx }, ChannelListener { peers: rx })
    }
}

impl Transport for ChannelTransport {
    fn open(&self, url: &str) -> Subscription {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = ChannelPeer {
            url: url.to_owned(),
            tx,
        };
        if self.peers.send(peer).is_err() {
            tracing::debug!(url, "channel listener dropped; subscription will disconnect");
        }
        Subscription::new(url, stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}

impl ChannelListener {
    /// Wait for the next opened subscription's peer.
    ///
    /// Returns `None` once every [`ChannelTransport`] clone has been dropped.
    pub async fn accept(&mut self) -> Option<ChannelPeer> { self.peers.recv().await }

    /// Take an already opened peer without waiting.
    pub fn try_accept(&mut self) -> Option<ChannelPeer> { self.peers.try_recv().ok() }
}

impl ChannelPeer {
    /// URL the subscription was opened for.
    #[must_use]
    pub fn url(&self) -> &str { &self.url }

    /// Push a raw event payload.
    ///
    /// Returns `false` if the subscription has been closed.
    pub fn send_raw(&self, payload: impl Into<String>) -> bool {
        self.tx.send(Ok(payload.into())).is_ok()
    }

    /// Push one page in the server's JSON shape.
    pub fn send_page(&self, idx: i64, total: i64, pic_path: &str) -> bool {
        let payload = serde_json::json!({ "idx": idx, "total": total, "pic_path": pic_path });
        self.send_raw(payload.to_string())
    }

    /// Push the end-of-stream sentinel.
    pub fn finish(&self) -> bool { self.send_raw("{}") }

    /// Report a remote failure to the subscription.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.tx.send(Err(TransportError::Remote(reason.into()))).is_ok()
    }

    /// Whether the subscription side has been closed or dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }

    /// Wait until the subscription side is closed.
    pub async fn closed(&self) { self.tx.closed().await; }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::{message::StreamMessage, transport::StreamError};

    #[tokio::test]
    async fn peer_feeds_subscription() {
        let (transport, mut listener) = ChannelTransport::new();
        let mut sub = transport.open("mem://a");
        let peer = listener.accept().await.expect("peer");

        assert!(peer.send_page(0, 1, "p0"));
        assert!(peer.finish());

        assert!(matches!(sub.next().await, Some(Ok(StreamMessage::Fragment(_)))));
        assert!(matches!(sub.next().await, Some(Ok(StreamMessage::Sentinel))));
        assert!(peer.is_closed(), "sentinel closes the subscription");
    }

    #[tokio::test]
    async fn closing_subscription_is_visible_to_peer() {
        let (transport, mut listener) = ChannelTransport::new();
        let mut sub = transport.open("mem://a");
        let peer = listener.accept().await.expect("peer");

        assert!(!peer.is_closed());
        sub.close();
        peer.closed().await;
        assert!(!peer.send_page(0, 1, "late"));
    }

    #[tokio::test]
    async fn dropped_peer_disconnects() {
        let (transport, mut listener) = ChannelTransport::new();
        let mut sub = transport.open("mem://a");
        drop(listener.accept().await);

        assert!(matches!(
            sub.next().await,
            Some(Err(StreamError::Transport(TransportError::Disconnected)))
        ));
    }
}
