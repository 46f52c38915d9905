//! Single-slot stream controller with last-writer-wins supersession.
//!
//! [`StreamController`] owns at most one live subscription. Each
//! [`start`](StreamController::start) closes the previous subscription,
//! bumps the [`Generation`] and spawns a forwarding task that tags every
//! event with the generation it was started under. Events reach the caller
//! through [`next_event`](StreamController::next_event), which drops any
//! event whose generation is no longer current. Closing a subscription does
//! not retract events it already queued, so the generation check is what
//! guarantees a superseded stream never leaks into the new one.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    message::{Fragment, StreamMessage},
    metrics,
    transport::{StreamError, Subscription, Transport},
};

/// Default capacity of the internal event queue.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Monotonic identifier of one `start` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct Generation(u64);

impl Generation {
    /// Return the underlying counter value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    const fn next(self) -> Self { Self(self.0.wrapping_add(1)) }
}

/// Event republished from the live stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A validated page fragment.
    Fragment(Fragment),
    /// The sentinel arrived; the stream has been closed.
    Complete,
    /// The stream failed; it has been closed.
    Failed(StreamError),
}

impl StreamEvent {
    fn is_terminal(&self) -> bool { !matches!(self, Self::Fragment(_)) }
}

#[derive(Debug)]
struct Tagged {
    generation: Generation,
    event: StreamEvent,
}

/// The one live stream. Dropping it stops its forwarding task.
#[derive(Debug)]
struct LiveStream {
    generation: Generation,
    url: String,
    shutdown: CancellationToken,
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.shutdown.cancel();
        metrics::dec_live_streams();
    }
}

/// Owner of the single live page stream.
pub struct StreamController<T> {
    transport: T,
    live: Option<LiveStream>,
    generation: Generation,
    events_tx: mpsc::Sender<Tagged>,
    events_rx: mpsc::Receiver<Tagged>,
}

impl<T: Transport> StreamController<T> {
    /// Create an idle controller using `transport`.
    #[must_use]
    pub fn new(transport: T) -> Self { Self::with_capacity(transport, DEFAULT_EVENT_CAPACITY) }

    /// Create an idle controller whose event queue holds `capacity` events.
    ///
    /// A full queue applies back-pressure to the forwarding task, which stops
    /// reading from the transport until the caller catches up.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(transport: T, capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(capacity);
        Self {
            transport,
            live: None,
            generation: Generation::default(),
            events_tx,
            events_rx,
        }
    }

    /// Start streaming `url`, superseding any live stream.
    ///
    /// The previous stream is closed before the new one is opened. Returns
    /// the generation assigned to the new stream.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&mut self, url: impl Into<String>) -> Generation {
        let url = url.into();
        if let Some(previous) = self.live.take() {
            info!(
                generation = %previous.generation,
                url = %previous.url,
                "superseding live stream"
            );
            metrics::inc_superseded();
        }

        self.generation = self.generation.next();
        let generation = self.generation;
        let subscription = self.transport.open(&url);
        let shutdown = CancellationToken::new();
        tokio::spawn(forward(
            subscription,
            generation,
            self.events_tx.clone(),
            shutdown.clone(),
        ));
        debug!(%generation, %url, "stream started");
        metrics::inc_live_streams();

        self.live = Some(LiveStream {
            generation,
            url,
            shutdown,
        });
        generation
    }

    /// Cancel the live stream, if any.
    ///
    /// Returns `true` when a stream was cancelled. Calling it while idle is a
    /// no-op.
    pub fn cancel(&mut self) -> bool {
        let Some(live) = self.live.take() else {
            return false;
        };
        info!(generation = %live.generation, url = %live.url, "stream cancelled");
        true
    }

    /// Wait for the next event of the live stream.
    ///
    /// Returns `None` immediately when no stream is live. Terminal events
    /// ([`StreamEvent::Complete`] and [`StreamEvent::Failed`]) clear the live
    /// slot before they are returned. This method is cancel-safe.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            let current = self.live.as_ref()?.generation;
            let Tagged { generation, event } = self.events_rx.recv().await?;
            if generation != current {
                debug!(%generation, %current, "dropping event from superseded stream");
                metrics::inc_stale_dropped();
                continue;
            }

            if event.is_terminal() {
                let url = self.live.take().map(|live| live.url.clone());
                match &event {
                    StreamEvent::Failed(err) => {
                        warn!(
                            %generation,
                            url = ?url,
                            kind = err.kind(),
                            error = %err,
                            "stream failed"
                        );
                        metrics::inc_stream_errors(err.kind());
                    }
                    _ => debug!(%generation, url = ?url, "stream complete"),
                }
            } else {
                metrics::inc_fragments();
            }
            return Some(event);
        }
    }

    /// Whether a stream is currently live.
    #[must_use]
    pub fn is_streaming(&self) -> bool { self.live.is_some() }

    /// Generation of the most recent `start`, live or not.
    #[must_use]
    pub fn generation(&self) -> Generation { self.generation }

    /// URL of the live stream.
    #[must_use]
    pub fn current_url(&self) -> Option<&str> { self.live.as_ref().map(|l| l.url.as_str()) }
}

/// Forward one subscription's messages until it ends or is cancelled.
async fn forward(
    mut subscription: Subscription,
    generation: Generation,
    tx: mpsc::Sender<Tagged>,
    shutdown: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            biased;

            () = shutdown.cancelled() => break,
            item = subscription.next() => item,
        };

        let event = match item {
            Some(Ok(StreamMessage::Fragment(fragment))) => StreamEvent::Fragment(fragment),
            Some(Ok(StreamMessage::Sentinel)) => StreamEvent::Complete,
            Some(Err(err)) => StreamEvent::Failed(err),
            // Subscriptions report their own end; this only follows a terminal event.
            None => break,
        };
        let terminal = event.is_terminal();

        let sent = tokio::select! {
            biased;

            () = shutdown.cancelled() => false,
            res = tx.send(Tagged { generation, event }) => res.is_ok(),
        };
        if !sent || terminal {
            break;
        }
    }
    subscription.close();
}
