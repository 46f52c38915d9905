//! Chapter reading session: the boundary towards the request orchestrator.
//!
//! [`PageSession`] pairs a [`StreamController`] with an [`Assembler`]. Every
//! controller event is applied to the assembler and turned into a
//! [`Notification`]; the ordered page collection is also published as a
//! [`PageSnapshot`] on a `watch` channel for renderers.
//!
//! The session can be driven directly (`start`, `cancel`,
//! `next_notification`) or run as an actor that takes [`Command`]s from
//! cloneable [`SessionHandle`]s. In actor mode pending commands are always
//! handled before further stream events, so a newer chapter request wins
//! over whatever the previous stream still has in flight. Every update the
//! actor sends carries the [`Generation`] it belongs to, and [`Notifications`]
//! discards updates of streams that have since been superseded or cancelled,
//! including ones already queued when the newer request was accepted.

use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    assembler::{Assembler, AssemblyError, AssemblyState, Placement},
    config::SessionConfig,
    controller::{Generation, StreamController, StreamEvent},
    message::{Fragment, PageRef},
    transport::{StreamError, Transport},
};

/// Notification delivered to the orchestrator.
#[derive(Debug)]
pub enum Notification {
    /// A page landed in its slot.
    Page {
        /// Slot the page was written to.
        index: usize,
        /// Length of the page collection.
        total: usize,
        /// Resolved page locator.
        page: PageRef,
    },
    /// The stream finished normally.
    Complete {
        /// Slots holding a page.
        filled: usize,
        /// Length of the page collection.
        total: usize,
    },
    /// The stream failed and has been closed.
    Error(StreamError),
    /// A fragment was rejected; the stream continues.
    Rejected(AssemblyError),
}

/// Notification tagged with the stream it came from.
#[derive(Debug)]
pub struct SessionUpdate {
    /// Generation of the stream that produced the notification.
    pub generation: Generation,
    /// The notification itself.
    pub notification: Notification,
}

/// State published to page observers after every change.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    /// Generation of the stream that produced the pages.
    pub generation: Generation,
    /// Assembly lifecycle state.
    pub state: AssemblyState,
    /// Ordered page slots.
    pub pages: Vec<Option<PageRef>>,
}

/// Request sent to a running session.
#[derive(Debug)]
pub enum Command {
    /// Stream the given URL, superseding the current stream.
    Start {
        /// URL to stream.
        url: String,
        /// Receives the generation assigned to the new stream.
        reply: oneshot::Sender<Generation>,
    },
    /// Stop the current stream.
    Cancel {
        /// Signalled once the stream has been cancelled.
        reply: oneshot::Sender<()>,
    },
}

/// Errors returned by [`SessionHandle`].
#[derive(Clone, Copy, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    /// The session actor has stopped.
    #[error("page session stopped")]
    Closed,
}

/// Cloneable handle issuing commands to a running [`PageSession`].
#[derive(Clone, Debug)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Create a handle and the command receiver for [`PageSession::run`].
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Ask the session to stream `url` and wait until it has taken over.
    ///
    /// Once this returns, [`Notifications`] yields nothing from earlier
    /// streams.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has stopped.
    pub async fn start(&self, url: impl Into<String>) -> Result<Generation, SessionError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Start {
            url: url.into(),
            reply,
        })
        .await?;
        done.await.map_err(|_| SessionError::Closed)
    }

    /// Ask the session to cancel its stream and wait until it has.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] if the session has stopped.
    pub async fn cancel(&self) -> Result<(), SessionError> {
        let (reply, done) = oneshot::channel();
        self.send(Command::Cancel { reply }).await?;
        done.await.map_err(|_| SessionError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), SessionError> {
        self.tx.send(command).await.map_err(|_| SessionError::Closed)
    }
}

/// Receiving end of a session's updates.
///
/// Updates whose generation is no longer the accepted one are dropped, so
/// after [`SessionHandle::start`] returns only the new stream is observed.
#[derive(Debug)]
pub struct Notifications {
    rx: mpsc::Receiver<SessionUpdate>,
    accepted: watch::Receiver<Option<Generation>>,
}

impl Notifications {
    /// Wait for the next update of the accepted stream.
    ///
    /// Returns `None` once the session has stopped. Cancel-safe.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        loop {
            let update = self.rx.recv().await?;
            if *self.accepted.borrow() == Some(update.generation) {
                return Some(update);
            }
            debug!(generation = %update.generation, "dropping superseded notification");
        }
    }
}

/// Controller and assembler driven as one unit.
pub struct PageSession<T> {
    controller: StreamController<T>,
    assembler: Assembler,
    media_base: Option<String>,
    pages_tx: watch::Sender<PageSnapshot>,
    accepted: watch::Sender<Option<Generation>>,
}

impl<T: Transport> PageSession<T> {
    /// Create an idle session.
    #[must_use]
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        let (pages_tx, _) = watch::channel(PageSnapshot::default());
        let (accepted, _) = watch::channel(None);
        Self {
            controller: StreamController::with_capacity(transport, config.event_capacity()),
            assembler: Assembler::new(config.max_pages()),
            media_base: config.media_base().map(str::to_owned),
            pages_tx,
            accepted,
        }
    }

    /// Stream `url`, superseding the current stream.
    ///
    /// The current pages remain visible until the new stream's first page
    /// arrives, which starts a fresh collection.
    pub fn start(&mut self, url: impl Into<String>) -> Generation {
        let generation = self.controller.start(url);
        self.assembler.rearm();
        self.accepted.send_replace(Some(generation));
        generation
    }

    /// Cancel the current stream. Returns `false` if none was live.
    pub fn cancel(&mut self) -> bool {
        self.accepted.send_replace(None);
        self.controller.cancel()
    }

    /// Create the update channel for [`run`](Self::run).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn notification_channel(
        &self,
        capacity: usize,
    ) -> (mpsc::Sender<SessionUpdate>, Notifications) {
        let (tx, rx) = mpsc::channel(capacity);
        let notifications = Notifications {
            rx,
            accepted: self.accepted.subscribe(),
        };
        (tx, notifications)
    }

    /// Wait for the next notification of the live stream.
    ///
    /// Returns `None` when no stream is live. Cancel-safe.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        let event = self.controller.next_event().await?;
        let notification = match event {
            StreamEvent::Fragment(fragment) => self.apply(fragment),
            StreamEvent::Complete => {
                self.assembler.complete();
                Notification::Complete {
                    filled: self.assembler.filled(),
                    total: self.assembler.len().unwrap_or(0),
                }
            }
            StreamEvent::Failed(err) => Notification::Error(err),
        };
        self.publish();
        Some(notification)
    }

    fn apply(&mut self, fragment: Fragment) -> Notification {
        let fragment = match self.media_base.as_deref() {
            Some(base) => fragment.map_payload(|page| page.resolve_against(base)),
            None => fragment,
        };
        let page = fragment.payload.clone();
        match self.assembler.apply_fragment(fragment) {
            Ok(Placement { index, total, .. }) => Notification::Page { index, total, page },
            Err(err) => Notification::Rejected(err),
        }
    }

    fn publish(&self) {
        self.pages_tx.send_replace(PageSnapshot {
            generation: self.controller.generation(),
            state: self.assembler.state(),
            pages: self.assembler.pages().to_vec(),
        });
    }

    /// Observe the ordered page collection.
    #[must_use]
    pub fn subscribe_pages(&self) -> watch::Receiver<PageSnapshot> { self.pages_tx.subscribe() }

    /// Borrow the assembler.
    #[must_use]
    pub fn assembler(&self) -> &Assembler { &self.assembler }

    /// Whether a stream is live.
    #[must_use]
    pub fn is_streaming(&self) -> bool { self.controller.is_streaming() }

    /// Run the session as an actor.
    ///
    /// Commands come from [`SessionHandle`]s and tagged updates go to
    /// `notifications`, created by
    /// [`notification_channel`](Self::notification_channel). The loop stops
    /// when `shutdown` fires, when the update receiver is dropped, or once
    /// every handle is gone and no stream is live. The live stream is
    /// cancelled on exit; updates already queued stay readable.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        notifications: mpsc::Sender<SessionUpdate>,
        shutdown: CancellationToken,
    ) {
        let mut commands_open = true;
        loop {
            if !commands_open && !self.is_streaming() {
                debug!("all session handles dropped");
                break;
            }

            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                command = commands.recv(), if commands_open => match command {
                    Some(Command::Start { url, reply }) => {
                        let _ = reply.send(self.start(url));
                    }
                    Some(Command::Cancel { reply }) => {
                        self.cancel();
                        let _ = reply.send(());
                    }
                    None => commands_open = false,
                },

                notification = self.next_notification(), if self.is_streaming() => {
                    let Some(notification) = notification else { continue };
                    let update = SessionUpdate {
                        generation: self.controller.generation(),
                        notification,
                    };
                    if notifications.send(update).await.is_err() {
                        debug!("notification receiver dropped");
                        break;
                    }
                }
            }
        }
        self.controller.cancel();
    }
}
