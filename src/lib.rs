#![doc(html_root_url = "https://docs.rs/pagestream/latest")]
//! Public API for the `pagestream` library.
//!
//! This crate turns a server-pushed, unordered stream of "page ready" events
//! into an ordered page collection, with cancellation and immediate
//! supersession when a newer chapter is requested.
//!
//! The pieces, leaf first:
//!
//! - [`transport`]: push subscriptions ([`Subscription`]) opened by a
//!   [`Transport`], including an event-stream transport over HTTP.
//! - [`controller`]: the [`StreamController`] owning at most one live stream.
//! - [`assembler`]: the [`Assembler`] placing pages by index.
//! - [`session`]: the [`PageSession`] wiring both together for an
//!   orchestrator.

pub mod assembler;
pub mod config;
pub mod controller;
pub mod message;
pub mod metrics;
pub mod session;
pub mod transport;

pub use assembler::{Applied, Assembler, AssemblyError, AssemblyState, Placement};
pub use config::{ConfigError, SessionConfig, SessionConfigBuilder};
pub use controller::{Generation, StreamController, StreamEvent};
pub use message::{Fragment, MalformedMessage, PageRef, StreamMessage, decode_message};
pub use session::{
    Command,
    Notification,
    Notifications,
    PageSession,
    PageSnapshot,
    SessionError,
    SessionHandle,
    SessionUpdate,
};
pub use transport::{
    ChannelListener,
    ChannelPeer,
    ChannelTransport,
    HttpConfig,
    HttpTransport,
    StreamError,
    Subscription,
    Transport,
    TransportError,
};
