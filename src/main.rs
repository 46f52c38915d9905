//! Demo orchestrator for `pagestream`.
//!
//! Streams the chapter named on the command line, logs each page as it
//! lands and prints the ordered page list once the stream completes.

mod cli;

use std::process::ExitCode;

use clap::Parser;
use pagestream::{
    HttpConfig,
    HttpTransport,
    Notification,
    PageSession,
    SessionConfig,
    SessionHandle,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // Applications embedding the library should install their own subscriber.
    tracing_subscriber::fmt::init();

    let cli = cli::Cli::parse();
    let mut builder = SessionConfig::builder();
    if let Some(base) = &cli.media_base {
        builder = builder.media_base(base.clone());
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let transport = HttpTransport::new(HttpConfig::default().connect_timeout(cli.connect_timeout));
    let session = PageSession::new(transport, &config);
    let pages = session.subscribe_pages();
    let (handle, commands) = SessionHandle::channel(4);
    let (notify_tx, mut notifications) = session.notification_channel(config.event_capacity());
    let shutdown = CancellationToken::new();
    let actor = tokio::spawn(session.run(commands, notify_tx, shutdown.clone()));

    let Ok(generation) = handle.start(cli.url.clone()).await else {
        eprintln!("session stopped before the stream started");
        return ExitCode::FAILURE;
    };
    tracing::debug!(%generation, url = %cli.url, "chapter requested");

    let status = loop {
        let notification = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted; cancelling stream");
                break ExitCode::FAILURE;
            }
            update = notifications.recv() => update.map(|u| u.notification),
        };
        match notification {
            Some(Notification::Page { index, total, page }) => {
                tracing::info!(index, total, %page, "page ready");
            }
            Some(Notification::Rejected(err)) => tracing::warn!(%err, "page rejected"),
            Some(Notification::Complete { filled, total }) => {
                tracing::info!(filled, total, "chapter complete");
                break ExitCode::SUCCESS;
            }
            Some(Notification::Error(err)) => {
                eprintln!("stream failed: {err}");
                break ExitCode::FAILURE;
            }
            None => break ExitCode::FAILURE,
        }
    };

    shutdown.cancel();
    if let Err(e) = actor.await {
        tracing::error!(error = %e, "session task failed");
    }

    for (index, page) in pages.borrow().pages.iter().enumerate() {
        match page {
            Some(page) => println!("{index:>4} {page}"),
            None => println!("{index:>4} <missing>"),
        }
    }
    status
}
