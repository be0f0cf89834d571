//! # feed-harvest
//!
//! Incremental, resumable harvester for remote message feeds.
//!
//! ## Design Philosophy
//!
//! feed-harvest is designed to be:
//! - **Resumable** - A per-feed cursor moves only together with the items that justify it
//! - **Rate-aware** - History fetches and media downloads are paced independently
//! - **Loss-free on interruption** - Unfinished media is saved and retried on the next run
//! - **Transport-agnostic** - The core talks to a narrow [`Transport`] trait
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use feed_harvest::{Config, Harvester, HttpTransport};
//! use feed_harvest::config::HttpTransportConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let http = HttpTransportConfig {
//!         base_url: "http://127.0.0.1:8080/api/".to_string(),
//!         api_token: None,
//!         timeout: Duration::from_secs(60),
//!     };
//!     let transport = Arc::new(HttpTransport::new(&http)?);
//!     let harvester = Harvester::new(Config::default(), transport).await?;
//!
//!     // Subscribe to events
//!     let mut events = harvester.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = harvester.harvest_all().await?;
//!     println!("{} feeds harvested", report.feeds.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Per-feed high-water mark
pub mod cursor;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Core harvester implementation (decomposed into focused submodules)
pub mod harvester;
/// Durable record of unfinished media work
pub mod ledger;
/// Media queue, workers and on-disk layout
pub mod media;
/// Inter-operation pacing
pub mod rate_limit;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote service abstraction and the bundled HTTP adapter
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use cursor::CursorTracker;
pub use db::Database;
pub use error::{DatabaseError, Error, Result, TransportError};
pub use harvester::Harvester;
pub use ledger::ResumeLedger;
pub use media::MediaQueue;
pub use rate_limit::{OperationClass, RateLimiter};
pub use transport::{HttpTransport, Transport};
pub use types::{
    Event, FeedId, FeedReport, ForwardOrigin, Item, ItemId, MediaAttachment, MediaKind,
    Participant, RemoteFeed, RunReport,
};

/// Helper function to run a multi-feed harvest with graceful signal handling.
///
/// Runs [`Harvester::harvest_all`] until it finishes or a termination signal arrives.
/// On a signal the harvester is cancelled and the run is awaited, so the current feed
/// still saves its resume ledger before this returns.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use feed_harvest::{Config, Harvester, HttpTransport, run_until_signal};
/// use feed_harvest::config::HttpTransportConfig;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_json_file("harvest.json".as_ref())?;
///     let http: HttpTransportConfig = config.http.clone().ok_or("missing http section")?;
///     let harvester = Harvester::new(config, Arc::new(HttpTransport::new(&http)?)).await?;
///
///     let report = run_until_signal(&harvester).await?;
///     harvester.shutdown().await;
///     println!("{} feeds harvested, {} failed", report.feeds.len(), report.failed.len());
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(harvester: &Harvester) -> Result<RunReport> {
    let run = harvester.harvest_all();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        _ = wait_for_signal() => {
            harvester.cancel();
            run.await
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
