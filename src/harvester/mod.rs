//! Core harvester implementation split into focused submodules.
//!
//! The `Harvester` struct and its methods are organized by domain:
//! - [`crawl`] - Cursor-driven pagination of one feed
//! - [`session`] - Per-feed media queue, workers and resume ledger
//! - [`feed`] - One complete feed run
//! - [`run`] - Multi-feed runs with selection and per-feed error isolation
//! - [`participants`] - Feed membership snapshots
//! - [`past_media`] - Re-acquiring media of already stored items
//! - [`lifecycle`] - Cancellation and shutdown

mod crawl;
mod feed;
mod lifecycle;
mod participants;
mod past_media;
mod run;
mod session;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::rate_limit::RateLimiter;
use crate::transport::Transport;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Main harvester instance (cloneable - all shared state is Arc-wrapped)
#[derive(Clone)]
pub struct Harvester {
    /// Database instance for persistence
    /// Public for integration tests to inspect stored state
    pub db: Arc<Database>,
    /// Remote service adapter
    pub(crate) transport: Arc<dyn Transport>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// History and media pacing
    pub(crate) limiter: RateLimiter,
    /// Root cancellation token; every feed run works on a child of it
    pub(crate) cancel: CancellationToken,
}

impl Harvester {
    /// Create a new Harvester instance
    ///
    /// This validates the configuration, creates the download directory and
    /// opens/creates the SQLite database (running migrations).
    pub async fn new(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        if config.media.enabled {
            tokio::fs::create_dir_all(&config.media.download_dir)
                .await
                .map_err(|e| {
                    Error::Io(std::io::Error::new(
                        e.kind(),
                        format!(
                            "Failed to create download directory '{}': {}",
                            config.media.download_dir.display(),
                            e
                        ),
                    ))
                })?;
        }

        let db = Database::new(&config.persistence.database_path).await?;
        Ok(Self::with_database(config, Arc::new(db), transport))
    }

    /// Build a harvester around an already opened database
    pub fn with_database(config: Config, db: Arc<Database>, transport: Arc<dyn Transport>) -> Self {
        // Buffer of 1000 events so slow subscribers only lag, never block the crawl
        let (event_tx, _rx) = broadcast::channel(1000);
        let limiter = RateLimiter::new(config.crawl.history_interval, config.media.media_interval);

        tracing::info!(
            batch_size = config.crawl.batch_size,
            media_enabled = config.media.enabled,
            workers = config.media.workers,
            "Harvester initialized"
        );

        Self {
            db,
            transport,
            event_tx,
            config: Arc::new(config),
            limiter,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to harvest events
    ///
    /// Every subscriber receives every event emitted after it subscribed. A subscriber
    /// that falls more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Emit an event to all subscribers; dropped silently when nobody listens
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
