//! Multi-feed runs.

use super::Harvester;
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::transport::Transport;
use crate::types::{Event, FeedId, RemoteFeed, RunReport};

impl Harvester {
    /// List the remote feeds that pass the configured selection
    pub async fn selected_feeds(&self) -> Result<Vec<RemoteFeed>> {
        let transport: &dyn Transport = self.transport.as_ref();
        let feeds = with_retry(&self.config.retry, &self.cancel, move || transport.list_feeds()).await?;
        let total = feeds.len();

        let selected: Vec<RemoteFeed> = feeds
            .into_iter()
            .filter(|feed| self.config.selection.allows(feed.id))
            .collect();

        tracing::info!(total, selected = selected.len(), "Listed remote feeds");
        Ok(selected)
    }

    /// Harvest every selected feed, one after the other
    ///
    /// Feeds stored as inactive are skipped. A permanent transport failure marks the
    /// feed inactive; any other per-feed error is recorded and the run moves on.
    /// Cancellation stops the run after the current feed has saved its resume ledger.
    ///
    /// # Errors
    ///
    /// Only fatal errors ([`Error::is_fatal`]) and a failed feed listing abort the run.
    pub async fn harvest_all(&self) -> Result<RunReport> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let feeds = self.selected_feeds().await?;
        let mut report = RunReport::default();

        for feed in feeds {
            if self.cancel.is_cancelled() {
                tracing::info!("Run cancelled, not starting further feeds");
                break;
            }

            match self.db.get_feed(feed.id).await {
                Ok(Some(stored)) if !stored.is_active => {
                    self.record_skip(&mut report, feed.id, "feed is marked inactive".to_string());
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    self.record_failure(&mut report, feed.id, &e);
                    continue;
                }
            }

            match self.harvest_feed(&feed).await {
                Ok(feed_report) => {
                    let cancelled = feed_report.cancelled;
                    report.feeds.push(feed_report);
                    if cancelled {
                        break;
                    }
                }
                Err(Error::ShuttingDown) => break,
                Err(e) if e.is_fatal() => {
                    tracing::error!(feed_id = %feed.id, error = %e, "Fatal error, aborting run");
                    return Err(e);
                }
                Err(e) if e.is_permanent_transport() => {
                    if let Err(db_err) = self.db.set_feed_active(feed.id, &feed.name, false).await {
                        tracing::warn!(feed_id = %feed.id, error = %db_err, "Failed to mark feed inactive");
                    }
                    self.record_skip(&mut report, feed.id, e.to_string());
                }
                Err(e) => self.record_failure(&mut report, feed.id, &e),
            }
        }

        tracing::info!(
            harvested = report.feeds.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Run finished"
        );
        Ok(report)
    }

    fn record_skip(&self, report: &mut RunReport, feed_id: FeedId, reason: String) {
        tracing::info!(feed_id = %feed_id, reason = %reason, "Skipping feed");
        self.emit_event(Event::FeedSkipped {
            feed_id,
            reason: reason.clone(),
        });
        report.skipped.push((feed_id, reason));
    }

    fn record_failure(&self, report: &mut RunReport, feed_id: FeedId, error: &Error) {
        tracing::warn!(feed_id = %feed_id, error = %error, "Feed failed, continuing with the next one");
        self.emit_event(Event::FeedFailed {
            feed_id,
            code: error.error_code().to_string(),
            error: error.to_string(),
        });
        report.failed.push((feed_id, error.to_string()));
    }
}
