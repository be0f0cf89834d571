//! One complete feed run.

use super::Harvester;
use super::crawl::CrawlOutcome;
use crate::cursor::CursorTracker;
use crate::error::{Error, Result};
use crate::media::feed_dir;
use crate::types::{Event, FeedReport, RemoteFeed};

impl Harvester {
    /// Harvest one feed until it is caught up or the harvester is cancelled
    ///
    /// Order of work:
    /// 1. Load the cursor
    /// 2. Restore the resume ledger into the media queue and start the workers
    /// 3. Crawl new batches, enqueueing media after each commit
    /// 4. Once caught up, wait for the media queue to run dry
    /// 5. Stop the workers and save anything unfinished to the resume ledger
    ///
    /// Step 5 runs whatever happened in steps 3 and 4, so a failed or cancelled crawl
    /// never loses queued media. With media disabled, steps 2, 4 and 5 are skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] if the harvester was already cancelled
    /// - [`Error::ResumeLedger`] if unfinished media could not be saved (fatal)
    /// - the crawl's transport or database error otherwise
    pub async fn harvest_feed(&self, feed: &RemoteFeed) -> Result<FeedReport> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let cancel = self.cancel.child_token();
        tracing::info!(feed_id = %feed.id, name = %feed.name, "Harvesting feed");
        self.emit_event(Event::FeedStarted {
            feed_id: feed.id,
            name: feed.name.clone(),
        });

        let mut cursor = CursorTracker::load(&self.db, feed.id).await?;
        let mut report = FeedReport {
            feed_id: feed.id,
            cursor: cursor.get(),
            ..Default::default()
        };

        let session = if self.config.media.enabled {
            let dir = feed_dir(
                &self.config.media.download_dir,
                feed,
                self.config.media.folder_naming,
            );
            tokio::fs::create_dir_all(&dir).await?;
            Some(self.start_media_session(feed.id, dir, &cancel).await?)
        } else {
            None
        };
        report.restored = session.as_ref().map_or(0, |s| s.restored());

        let outcome = self
            .crawl(feed, &mut cursor, session.as_ref(), &cancel, &mut report)
            .await;

        if let Some(session) = session {
            if matches!(outcome, Ok(CrawlOutcome::CaughtUp)) {
                session.wait_idle(&cancel).await;
            }
            session.finish(self, &mut report).await?;
        }

        let outcome = outcome?;
        report.cancelled = outcome == CrawlOutcome::Cancelled || cancel.is_cancelled();

        tracing::info!(
            feed_id = %feed.id,
            fetched = report.fetched,
            batches = report.batches,
            media_downloaded = report.media_downloaded,
            media_failed = report.media_failed,
            deferred = report.deferred,
            cancelled = report.cancelled,
            "Feed run finished"
        );
        Ok(report)
    }
}
