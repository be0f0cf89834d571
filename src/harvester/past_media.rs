//! Re-acquiring media of already stored items.

use super::Harvester;
use crate::error::{Error, Result};
use crate::media::{feed_dir, media_path};
use crate::types::{Event, FeedReport, RemoteFeed};

impl Harvester {
    /// Download every stored media item of a feed whose file is missing
    ///
    /// Items are rebuilt from their stored rows and go through the same queue, workers
    /// and resume ledger as a regular run. Items restored from the ledger are queued once. The crawl cursor is neither read nor moved.
    pub async fn download_past_media(&self, feed: &RemoteFeed) -> Result<FeedReport> {
        if self.cancel.is_cancelled() {
            return Err(Error::ShuttingDown);
        }
        if !self.config.media.enabled {
            return Err(Error::Config {
                message: "media downloads are disabled".to_string(),
                key: Some("media.enabled".to_string()),
            });
        }

        let cancel = self.cancel.child_token();
        self.emit_event(Event::FeedStarted {
            feed_id: feed.id,
            name: feed.name.clone(),
        });

        let dir = feed_dir(
            &self.config.media.download_dir,
            feed,
            self.config.media.folder_naming,
        );
        tokio::fs::create_dir_all(&dir).await?;

        let mut report = FeedReport {
            feed_id: feed.id,
            cursor: self.db.get_cursor(feed.id).await?,
            ..Default::default()
        };

        let session = self.start_media_session(feed.id, dir.clone(), &cancel).await?;
        report.restored = session.restored();

        let stored = match self.db.get_media_items(feed.id).await {
            Ok(items) => items,
            Err(e) => {
                session.finish(self, &mut report).await?;
                return Err(e);
            }
        };

        let mut missing = Vec::new();
        for item in stored {
            if session.is_restored(item.id) {
                continue;
            }
            let on_disk = tokio::fs::try_exists(media_path(&dir, item.id))
                .await
                .unwrap_or(false);
            if !on_disk {
                missing.push(item);
            }
        }
        let queued = session.enqueue(missing).await;
        tracing::info!(feed_id = %feed.id, queued, restored = report.restored, "Recovering past media");

        session.wait_idle(&cancel).await;
        session.finish(self, &mut report).await?;
        report.cancelled = cancel.is_cancelled();

        tracing::info!(
            feed_id = %feed.id,
            downloaded = report.media_downloaded,
            skipped = report.media_skipped,
            failed = report.media_failed,
            deferred = report.deferred,
            "Past media recovery finished"
        );
        Ok(report)
    }
}
