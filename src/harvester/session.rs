//! Per-feed media pipeline: queue, workers and the resume ledger around them.

use super::Harvester;
use crate::error::Result;
use crate::ledger::ResumeLedger;
use crate::media::{MediaQueue, MediaStats, MediaWorkerContext, run_media_worker};
use crate::types::{Event, FeedId, FeedReport, Item, ItemId};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Media workers running for one feed
pub(super) struct MediaSession {
    feed_id: FeedId,
    queue: Arc<MediaQueue>,
    stats: Arc<MediaStats>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
    restored: HashSet<ItemId>,
}

impl Harvester {
    /// Restore the feed's resume ledger into a fresh queue and start the workers
    ///
    /// Restored items are queued before anything the crawl discovers.
    pub(super) async fn start_media_session(
        &self,
        feed_id: FeedId,
        dir: PathBuf,
        feed_cancel: &CancellationToken,
    ) -> Result<MediaSession> {
        let queue = Arc::new(MediaQueue::new());
        let pending = ResumeLedger::restore(&self.db, feed_id).await?;
        let restored: HashSet<ItemId> = pending.iter().map(|item| item.id).collect();
        let count = queue.extend(pending).await;
        if count > 0 {
            self.emit_event(Event::ResumeRestored { feed_id, count });
        }

        let stats = Arc::new(MediaStats::default());
        let cancel = feed_cancel.child_token();
        let ctx = MediaWorkerContext {
            feed_id,
            dir,
            transport: self.transport.clone(),
            queue: queue.clone(),
            limiter: self.limiter,
            cancel: cancel.clone(),
            event_tx: self.event_tx.clone(),
            stats: stats.clone(),
        };

        let workers = (0..self.config.media.workers)
            .map(|worker| tokio::spawn(run_media_worker(ctx.clone(), worker)))
            .collect();

        Ok(MediaSession {
            feed_id,
            queue,
            stats,
            cancel,
            workers,
            restored,
        })
    }
}

impl MediaSession {
    /// Items re-enqueued from the resume ledger
    pub(super) fn restored(&self) -> usize {
        self.restored.len()
    }

    /// Whether an item is already queued from the resume ledger
    pub(super) fn is_restored(&self, item_id: ItemId) -> bool {
        self.restored.contains(&item_id)
    }

    /// Hand media-bearing items to the workers
    pub(super) async fn enqueue<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = Item>,
    {
        self.queue.extend(items).await
    }

    /// Wait until every queued item was handled or the run is cancelled
    pub(super) async fn wait_idle(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = self.queue.join() => {}
            _ = cancel.cancelled() => {}
        }
    }

    /// Stop the workers and save whatever is left to the resume ledger
    ///
    /// In-flight downloads are abandoned. A ledger write failure is returned as a fatal
    /// [`crate::Error::ResumeLedger`].
    pub(super) async fn finish(self, harvester: &Harvester, report: &mut FeedReport) -> Result<()> {
        self.cancel.cancel();
        for result in futures::future::join_all(self.workers).await {
            if let Err(e) = result {
                tracing::error!(feed_id = %self.feed_id, error = %e, "Media worker panicked");
            }
        }

        let leftover = self.queue.drain().await;
        let saved = ResumeLedger::persist(&harvester.db, self.feed_id, &leftover).await?;
        if saved > 0 {
            harvester.emit_event(Event::ResumeSaved {
                feed_id: self.feed_id,
                count: saved,
            });
        }

        report.deferred = saved;
        report.media_downloaded = self.stats.downloaded();
        report.media_skipped = self.stats.skipped();
        report.media_failed = self.stats.failed();
        Ok(())
    }
}
