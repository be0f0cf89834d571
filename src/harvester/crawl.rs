//! Cursor-driven pagination of one feed.

use super::Harvester;
use super::session::MediaSession;
use crate::cursor::CursorTracker;
use crate::db::{NewItem, NewMedia};
use crate::error::{Error, Result};
use crate::rate_limit::OperationClass;
use crate::retry::with_retry;
use crate::transport::Transport;
use crate::types::{Event, FeedReport, Item, ItemId, RemoteFeed};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// How a crawl ended when it did not fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum CrawlOutcome {
    /// An empty batch came back: nothing newer exists
    CaughtUp,
    /// Cancellation stopped the loop before the next fetch
    Cancelled,
}

impl Harvester {
    /// Fetch, persist and enqueue batches until the feed is caught up
    ///
    /// Each batch is committed in one transaction together with the raised cursor.
    /// Media items are handed to `media` only after that commit.
    pub(super) async fn crawl(
        &self,
        feed: &RemoteFeed,
        cursor: &mut CursorTracker,
        media: Option<&MediaSession>,
        cancel: &CancellationToken,
        report: &mut FeedReport,
    ) -> Result<CrawlOutcome> {
        let transport: &dyn Transport = self.transport.as_ref();
        let batch_size = self.config.crawl.batch_size;

        loop {
            if cancel.is_cancelled() {
                return Ok(CrawlOutcome::Cancelled);
            }

            let started = Instant::now();
            let min_id = cursor.get();
            let feed_id = feed.id;
            let batch = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(CrawlOutcome::Cancelled),
                result = with_retry(&self.config.retry, cancel, move || {
                    transport.fetch_items(feed_id, batch_size, min_id)
                }) => result?,
            };

            // Adapters must already filter by min_id; a misbehaving one must not
            // make the crawl re-store old items or loop forever
            let batch: Vec<Item> = batch
                .into_iter()
                .filter(|item| cursor.is_new(item.id))
                .collect();

            if batch.is_empty() {
                self.db.mark_caught_up(feed.id, &feed.name).await?;
                tracing::info!(
                    feed_id = %feed.id,
                    fetched = report.fetched,
                    cursor = ?cursor.get(),
                    "Feed caught up"
                );
                self.emit_event(Event::FeedCaughtUp {
                    feed_id: feed.id,
                    fetched: report.fetched,
                });
                return Ok(CrawlOutcome::CaughtUp);
            }

            // Every item is above the cursor here, so the batch always raises it
            let Some(new_cursor) = cursor.candidate(batch.iter().map(|item| item.id)) else {
                return Ok(CrawlOutcome::CaughtUp);
            };

            self.persist_batch(feed, cursor, &batch, new_cursor).await?;
            cursor.committed(new_cursor);

            let count = batch.len();
            let media_count = match media {
                Some(session) => {
                    session
                        .enqueue(batch.into_iter().filter(Item::has_media))
                        .await
                }
                None => 0,
            };

            report.fetched += count as u64;
            report.batches += 1;
            report.cursor = Some(new_cursor);

            tracing::info!(
                feed_id = %feed.id,
                count,
                media = media_count,
                cursor = %new_cursor,
                "Batch persisted"
            );
            self.emit_event(Event::BatchPersisted {
                feed_id: feed.id,
                count,
                media: media_count,
                cursor: new_cursor,
            });

            if !self
                .limiter
                .pace(OperationClass::History, started, cancel)
                .await
            {
                return Ok(CrawlOutcome::Cancelled);
            }
        }
    }

    /// Store one batch and its cursor atomically; nothing is visible on failure
    async fn persist_batch(
        &self,
        feed: &RemoteFeed,
        cursor: &CursorTracker,
        batch: &[Item],
        new_cursor: ItemId,
    ) -> Result<()> {
        let items = batch
            .iter()
            .map(|item| NewItem::from_item(feed.id, item))
            .collect::<Result<Vec<_>>>()?;
        let media: Vec<NewMedia> = batch
            .iter()
            .filter_map(|item| NewMedia::from_item(feed.id, item))
            .collect();

        let mut tx = self.db.begin().await?;
        let written = async {
            // Registers a first-seen feed with an unset cursor in the batch transaction
            tx.upsert_feed(feed.id, &feed.name, cursor.get()).await?;
            let inserted = tx.insert_items(&items).await?;
            tx.insert_media(&media).await?;
            cursor.advance(&mut tx, new_cursor).await?;
            Ok::<u64, Error>(inserted)
        }
        .await;

        match written {
            Ok(inserted) => {
                tx.commit().await?;
                tracing::debug!(
                    feed_id = %feed.id,
                    inserted,
                    ignored = (items.len() as u64).saturating_sub(inserted),
                    "Batch committed"
                );
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(feed_id = %feed.id, error = %rollback_err, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
