//! Media consumer tasks.

use super::{MediaQueue, media_path, partial_path};
use crate::error::Error;
use crate::rate_limit::{OperationClass, RateLimiter};
use crate::transport::Transport;
use crate::types::{Event, FeedId, Item};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome counters shared by a feed's workers
#[derive(Debug, Default)]
pub struct MediaStats {
    downloaded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl MediaStats {
    /// Media written to disk
    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    /// Media already present
    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    /// Media downloads that failed
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Everything one media worker needs for a feed run
#[derive(Clone)]
pub struct MediaWorkerContext {
    /// Feed whose media is being fetched
    pub feed_id: FeedId,
    /// Destination directory of the feed
    pub dir: PathBuf,
    /// Remote service
    pub transport: Arc<dyn Transport>,
    /// Queue shared with the crawl
    pub queue: Arc<MediaQueue>,
    /// Media pacing
    pub limiter: RateLimiter,
    /// Fires when the feed run is cancelled
    pub cancel: CancellationToken,
    /// Event sink
    pub event_tx: broadcast::Sender<Event>,
    /// Shared counters
    pub stats: Arc<MediaStats>,
}

/// Consume the queue until cancelled
///
/// Per item: an existing destination file means done. A skip makes no remote call and,
/// unlike a download, is not followed by the media interval sleep.
/// Otherwise the blob is fetched into the `.part` path and renamed on success. A failure
/// or a cancellation mid-download removes the partial file and defers the item to the
/// resume ledger; nothing is retried within the run.
pub async fn run_media_worker(ctx: MediaWorkerContext, worker: usize) {
    tracing::debug!(feed_id = %ctx.feed_id, worker, "Media worker started");

    while let Some(item) = ctx.queue.pop(&ctx.cancel).await {
        if ctx.cancel.is_cancelled() {
            ctx.queue.defer(item).await;
            ctx.queue.task_done();
            break;
        }

        let dest = media_path(&ctx.dir, item.id);
        if already_downloaded(&dest).await {
            tracing::debug!(feed_id = %ctx.feed_id, item_id = %item.id, "Media already on disk, skipping");
            ctx.stats.skipped.fetch_add(1, Ordering::Relaxed);
            ctx.event_tx
                .send(Event::MediaSkipped {
                    feed_id: ctx.feed_id,
                    item_id: item.id,
                })
                .ok();
            ctx.queue.task_done();
            continue;
        }

        let started = Instant::now();
        download_one(&ctx, item, &dest).await;
        ctx.queue.task_done();

        ctx.limiter.pace(OperationClass::Media, started, &ctx.cancel).await;
    }

    tracing::debug!(feed_id = %ctx.feed_id, worker, "Media worker stopped");
}

async fn already_downloaded(dest: &Path) -> bool {
    tokio::fs::try_exists(dest).await.unwrap_or(false)
}

async fn download_one(ctx: &MediaWorkerContext, item: Item, dest: &Path) {
    let part = partial_path(&ctx.dir, item.id);
    let item_id = item.id;
    let progress = move |written: u64, total: Option<u64>| {
        tracing::trace!(item_id = %item_id, written, total, "Media download progress");
    };

    let fetched = tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => None,
        result = ctx.transport.fetch_media(ctx.feed_id, &item, &part, Some(&progress)) => Some(result),
    };

    let result = match fetched {
        None => {
            remove_partial(&part).await;
            tracing::info!(
                feed_id = %ctx.feed_id,
                item_id = %item.id,
                "Media download abandoned on cancellation"
            );
            ctx.queue.defer(item).await;
            return;
        }
        Some(Ok(bytes)) => tokio::fs::rename(&part, dest)
            .await
            .map(|()| bytes)
            .map_err(|e| Error::Media {
                feed_id: ctx.feed_id,
                item_id: item.id,
                path: dest.to_path_buf(),
                reason: format!("failed to move completed download into place: {}", e),
            }),
        Some(Err(e)) => Err(Error::Media {
            feed_id: ctx.feed_id,
            item_id: item.id,
            path: dest.to_path_buf(),
            reason: e.to_string(),
        }),
    };

    match result {
        Ok(bytes) => {
            tracing::info!(
                feed_id = %ctx.feed_id,
                item_id = %item.id,
                bytes,
                path = %dest.display(),
                "Media downloaded"
            );
            ctx.stats.downloaded.fetch_add(1, Ordering::Relaxed);
            ctx.event_tx
                .send(Event::MediaDownloaded {
                    feed_id: ctx.feed_id,
                    item_id: item.id,
                    path: dest.to_path_buf(),
                    bytes,
                })
                .ok();
        }
        Err(e) => {
            remove_partial(&part).await;
            tracing::warn!(
                feed_id = %ctx.feed_id,
                item_id = %item.id,
                error = %e,
                "Media download failed, leaving it for the next resume cycle"
            );
            ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
            ctx.event_tx
                .send(Event::MediaFailed {
                    feed_id: ctx.feed_id,
                    item_id: item.id,
                    error: e.to_string(),
                })
                .ok();
            ctx.queue.defer(item).await;
        }
    }
}

/// Delete a partial download; a missing file is fine
async fn remove_partial(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %part.display(), error = %e, "Failed to remove partial download");
        }
    }
}
