//! Resume ledger
//!
//! Media that was enqueued but not confirmed downloaded when a feed run ends is written
//! to `pending_downloads`, one snapshot per item. The next run for the feed reads and
//! deletes those rows in one transaction and puts the items at the front of its queue.
//!
//! Combined with the destination-exists check in the workers this gives at-least-once
//! media delivery: an item may be attempted twice after a crash, but a second successful
//! download of the same file never happens.

use crate::db::{Database, NewPendingDownload};
use crate::types::{FeedId, Item};
use crate::{Error, Result};
use std::collections::HashSet;

/// Durable record of unfinished media work
pub struct ResumeLedger;

impl ResumeLedger {
    /// Take every pending entry of a feed, oldest first
    ///
    /// Read and delete happen in one transaction. Entries whose snapshot can no longer be
    /// decoded are dropped with a warning.
    pub async fn restore(db: &Database, feed_id: FeedId) -> Result<Vec<Item>> {
        let mut tx = db.begin().await?;
        let rows = match tx.get_pending_downloads(feed_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(e);
            }
        };
        if rows.is_empty() {
            tx.rollback().await.ok();
            return Ok(Vec::new());
        }
        if let Err(e) = tx.clear_pending_downloads(feed_id).await {
            tx.rollback().await.ok();
            return Err(e);
        }
        tx.commit().await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            match row.item() {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(
                        feed_id = %feed_id,
                        item_id = %row.item_id,
                        error = %e,
                        "Dropping undecodable resume ledger entry"
                    );
                }
            }
        }

        tracing::info!(feed_id = %feed_id, count = items.len(), "Restored pending media downloads");
        Ok(items)
    }

    /// Write unfinished items for the next run
    ///
    /// An item listed more than once is stored once; the return value counts stored rows.
    ///
    /// # Errors
    /// Any failure is reported as [`Error::ResumeLedger`], which aborts a multi-feed run.
    pub async fn persist(db: &Database, feed_id: FeedId, items: &[Item]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let ledger_error = |e: Error| Error::ResumeLedger {
            feed_id,
            reason: e.to_string(),
        };

        let mut seen = HashSet::with_capacity(items.len());
        let entries = items
            .iter()
            .filter(|item| seen.insert(item.id))
            .map(|item| NewPendingDownload::from_item(feed_id, item))
            .collect::<Result<Vec<_>>>()
            .map_err(ledger_error)?;

        let mut tx = db.begin().await.map_err(ledger_error)?;
        let inserted = match tx.insert_pending_downloads(&entries).await {
            Ok(inserted) => inserted as usize,
            Err(e) => {
                tx.rollback().await.ok();
                return Err(ledger_error(e));
            }
        };
        tx.commit().await.map_err(ledger_error)?;

        tracing::info!(feed_id = %feed_id, count = inserted, "Saved pending media downloads");
        Ok(inserted)
    }
}
