//! Atomic write units.
//!
//! A [`HarvestTransaction`] groups the writes that must become visible together:
//! one crawl batch (items, media descriptors, cursor), one resume ledger restore
//! (read and delete) or one ledger persist. Dropping it without [`commit`] rolls
//! everything back.
//!
//! [`commit`]: HarvestTransaction::commit

use crate::error::DatabaseError;
use crate::types::{FeedId, ItemId, Participant};
use crate::{Error, Result};
use sqlx::Sqlite;

use super::{
    Database, NewItem, NewMedia, NewPendingDownload, PendingDownload, feeds, items, media,
    participants, pending,
};

/// An open store transaction
pub struct HarvestTransaction {
    tx: sqlx::Transaction<'static, Sqlite>,
}

impl Database {
    /// Begin a transaction
    pub async fn begin(&self) -> Result<HarvestTransaction> {
        let tx = self.pool.begin().await.map_err(|e| {
            Error::Database(DatabaseError::TransactionFailed(format!(
                "Failed to begin transaction: {}",
                e
            )))
        })?;

        Ok(HarvestTransaction { tx })
    }
}

impl HarvestTransaction {
    /// Register the feed or refresh its name (cursor never lowered)
    pub async fn upsert_feed(
        &mut self,
        feed_id: FeedId,
        name: &str,
        cursor: Option<ItemId>,
    ) -> Result<()> {
        feeds::upsert_feed(&mut self.tx, feed_id, name, cursor).await
    }

    /// Raise the feed's high-water mark; returns false if `cursor` is not above it
    pub async fn advance_cursor(&mut self, feed_id: FeedId, cursor: ItemId) -> Result<bool> {
        feeds::advance_cursor(&mut self.tx, feed_id, cursor).await
    }

    /// Insert items, ignoring already stored `(item_id, feed_id)` pairs
    pub async fn insert_items(&mut self, batch: &[NewItem]) -> Result<u64> {
        items::insert_items(&mut self.tx, batch).await
    }

    /// Insert media descriptors, ignoring duplicates
    pub async fn insert_media(&mut self, batch: &[NewMedia]) -> Result<u64> {
        media::insert_media(&mut self.tx, batch).await
    }

    /// Write resume ledger entries
    pub async fn insert_pending_downloads(&mut self, batch: &[NewPendingDownload]) -> Result<u64> {
        pending::insert_pending_downloads(&mut self.tx, batch).await
    }

    /// Read the ledger entries of a feed (insertion order)
    pub async fn get_pending_downloads(&mut self, feed_id: FeedId) -> Result<Vec<PendingDownload>> {
        pending::get_pending_downloads(&mut self.tx, feed_id).await
    }

    /// Delete the ledger entries of a feed
    pub async fn clear_pending_downloads(&mut self, feed_id: FeedId) -> Result<u64> {
        pending::clear_pending_downloads(&mut self.tx, feed_id).await
    }

    /// Store participants and link them to a feed
    pub async fn upsert_participants(
        &mut self,
        feed_id: FeedId,
        batch: &[Participant],
    ) -> Result<u64> {
        participants::upsert_participants(&mut self.tx, batch).await?;
        let user_ids: Vec<i64> = batch.iter().map(|p| p.user_id).collect();
        participants::link_participants(&mut self.tx, feed_id, &user_ids).await
    }

    /// Make every write of this transaction durable
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            Error::Database(DatabaseError::TransactionFailed(format!(
                "Failed to commit transaction: {}",
                e
            )))
        })
    }

    /// Discard every write of this transaction
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(|e| {
            Error::Database(DatabaseError::TransactionFailed(format!(
                "Failed to roll back transaction: {}",
                e
            )))
        })
    }
}
