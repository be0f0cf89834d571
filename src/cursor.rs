//! Per-feed high-water mark
//!
//! [`CursorTracker`] holds the largest item id known to be durably stored for one feed.
//! Advancing it writes through the open batch transaction, so the stored cursor and the
//! items that justify it become visible together. The in-memory value is only moved
//! once that transaction has committed.

use crate::db::{Database, HarvestTransaction};
use crate::types::{FeedId, ItemId};
use crate::Result;

/// Cursor state for one feed run
#[derive(Debug, Clone)]
pub struct CursorTracker {
    feed_id: FeedId,
    cursor: Option<ItemId>,
}

impl CursorTracker {
    /// Load the stored cursor (None on a feed's first run)
    pub async fn load(db: &Database, feed_id: FeedId) -> Result<Self> {
        let cursor = db.get_cursor(feed_id).await?;
        Ok(Self { feed_id, cursor })
    }

    /// Feed this cursor belongs to
    pub fn feed_id(&self) -> FeedId {
        self.feed_id
    }

    /// Current high-water mark
    pub fn get(&self) -> Option<ItemId> {
        self.cursor
    }

    /// Whether an item id is strictly above the high-water mark
    pub fn is_new(&self, item_id: ItemId) -> bool {
        self.cursor.is_none_or(|cursor| item_id > cursor)
    }

    /// The cursor a batch would move to, or None if the batch does not raise it
    pub fn candidate<I>(&self, ids: I) -> Option<ItemId>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let max = ids.into_iter().max()?;
        self.is_new(max).then_some(max)
    }

    /// Write `new_cursor` inside the batch transaction
    ///
    /// A value that does not exceed the stored one is ignored by the store.
    pub async fn advance(&self, tx: &mut HarvestTransaction, new_cursor: ItemId) -> Result<bool> {
        tx.advance_cursor(self.feed_id, new_cursor).await
    }

    /// Adopt `new_cursor` after its transaction committed; lower values are ignored
    pub fn committed(&mut self, new_cursor: ItemId) {
        if self.is_new(new_cursor) {
            self.cursor = Some(new_cursor);
        }
    }
}
