//! Item inserts and reads.

use crate::types::{FeedId, Item, ItemId};
use crate::Result;
use sqlx::SqliteConnection;

use super::{Database, NewItem, StoredItem, query_failed};

// SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999.
// Each item uses 13 bind variables, so max 76 items per INSERT.
const MAX_ITEMS_PER_INSERT: usize = 76;

/// Insert items, ignoring rows whose `(item_id, feed_id)` already exists.
///
/// Returns the number of rows actually inserted.
pub(super) async fn insert_items(conn: &mut SqliteConnection, items: &[NewItem]) -> Result<u64> {
    if items.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;

    for chunk in items.chunks(MAX_ITEMS_PER_INSERT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO items (item_id, feed_id, data, text, sender_id, views, forwards, replies, \
             forward_kind, forward_from_id, forward, posted_at, retrieved_at) ",
        );

        query_builder.push_values(chunk, |mut b, item| {
            b.push_bind(item.item_id)
                .push_bind(item.feed_id)
                .push_bind(&item.data)
                .push_bind(&item.text)
                .push_bind(item.sender_id)
                .push_bind(item.views)
                .push_bind(item.forwards)
                .push_bind(item.replies)
                .push_bind(item.forward_kind)
                .push_bind(item.forward_from_id)
                .push_bind(&item.forward)
                .push_bind(item.posted_at)
                .push_bind(now);
        });
        query_builder.push(" ON CONFLICT(item_id, feed_id) DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(query_failed("Failed to insert items batch"))?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

impl Database {
    /// Count stored items for a feed
    pub async fn count_items(&self, feed_id: FeedId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("Failed to count items"))?;

        Ok(count)
    }

    /// Get a stored item by its natural key
    pub async fn get_item(&self, feed_id: FeedId, item_id: ItemId) -> Result<Option<StoredItem>> {
        let item = sqlx::query_as::<_, StoredItem>(
            r#"
            SELECT id, item_id, feed_id, data, text, sender_id, views, forwards, replies,
                   forward_kind, forward_from_id, forward, posted_at, retrieved_at
            FROM items
            WHERE feed_id = ? AND item_id = ?
            "#,
        )
        .bind(feed_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get item"))?;

        Ok(item)
    }

    /// Get all stored items for a feed in ascending id order
    pub async fn get_items(&self, feed_id: FeedId) -> Result<Vec<StoredItem>> {
        let items = sqlx::query_as::<_, StoredItem>(
            r#"
            SELECT id, item_id, feed_id, data, text, sender_id, views, forwards, replies,
                   forward_kind, forward_from_id, forward, posted_at, retrieved_at
            FROM items
            WHERE feed_id = ?
            ORDER BY item_id ASC
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to get items"))?;

        Ok(items)
    }

    /// Rebuild every media-bearing item of a feed from its stored row and descriptor
    pub async fn get_media_items(&self, feed_id: FeedId) -> Result<Vec<Item>> {
        let media = self.list_media(feed_id).await?;
        let mut items = Vec::with_capacity(media.len());

        for row in media {
            match self.get_item(feed_id, row.item_id).await? {
                Some(stored) => items.push(stored.into_item(Some(row))?),
                None => {
                    tracing::warn!(
                        feed_id = %feed_id,
                        item_id = %row.item_id,
                        "media descriptor without item row"
                    );
                }
            }
        }

        Ok(items)
    }
}

