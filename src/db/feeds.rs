//! Feed registration, cursor reads and status flags.

use crate::types::{FeedId, ItemId};
use crate::Result;
use sqlx::SqliteConnection;

use super::{Database, Feed, query_failed};

/// Insert the feed or refresh its name; an existing cursor is never lowered.
pub(super) async fn upsert_feed(
    conn: &mut SqliteConnection,
    feed_id: FeedId,
    name: &str,
    cursor: Option<ItemId>,
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO feeds (feed_id, name, max_item_id, is_active, is_complete, retrieved_at, updated_at)
        VALUES (?, ?, ?, 1, 0, ?, ?)
        ON CONFLICT(feed_id) DO UPDATE SET
            name = excluded.name,
            max_item_id = CASE
                WHEN excluded.max_item_id IS NULL THEN feeds.max_item_id
                WHEN feeds.max_item_id IS NULL OR excluded.max_item_id > feeds.max_item_id
                    THEN excluded.max_item_id
                ELSE feeds.max_item_id
            END,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(feed_id)
    .bind(name)
    .bind(cursor)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await
    .map_err(query_failed("Failed to upsert feed"))?;

    Ok(())
}

/// Move the high-water mark forward. Returns false when `cursor` is not above the stored value.
pub(super) async fn advance_cursor(
    conn: &mut SqliteConnection,
    feed_id: FeedId,
    cursor: ItemId,
) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        UPDATE feeds
        SET max_item_id = ?, is_complete = 0, updated_at = ?
        WHERE feed_id = ? AND (max_item_id IS NULL OR max_item_id < ?)
        "#,
    )
    .bind(cursor)
    .bind(now)
    .bind(feed_id)
    .bind(cursor)
    .execute(&mut *conn)
    .await
    .map_err(query_failed("Failed to advance cursor"))?;

    Ok(result.rows_affected() > 0)
}

impl Database {
    /// Get the stored cursor for a feed (None if the feed was never persisted)
    pub async fn get_cursor(&self, feed_id: FeedId) -> Result<Option<ItemId>> {
        let cursor: Option<Option<ItemId>> =
            sqlx::query_scalar("SELECT max_item_id FROM feeds WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed("Failed to get cursor"))?;

        Ok(cursor.flatten())
    }

    /// Get a feed by its external id
    pub async fn get_feed(&self, feed_id: FeedId) -> Result<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, feed_id, name, max_item_id, is_active, is_complete, retrieved_at, updated_at
            FROM feeds
            WHERE feed_id = ?
            "#,
        )
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed("Failed to get feed"))?;

        Ok(feed)
    }

    /// List all stored feeds ordered by external id
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT id, feed_id, name, max_item_id, is_active, is_complete, retrieved_at, updated_at
            FROM feeds
            ORDER BY feed_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list feeds"))?;

        Ok(feeds)
    }

    /// Set whether multi-feed runs should visit a feed, registering it if needed
    pub async fn set_feed_active(&self, feed_id: FeedId, name: &str, active: bool) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO feeds (feed_id, name, max_item_id, is_active, is_complete, retrieved_at, updated_at)
            VALUES (?, ?, NULL, ?, 0, ?, ?)
            ON CONFLICT(feed_id) DO UPDATE SET
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(feed_id)
        .bind(name)
        .bind(active)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to set feed active flag"))?;

        Ok(())
    }

    /// Record that a run reached the end of the feed
    ///
    /// The cursor is left untouched; a feed with no items yet is registered with an unset cursor.
    pub async fn mark_caught_up(&self, feed_id: FeedId, name: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO feeds (feed_id, name, max_item_id, is_active, is_complete, retrieved_at, updated_at)
            VALUES (?, ?, NULL, 1, 1, ?, ?)
            ON CONFLICT(feed_id) DO UPDATE SET
                is_complete = 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(feed_id)
        .bind(name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(query_failed("Failed to mark feed caught up"))?;

        Ok(())
    }
}
