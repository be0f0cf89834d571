//! Resume ledger rows: media enqueued but not confirmed downloaded.

use crate::types::FeedId;
use crate::Result;
use sqlx::SqliteConnection;

use super::{Database, NewPendingDownload, PendingDownload, query_failed};

// 4 bind variables per entry
const MAX_PENDING_PER_INSERT: usize = 249;

/// Insert ledger entries; an entry already recorded for the same item is kept as is
pub(super) async fn insert_pending_downloads(
    conn: &mut SqliteConnection,
    entries: &[NewPendingDownload],
) -> Result<u64> {
    if entries.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;

    for chunk in entries.chunks(MAX_PENDING_PER_INSERT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO pending_downloads (feed_id, item_id, snapshot, created_at) ",
        );

        query_builder.push_values(chunk, |mut b, entry| {
            b.push_bind(entry.feed_id)
                .push_bind(entry.item_id)
                .push_bind(&entry.snapshot)
                .push_bind(now);
        });
        query_builder.push(" ON CONFLICT(feed_id, item_id) DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(query_failed("Failed to insert pending downloads"))?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

pub(super) async fn get_pending_downloads(
    conn: &mut SqliteConnection,
    feed_id: FeedId,
) -> Result<Vec<PendingDownload>> {
    let rows = sqlx::query_as::<_, PendingDownload>(
        r#"
        SELECT id, feed_id, item_id, snapshot, created_at
        FROM pending_downloads
        WHERE feed_id = ?
        ORDER BY id ASC
        "#,
    )
    .bind(feed_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(query_failed("Failed to get pending downloads"))?;

    Ok(rows)
}

pub(super) async fn clear_pending_downloads(
    conn: &mut SqliteConnection,
    feed_id: FeedId,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM pending_downloads WHERE feed_id = ?")
        .bind(feed_id)
        .execute(&mut *conn)
        .await
        .map_err(query_failed("Failed to clear pending downloads"))?;

    Ok(result.rows_affected())
}

impl Database {
    /// Get the ledger entries of a feed in the order they were written
    pub async fn get_pending_downloads(&self, feed_id: FeedId) -> Result<Vec<PendingDownload>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(query_failed("Failed to acquire connection"))?;
        get_pending_downloads(&mut conn, feed_id).await
    }

    /// Delete every ledger entry of a feed
    pub async fn clear_pending_downloads(&self, feed_id: FeedId) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(query_failed("Failed to acquire connection"))?;
        clear_pending_downloads(&mut conn, feed_id).await
    }

    /// Insert ledger entries outside a transaction
    pub async fn insert_pending_downloads(&self, entries: &[NewPendingDownload]) -> Result<u64> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(query_failed("Failed to acquire connection"))?;
        insert_pending_downloads(&mut conn, entries).await
    }

    /// Count ledger entries of a feed
    pub async fn count_pending_downloads(&self, feed_id: FeedId) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_downloads WHERE feed_id = ?")
                .bind(feed_id)
                .fetch_one(&self.pool)
                .await
                .map_err(query_failed("Failed to count pending downloads"))?;

        Ok(count)
    }
}
