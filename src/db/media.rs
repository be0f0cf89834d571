//! Media descriptor inserts and reads.

use crate::types::FeedId;
use crate::Result;
use sqlx::SqliteConnection;

use super::{Database, MediaRow, NewMedia, query_failed};

// 10 bind variables per descriptor
const MAX_MEDIA_PER_INSERT: usize = 99;

/// Insert media descriptors, ignoring items that already carry one
pub(super) async fn insert_media(conn: &mut SqliteConnection, media: &[NewMedia]) -> Result<u64> {
    if media.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut inserted = 0;

    for chunk in media.chunks(MAX_MEDIA_PER_INSERT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO media (media_id, feed_id, item_id, kind, size_bytes, mime_type, dc_id, \
             location, hash, retrieved_at) ",
        );

        query_builder.push_values(chunk, |mut b, m| {
            b.push_bind(m.media_id)
                .push_bind(m.feed_id)
                .push_bind(m.item_id)
                .push_bind(m.kind.as_str())
                .push_bind(m.size_bytes)
                .push_bind(&m.mime_type)
                .push_bind(m.dc_id)
                .push_bind(&m.location)
                .push_bind(&m.hash)
                .push_bind(now);
        });
        query_builder.push(" ON CONFLICT(feed_id, item_id) DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(query_failed("Failed to insert media batch"))?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

impl Database {
    /// List media descriptors of a feed in ascending item order
    pub async fn list_media(&self, feed_id: FeedId) -> Result<Vec<MediaRow>> {
        let rows = sqlx::query_as::<_, MediaRow>(
            r#"
            SELECT id, media_id, feed_id, item_id, kind, size_bytes, mime_type, dc_id,
                   location, hash, retrieved_at
            FROM media
            WHERE feed_id = ?
            ORDER BY item_id ASC
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list media"))?;

        Ok(rows)
    }

    /// Count media descriptors of a feed
    pub async fn count_media(&self, feed_id: FeedId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed("Failed to count media"))?;

        Ok(count)
    }
}
