//! Feed members.

use crate::types::{FeedId, Participant};
use crate::Result;
use sqlx::SqliteConnection;

use super::{Database, ParticipantRow, query_failed};

// 7 bind variables per participant
const MAX_PARTICIPANTS_PER_INSERT: usize = 142;

/// Insert or refresh participants by user id
pub(super) async fn upsert_participants(
    conn: &mut SqliteConnection,
    participants: &[Participant],
) -> Result<()> {
    if participants.is_empty() {
        return Ok(());
    }

    let now = chrono::Utc::now().timestamp();

    for chunk in participants.chunks(MAX_PARTICIPANTS_PER_INSERT) {
        let mut query_builder = sqlx::QueryBuilder::new(
            "INSERT INTO participants (user_id, username, first_name, last_name, is_bot, data, updated_at) ",
        );

        query_builder.push_values(chunk, |mut b, p| {
            b.push_bind(p.user_id)
                .push_bind(&p.username)
                .push_bind(&p.first_name)
                .push_bind(&p.last_name)
                .push_bind(p.is_bot)
                .push_bind(p.raw.to_string())
                .push_bind(now);
        });
        query_builder.push(
            " ON CONFLICT(user_id) DO UPDATE SET \
             username = excluded.username, \
             first_name = excluded.first_name, \
             last_name = excluded.last_name, \
             is_bot = excluded.is_bot, \
             data = excluded.data, \
             updated_at = excluded.updated_at",
        );

        query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(query_failed("Failed to upsert participants"))?;
    }

    Ok(())
}

/// Link participants to a feed; existing links are kept
pub(super) async fn link_participants(
    conn: &mut SqliteConnection,
    feed_id: FeedId,
    user_ids: &[i64],
) -> Result<u64> {
    if user_ids.is_empty() {
        return Ok(0);
    }

    let now = chrono::Utc::now().timestamp();
    let mut linked = 0;

    for chunk in user_ids.chunks(MAX_PARTICIPANTS_PER_INSERT) {
        let mut query_builder =
            sqlx::QueryBuilder::new("INSERT INTO feed_participants (feed_id, user_id, seen_at) ");

        query_builder.push_values(chunk, |mut b, user_id| {
            b.push_bind(feed_id).push_bind(*user_id).push_bind(now);
        });
        query_builder.push(" ON CONFLICT(feed_id, user_id) DO NOTHING");

        let result = query_builder
            .build()
            .execute(&mut *conn)
            .await
            .map_err(query_failed("Failed to link participants"))?;
        linked += result.rows_affected();
    }

    Ok(linked)
}

impl Database {
    /// List the participants linked to a feed, ordered by user id
    pub async fn list_participants(&self, feed_id: FeedId) -> Result<Vec<ParticipantRow>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT p.id, p.user_id, p.username, p.first_name, p.last_name, p.is_bot, p.data, p.updated_at
            FROM participants p
            JOIN feed_participants fp ON fp.user_id = p.user_id
            WHERE fp.feed_id = ?
            ORDER BY p.user_id ASC
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed("Failed to list participants"))?;

        Ok(rows)
    }
}
