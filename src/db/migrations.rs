//! Database lifecycle and schema migrations.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::SqliteConnection;
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use super::Database;

impl Database {
    /// Create a new database connection
    ///
    /// Creates the database file if it doesn't exist and runs migrations.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to create database directory: {}",
                    e
                )))
            })?;
        }

        // Foreign keys on, WAL so readers don't block the crawl transaction
        use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
        use std::str::FromStr;

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| {
                Error::Database(DatabaseError::ConnectionFailed(format!(
                    "Failed to parse database path: {}",
                    e
                )))
            })?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options).await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to connect to database: {}",
                e
            )))
        })?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            Error::Database(DatabaseError::ConnectionFailed(format!(
                "Failed to acquire connection: {}",
                e
            )))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create schema_version table: {}",
                e
            )))
        })?;

        let current_version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to query schema version: {}",
                        e
                    )))
                })?
                .flatten();

        let current_version = current_version.unwrap_or(0);

        if current_version < 1 {
            Self::migrate_v1(&mut conn).await?;
        }
        if current_version < 2 {
            Self::migrate_v2(&mut conn).await?;
        }

        Ok(())
    }

    async fn begin_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        tracing::info!(version, "Applying database migration");

        sqlx::query("BEGIN")
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to begin transaction: {}",
                    e
                )))
            })?;
        Ok(())
    }

    /// Commit the migration transaction, or roll it back if the step failed
    async fn finish_migration(
        conn: &mut SqliteConnection,
        version: i32,
        result: Result<()>,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                sqlx::query("COMMIT")
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| {
                        Error::Database(DatabaseError::MigrationFailed(format!(
                            "Failed to commit migration v{}: {}",
                            version, e
                        )))
                    })?;
                tracing::info!(version, "Database migration complete");
                Ok(())
            }
            Err(e) => {
                let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
                Err(e)
            }
        }
    }

    /// Migration v1: feeds, items, media descriptors and the resume ledger
    async fn migrate_v1(conn: &mut SqliteConnection) -> Result<()> {
        Self::begin_migration(conn, 1).await?;

        let result = async {
            Self::execute_ddl(
                conn,
                "feeds table",
                r#"
                CREATE TABLE feeds (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    feed_id INTEGER NOT NULL UNIQUE,
                    name TEXT NOT NULL,
                    max_item_id INTEGER,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    is_complete INTEGER NOT NULL DEFAULT 0,
                    retrieved_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            )
            .await?;

            Self::execute_ddl(
                conn,
                "items table",
                r#"
                CREATE TABLE items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    item_id INTEGER NOT NULL,
                    feed_id INTEGER NOT NULL REFERENCES feeds(feed_id),
                    data TEXT NOT NULL,
                    text TEXT,
                    sender_id INTEGER,
                    views INTEGER,
                    forwards INTEGER,
                    replies INTEGER,
                    forward_kind TEXT,
                    forward_from_id INTEGER,
                    forward TEXT,
                    posted_at INTEGER NOT NULL,
                    retrieved_at INTEGER NOT NULL,
                    UNIQUE(item_id, feed_id)
                )
                "#,
            )
            .await?;

            Self::execute_ddl(
                conn,
                "items index",
                "CREATE INDEX idx_items_feed_posted ON items(feed_id, posted_at)",
            )
            .await?;

            Self::execute_ddl(
                conn,
                "media table",
                r#"
                CREATE TABLE media (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    media_id INTEGER NOT NULL,
                    feed_id INTEGER NOT NULL,
                    item_id INTEGER NOT NULL,
                    kind TEXT NOT NULL,
                    size_bytes INTEGER,
                    mime_type TEXT,
                    dc_id INTEGER,
                    location TEXT,
                    hash TEXT,
                    retrieved_at INTEGER NOT NULL,
                    UNIQUE(feed_id, item_id),
                    FOREIGN KEY (item_id, feed_id) REFERENCES items(item_id, feed_id)
                )
                "#,
            )
            .await?;

            Self::execute_ddl(
                conn,
                "pending_downloads table",
                r#"
                CREATE TABLE pending_downloads (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    feed_id INTEGER NOT NULL,
                    item_id INTEGER NOT NULL,
                    snapshot TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    UNIQUE(feed_id, item_id)
                )
                "#,
            )
            .await?;

            Self::record_migration(conn, 1).await?;
            Ok::<(), Error>(())
        }
        .await;

        Self::finish_migration(conn, 1, result).await
    }

    /// Migration v2: feed participants
    async fn migrate_v2(conn: &mut SqliteConnection) -> Result<()> {
        Self::begin_migration(conn, 2).await?;

        let result = async {
            Self::execute_ddl(
                conn,
                "participants table",
                r#"
                CREATE TABLE participants (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL UNIQUE,
                    username TEXT,
                    first_name TEXT,
                    last_name TEXT,
                    is_bot INTEGER NOT NULL DEFAULT 0,
                    data TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )
                "#,
            )
            .await?;

            Self::execute_ddl(
                conn,
                "feed_participants table",
                r#"
                CREATE TABLE feed_participants (
                    feed_id INTEGER NOT NULL REFERENCES feeds(feed_id),
                    user_id INTEGER NOT NULL REFERENCES participants(user_id),
                    seen_at INTEGER NOT NULL,
                    PRIMARY KEY (feed_id, user_id)
                )
                "#,
            )
            .await?;

            Self::record_migration(conn, 2).await?;
            Ok::<(), Error>(())
        }
        .await;

        Self::finish_migration(conn, 2, result).await
    }

    async fn execute_ddl(conn: &mut SqliteConnection, what: &str, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&mut *conn).await.map_err(|e| {
            Error::Database(DatabaseError::MigrationFailed(format!(
                "Failed to create {}: {}",
                what, e
            )))
        })?;
        Ok(())
    }

    /// Record a migration as applied
    async fn record_migration(conn: &mut SqliteConnection, version: i32) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query("INSERT INTO schema_version (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::MigrationFailed(format!(
                    "Failed to record migration: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
