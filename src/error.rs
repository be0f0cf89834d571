//! Error types for feed-harvest
//!
//! This module provides the error taxonomy used throughout the crate:
//! - [`Error`] - crate-wide error with contextual variants
//! - [`DatabaseError`] - persistence failures
//! - [`TransportError`] - the transient/permanent split every transport adapter maps onto
//!
//! Errors raised while harvesting one feed are caught at the per-feed boundary.
//! Only resume-ledger failures are fatal to a multi-feed run (see [`Error::is_fatal`]).

use crate::types::{FeedId, ItemId};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for feed-harvest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for feed-harvest
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Remote transport failure, already classified
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A media download could not be completed
    #[error("media download failed for item {item_id} of feed {feed_id}: {reason}")]
    Media {
        /// Feed owning the item
        feed_id: FeedId,
        /// Item whose media failed
        item_id: ItemId,
        /// Destination that was being written
        path: PathBuf,
        /// Why the download failed
        reason: String,
    },

    /// The resume ledger could not be written; in-flight work would be lost
    #[error("failed to persist resume ledger for feed {feed_id}: {reason}")]
    ResumeLedger {
        /// Feed whose pending downloads could not be saved
        feed_id: FeedId,
        /// Underlying failure
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The harvester was cancelled before the operation could start
    #[error("shutdown in progress: not starting new work")]
    ShuttingDown,

    /// Feed not found (locally or remotely)
    #[error("feed not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started, committed or rolled back
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Constraint violation beyond the expected ignore-on-conflict inserts
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Transport failures, classified by the adapter that produced them.
///
/// The core never inspects adapter-specific error types; it only asks whether a
/// failure is worth retrying later.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Rate limiting, timeouts, temporary unavailability
    #[error("transient transport failure: {message}")]
    Transient {
        /// What went wrong
        message: String,
        /// Server-suggested wait before trying again
        retry_after: Option<Duration>,
    },

    /// The entity is gone or access was revoked; retrying will not help
    #[error("permanent transport failure: {message}")]
    Permanent {
        /// What went wrong
        message: String,
    },
}

impl TransportError {
    /// Build a transient error without a retry hint
    pub fn transient(message: impl Into<String>) -> Self {
        TransportError::Transient {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Build a permanent error
    pub fn permanent(message: impl Into<String>) -> Self {
        TransportError::Permanent {
            message: message.into(),
        }
    }

    /// Whether the failure may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Transient { .. })
    }
}

impl Error {
    /// Whether the error must abort a multi-feed run instead of being skipped.
    ///
    /// Losing the resume snapshot loses track of in-flight downloads, so ledger
    /// failures surface to the operator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ResumeLedger { .. } | Error::Config { .. })
    }

    /// Whether the error is a permanent transport failure (feed gone, access revoked)
    pub fn is_permanent_transport(&self) -> bool {
        matches!(self, Error::Transport(TransportError::Permanent { .. }))
    }

    /// Machine-readable error code, used in events and reports
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Transport(TransportError::Transient { .. }) => "transport_transient",
            Error::Transport(TransportError::Permanent { .. }) => "transport_permanent",
            Error::Media { .. } => "media_error",
            Error::ResumeLedger { .. } => "resume_ledger_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ShuttingDown => "shutting_down",
            Error::NotFound(_) => "not_found",
            Error::Other(_) => "internal_error",
        }
    }
}
