//! Database layer for feed-harvest
//!
//! Handles SQLite persistence for feeds, items, media metadata, the resume ledger
//! and participants.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`feeds`] - Feed registration, cursor reads and flags
//! - [`items`] - Idempotent item inserts and reads
//! - [`media`] - Media descriptor inserts and reads
//! - [`pending`] - Resume ledger rows
//! - [`participants`] - Feed members
//! - [`transaction`] - [`HarvestTransaction`], the unit of atomic writes

use crate::error::{DatabaseError, Error, Result};
use crate::types::{FeedId, ForwardOrigin, Item, ItemId, MediaAttachment, MediaKind};
use chrono::{TimeZone, Utc};
use sqlx::{FromRow, sqlite::SqlitePool};

mod feeds;
mod items;
mod media;
mod migrations;
mod participants;
mod pending;
mod transaction;

pub use transaction::HarvestTransaction;

/// Feed record from database
#[derive(Debug, Clone, FromRow)]
pub struct Feed {
    /// Unique database ID
    pub id: i64,
    /// Stable external identifier
    pub feed_id: FeedId,
    /// Display title
    pub name: String,
    /// High-water mark: largest item id durably persisted (None until the first batch)
    pub max_item_id: Option<ItemId>,
    /// Whether multi-feed runs should visit this feed
    pub is_active: bool,
    /// Whether the last run reached the end of the feed
    pub is_complete: bool,
    /// Unix timestamp when the feed was first stored
    pub retrieved_at: i64,
    /// Unix timestamp of the last change
    pub updated_at: i64,
}

/// New item to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewItem {
    /// Remote item id
    pub item_id: ItemId,
    /// Owning feed
    pub feed_id: FeedId,
    /// Raw remote payload (JSON)
    pub data: String,
    /// Text body
    pub text: Option<String>,
    /// Author reference
    pub sender_id: Option<i64>,
    /// View counter
    pub views: Option<i64>,
    /// Forward counter
    pub forwards: Option<i64>,
    /// Reply counter
    pub replies: Option<i64>,
    /// Forward origin tag ("user", "feed", "hidden")
    pub forward_kind: Option<&'static str>,
    /// Referenced origin id
    pub forward_from_id: Option<i64>,
    /// Serialized forward origin
    pub forward: Option<String>,
    /// Unix timestamp when the item was posted
    pub posted_at: i64,
}

impl NewItem {
    /// Build the row for an item harvested from `feed_id`
    pub fn from_item(feed_id: FeedId, item: &Item) -> Result<Self> {
        let forward = item
            .forward
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        Ok(Self {
            item_id: item.id,
            feed_id,
            data: item.raw.to_string(),
            text: item.text.clone(),
            sender_id: item.sender_id,
            views: item.views,
            forwards: item.forwards,
            replies: item.replies,
            forward_kind: item.forward.as_ref().map(ForwardOrigin::kind),
            forward_from_id: item.forward.as_ref().and_then(ForwardOrigin::reference_id),
            forward,
            posted_at: item.posted_at.timestamp(),
        })
    }
}

/// Item record from database
#[derive(Debug, Clone, FromRow)]
pub struct StoredItem {
    /// Unique database ID
    pub id: i64,
    /// Remote item id
    pub item_id: ItemId,
    /// Owning feed
    pub feed_id: FeedId,
    /// Raw remote payload (JSON)
    pub data: String,
    /// Text body
    pub text: Option<String>,
    /// Author reference
    pub sender_id: Option<i64>,
    /// View counter
    pub views: Option<i64>,
    /// Forward counter
    pub forwards: Option<i64>,
    /// Reply counter
    pub replies: Option<i64>,
    /// Forward origin tag
    pub forward_kind: Option<String>,
    /// Referenced origin id
    pub forward_from_id: Option<i64>,
    /// Serialized forward origin
    pub forward: Option<String>,
    /// Unix timestamp when the item was posted
    pub posted_at: i64,
    /// Unix timestamp when the item was stored
    pub retrieved_at: i64,
}

impl StoredItem {
    /// Rebuild the harvested item, attaching its media descriptor if any
    pub fn into_item(self, media: Option<MediaRow>) -> Result<Item> {
        let forward = self
            .forward
            .as_deref()
            .map(serde_json::from_str::<ForwardOrigin>)
            .transpose()?;
        let raw = serde_json::from_str(&self.data)?;

        Ok(Item {
            id: self.item_id,
            posted_at: Utc
                .timestamp_opt(self.posted_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            text: self.text,
            sender_id: self.sender_id,
            views: self.views,
            forwards: self.forwards,
            replies: self.replies,
            forward,
            media: media.map(MediaRow::into_attachment),
            raw,
        })
    }
}

/// New media descriptor to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewMedia {
    /// Remote media id
    pub media_id: i64,
    /// Owning feed
    pub feed_id: FeedId,
    /// Owning item
    pub item_id: ItemId,
    /// Media kind tag
    pub kind: MediaKind,
    /// Size in bytes
    pub size_bytes: Option<i64>,
    /// MIME type
    pub mime_type: Option<String>,
    /// Remote datacenter hint
    pub dc_id: Option<i32>,
    /// Remote location hint
    pub location: Option<String>,
    /// Remote content hash
    pub hash: Option<String>,
}

impl NewMedia {
    /// Build the descriptor row for a media-bearing item, `None` otherwise
    pub fn from_item(feed_id: FeedId, item: &Item) -> Option<Self> {
        let media = item.media.as_ref()?;
        Some(Self {
            media_id: media.media_id,
            feed_id,
            item_id: item.id,
            kind: media.kind,
            size_bytes: media.size,
            mime_type: media.mime_type.clone(),
            dc_id: media.dc_id,
            location: media.location.clone(),
            hash: media.hash.clone(),
        })
    }
}

/// Media descriptor record from database
#[derive(Debug, Clone, FromRow)]
pub struct MediaRow {
    /// Unique database ID
    pub id: i64,
    /// Remote media id
    pub media_id: i64,
    /// Owning feed
    pub feed_id: FeedId,
    /// Owning item
    pub item_id: ItemId,
    /// Media kind tag
    pub kind: String,
    /// Size in bytes
    pub size_bytes: Option<i64>,
    /// MIME type
    pub mime_type: Option<String>,
    /// Remote datacenter hint
    pub dc_id: Option<i32>,
    /// Remote location hint
    pub location: Option<String>,
    /// Remote content hash
    pub hash: Option<String>,
    /// Unix timestamp when the descriptor was stored
    pub retrieved_at: i64,
}

impl MediaRow {
    /// Convert back into the attachment carried by an [`Item`]
    pub fn into_attachment(self) -> MediaAttachment {
        MediaAttachment {
            media_id: self.media_id,
            kind: MediaKind::parse(&self.kind),
            size: self.size_bytes,
            mime_type: self.mime_type,
            dc_id: self.dc_id,
            location: self.location,
            hash: self.hash,
        }
    }
}

/// New resume ledger entry
#[derive(Debug, Clone)]
pub struct NewPendingDownload {
    /// Owning feed
    pub feed_id: FeedId,
    /// Item whose media is still outstanding
    pub item_id: ItemId,
    /// Serialized [`Item`] snapshot, enough to re-issue the download
    pub snapshot: String,
}

impl NewPendingDownload {
    /// Snapshot an item for the ledger
    pub fn from_item(feed_id: FeedId, item: &Item) -> Result<Self> {
        Ok(Self {
            feed_id,
            item_id: item.id,
            snapshot: serde_json::to_string(item)?,
        })
    }
}

/// Resume ledger record from database
#[derive(Debug, Clone, FromRow)]
pub struct PendingDownload {
    /// Unique database ID (insertion order)
    pub id: i64,
    /// Owning feed
    pub feed_id: FeedId,
    /// Item whose media is still outstanding
    pub item_id: ItemId,
    /// Serialized [`Item`] snapshot
    pub snapshot: String,
    /// Unix timestamp when the entry was written
    pub created_at: i64,
}

impl PendingDownload {
    /// Decode the item snapshot
    pub fn item(&self) -> Result<Item> {
        Ok(serde_json::from_str(&self.snapshot)?)
    }
}

/// Participant record from database
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantRow {
    /// Unique database ID
    pub id: i64,
    /// Remote user id
    pub user_id: i64,
    /// Public handle
    pub username: Option<String>,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Whether the account is automated
    pub is_bot: bool,
    /// Raw remote payload (JSON)
    pub data: String,
    /// Unix timestamp of the last refresh
    pub updated_at: i64,
}

/// Map a failed query onto [`DatabaseError::QueryFailed`] with context
pub(crate) fn query_failed(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(DatabaseError::QueryFailed(format!("{}: {}", context, e)))
}

/// Database handle for feed-harvest
pub struct Database {
    pool: SqlitePool,
}
