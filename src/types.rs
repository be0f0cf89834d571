//! Core types for feed-harvest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Implements the conversions and sqlx glue shared by the integer id newtypes.
macro_rules! integer_id {
    ($name:ident) => {
        impl $name {
            /// Get the inner i64 value
            pub fn get(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl PartialEq<i64> for $name {
            fn eq(&self, other: &i64) -> bool {
                self.0 == *other
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <i64 as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
                sqlx::Encode::<sqlx::Sqlite>::encode_by_ref(&self.0, buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let id = <i64 as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self(id))
            }
        }
    };
}

/// Stable external identifier of a feed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(pub i64);

integer_id!(FeedId);

/// Remote-assigned item identifier, increasing within a feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub i64);

integer_id!(ItemId);

/// A feed as announced by the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFeed {
    /// Stable external identifier
    pub id: FeedId,
    /// Display title
    pub name: String,
}

/// Kind of media attached to an item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Photo or other still image
    Image,
    /// Video clip, round video or animation
    Video,
    /// Voice note or audio file
    Audio,
    /// Generic document
    Document,
    /// Anything else that still carries a downloadable blob
    Other,
}

impl MediaKind {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
            MediaKind::Other => "other",
        }
    }

    /// Parse the database representation, falling back to [`MediaKind::Other`]
    pub fn parse(value: &str) -> Self {
        match value {
            "image" => MediaKind::Image,
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            "document" => MediaKind::Document,
            _ => MediaKind::Other,
        }
    }
}

/// Metadata about the media attached to an item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Remote media identifier
    pub media_id: i64,
    /// Closed media classification
    pub kind: MediaKind,
    /// Size in bytes, when announced
    #[serde(default)]
    pub size: Option<i64>,
    /// MIME type, when announced
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Remote datacenter hint (opaque)
    #[serde(default)]
    pub dc_id: Option<i32>,
    /// Remote location hint (opaque)
    #[serde(default)]
    pub location: Option<String>,
    /// Remote content hash (opaque)
    #[serde(default)]
    pub hash: Option<String>,
}

/// Where a forwarded item originally came from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwardOrigin {
    /// Forwarded from a user account
    User {
        /// Original author
        user_id: i64,
    },
    /// Forwarded from another feed
    Feed {
        /// Source feed
        feed_id: FeedId,
        /// Source item, when disclosed
        #[serde(default)]
        item_id: Option<ItemId>,
    },
    /// Author hid their identity; only a display name is known
    Hidden {
        /// Display name shown by the remote
        name: String,
    },
}

impl ForwardOrigin {
    /// Short tag stored alongside the item
    pub fn kind(&self) -> &'static str {
        match self {
            ForwardOrigin::User { .. } => "user",
            ForwardOrigin::Feed { .. } => "feed",
            ForwardOrigin::Hidden { .. } => "hidden",
        }
    }

    /// Referenced entity id, if the origin discloses one
    pub fn reference_id(&self) -> Option<i64> {
        match self {
            ForwardOrigin::User { user_id } => Some(*user_id),
            ForwardOrigin::Feed { feed_id, .. } => Some(feed_id.0),
            ForwardOrigin::Hidden { .. } => None,
        }
    }
}

/// One harvested item as produced by a transport adapter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Remote id, increasing within the feed
    pub id: ItemId,
    /// When the item was posted
    pub posted_at: DateTime<Utc>,
    /// Text body
    #[serde(default)]
    pub text: Option<String>,
    /// Author reference
    #[serde(default)]
    pub sender_id: Option<i64>,
    /// View counter
    #[serde(default)]
    pub views: Option<i64>,
    /// Forward counter
    #[serde(default)]
    pub forwards: Option<i64>,
    /// Reply counter
    #[serde(default)]
    pub replies: Option<i64>,
    /// Forward origin, if the item is a forward
    #[serde(default)]
    pub forward: Option<ForwardOrigin>,
    /// Attached downloadable media
    #[serde(default)]
    pub media: Option<MediaAttachment>,
    /// Untouched remote payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl Item {
    /// Whether the item carries media worth downloading
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }
}

/// A member of a feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Remote user id
    pub user_id: i64,
    /// Public handle
    #[serde(default)]
    pub username: Option<String>,
    /// First name
    #[serde(default)]
    pub first_name: Option<String>,
    /// Last name
    #[serde(default)]
    pub last_name: Option<String>,
    /// Whether the account is automated
    #[serde(default)]
    pub is_bot: bool,
    /// Untouched remote payload
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Event emitted while harvesting
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A feed run started
    FeedStarted {
        /// Feed ID
        feed_id: FeedId,
        /// Feed title
        name: String,
    },

    /// Media left over from a previous run was re-enqueued
    ResumeRestored {
        /// Feed ID
        feed_id: FeedId,
        /// Number of re-enqueued items
        count: usize,
    },

    /// A batch of items was committed together with its cursor
    BatchPersisted {
        /// Feed ID
        feed_id: FeedId,
        /// Items in the batch
        count: usize,
        /// Media-bearing items handed to the media queue
        media: usize,
        /// Cursor after the commit
        cursor: ItemId,
    },

    /// A media blob was written to disk
    MediaDownloaded {
        /// Feed ID
        feed_id: FeedId,
        /// Item ID
        item_id: ItemId,
        /// Final path
        path: PathBuf,
        /// Bytes reported by the transport
        bytes: u64,
    },

    /// A media item was already on disk
    MediaSkipped {
        /// Feed ID
        feed_id: FeedId,
        /// Item ID
        item_id: ItemId,
    },

    /// A media download failed; the item waits for the next resume cycle
    MediaFailed {
        /// Feed ID
        feed_id: FeedId,
        /// Item ID
        item_id: ItemId,
        /// Error message
        error: String,
    },

    /// Unfinished media was written to the resume ledger
    ResumeSaved {
        /// Feed ID
        feed_id: FeedId,
        /// Number of pending downloads saved
        count: usize,
    },

    /// No newer items remain for the feed
    FeedCaughtUp {
        /// Feed ID
        feed_id: FeedId,
        /// Items fetched during this run
        fetched: u64,
    },

    /// The feed was skipped (inactive or permanently unavailable)
    FeedSkipped {
        /// Feed ID
        feed_id: FeedId,
        /// Why it was skipped
        reason: String,
    },

    /// The feed run failed; other feeds continue
    FeedFailed {
        /// Feed ID
        feed_id: FeedId,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// The harvester finished shutting down
    Shutdown,
}

/// Outcome of harvesting one feed
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedReport {
    /// Feed ID
    pub feed_id: FeedId,
    /// Items fetched this run
    pub fetched: u64,
    /// Batches committed this run
    pub batches: u64,
    /// Cursor when the run ended
    pub cursor: Option<ItemId>,
    /// Media blobs downloaded
    pub media_downloaded: u64,
    /// Media items already on disk
    pub media_skipped: u64,
    /// Media downloads that failed
    pub media_failed: u64,
    /// Items re-enqueued from the resume ledger
    pub restored: usize,
    /// Items written to the resume ledger at the end of the run
    pub deferred: usize,
    /// Whether the run stopped because of cancellation
    pub cancelled: bool,
}

/// Outcome of a multi-feed run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Reports of feeds that completed (caught up or cancelled)
    pub feeds: Vec<FeedReport>,
    /// Feeds that failed, with the error message
    pub failed: Vec<(FeedId, String)>,
    /// Feeds that were skipped, with the reason
    pub skipped: Vec<(FeedId, String)>,
}
