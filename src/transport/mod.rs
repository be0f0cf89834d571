//! Transport seam
//!
//! The harvester talks to the remote service only through [`Transport`]. Adapters map
//! their own failures onto [`TransportError`] (transient or permanent) and decode remote
//! payload variants into the closed types of [`crate::types`] before returning, so
//! nothing protocol-specific leaks into the crawl or media code.
//!
//! [`http::HttpTransport`] is the bundled adapter for a JSON gateway.

use crate::error::TransportError;
use crate::types::{FeedId, Item, ItemId, Participant, RemoteFeed};
use async_trait::async_trait;
use std::path::Path;

pub mod http;

pub use http::HttpTransport;

/// Result of a transport call
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Download progress observer: `(bytes_written, total_bytes_if_known)`
///
/// Purely informational; no behavior depends on it.
pub type ProgressFn = dyn Fn(u64, Option<u64>) + Send + Sync;

/// Capability surface the harvester needs from a remote service
#[async_trait]
pub trait Transport: Send + Sync {
    /// List the feeds visible to this account
    async fn list_feeds(&self) -> TransportResult<Vec<RemoteFeed>>;

    /// Fetch up to `limit` items with id strictly above `min_id` (all items if None),
    /// ascending by id. An empty result means nothing newer exists.
    async fn fetch_items(
        &self,
        feed_id: FeedId,
        limit: u32,
        min_id: Option<ItemId>,
    ) -> TransportResult<Vec<Item>>;

    /// Write the complete media blob of `item` to `destination`
    ///
    /// On failure the adapter may leave a partial file behind; the caller removes it.
    /// Returns the number of bytes written.
    async fn fetch_media(
        &self,
        feed_id: FeedId,
        item: &Item,
        destination: &Path,
        progress: Option<&ProgressFn>,
    ) -> TransportResult<u64>;

    /// List the members of a feed
    async fn fetch_participants(&self, feed_id: FeedId) -> TransportResult<Vec<Participant>>;
}
