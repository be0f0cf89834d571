//! Shared fixtures and an in-memory scripted transport for harvester tests.

use crate::config::Config;
use crate::error::TransportError;
use crate::harvester::Harvester;
use crate::transport::{ProgressFn, Transport, TransportResult};
use crate::types::{FeedId, Item, ItemId, MediaAttachment, MediaKind, Participant, RemoteFeed};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A text-only item
pub(crate) fn item(id: i64) -> Item {
    Item {
        id: ItemId(id),
        posted_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        text: Some(format!("item {id}")),
        sender_id: Some(1000 + id),
        views: Some(id * 10),
        forwards: None,
        replies: None,
        forward: None,
        media: None,
        raw: serde_json::json!({ "id": id, "message": format!("item {id}") }),
    }
}

/// An item carrying an image
pub(crate) fn media_item(id: i64) -> Item {
    let mut item = item(id);
    item.media = Some(MediaAttachment {
        media_id: 50_000 + id,
        kind: MediaKind::Image,
        size: Some(4),
        mime_type: Some("image/jpeg".to_string()),
        dc_id: Some(2),
        location: None,
        hash: None,
    });
    item.raw = serde_json::json!({
        "id": id,
        "message": format!("item {id}"),
        "media": { "type": "photo", "id": 50_000 + id }
    });
    item
}

/// Bytes every scripted media download writes
pub(crate) const MEDIA_BYTES: &[u8] = b"blob";

/// Calls observed by [`ScriptedTransport`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    ListFeeds,
    FetchItems { feed_id: FeedId, min_id: Option<ItemId> },
    FetchMedia { feed_id: FeedId, item_id: ItemId },
    FetchParticipants { feed_id: FeedId },
}

#[derive(Default)]
struct Script {
    feeds: Vec<RemoteFeed>,
    items: HashMap<FeedId, Vec<Item>>,
    item_errors: HashMap<FeedId, VecDeque<TransportError>>,
    list_errors: VecDeque<TransportError>,
    participants: HashMap<FeedId, Vec<Participant>>,
    failing_media: HashSet<ItemId>,
    hanging_media: HashSet<ItemId>,
    calls: Vec<Call>,
}

/// In-memory [`Transport`] driven by a script
///
/// Serves items strictly above `min_id`, ascending, up to `limit`. Media downloads write
/// [`MEDIA_BYTES`]; items marked failing write a partial file then fail, items marked
/// hanging never complete.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<Script>,
    /// Signalled whenever a media download begins
    pub(crate) media_started: Notify,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_feed(self, id: i64, name: &str, items: Vec<Item>) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.feeds.push(RemoteFeed {
                id: FeedId(id),
                name: name.to_string(),
            });
            script.items.insert(FeedId(id), items);
        }
        self
    }

    /// Make new items appear on a feed
    pub(crate) fn add_items(&self, feed_id: i64, items: Vec<Item>) {
        let mut script = self.script.lock().unwrap();
        script.items.entry(FeedId(feed_id)).or_default().extend(items);
    }

    /// Queue an error for the next `fetch_items` call on a feed
    pub(crate) fn fail_next_fetch(&self, feed_id: i64, error: TransportError) {
        let mut script = self.script.lock().unwrap();
        script
            .item_errors
            .entry(FeedId(feed_id))
            .or_default()
            .push_back(error);
    }

    pub(crate) fn fail_next_list(&self, error: TransportError) {
        self.script.lock().unwrap().list_errors.push_back(error);
    }

    pub(crate) fn set_participants(&self, feed_id: i64, participants: Vec<Participant>) {
        self.script
            .lock()
            .unwrap()
            .participants
            .insert(FeedId(feed_id), participants);
    }

    pub(crate) fn fail_media(&self, item_id: i64) {
        self.script
            .lock()
            .unwrap()
            .failing_media
            .insert(ItemId(item_id));
    }

    pub(crate) fn heal_media(&self, item_id: i64) {
        let mut script = self.script.lock().unwrap();
        script.failing_media.remove(&ItemId(item_id));
        script.hanging_media.remove(&ItemId(item_id));
    }

    pub(crate) fn hang_media(&self, item_id: i64) {
        self.script
            .lock()
            .unwrap()
            .hanging_media
            .insert(ItemId(item_id));
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Item ids whose media was requested, in request order
    pub(crate) fn media_requests(&self) -> Vec<ItemId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FetchMedia { item_id, .. } => Some(item_id),
                _ => None,
            })
            .collect()
    }

    /// `min_id` of every item fetch, in order
    pub(crate) fn fetch_cursors(&self, feed_id: i64) -> Vec<Option<ItemId>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::FetchItems { feed_id: f, min_id } if f == FeedId(feed_id) => Some(min_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn list_feeds(&self) -> TransportResult<Vec<RemoteFeed>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::ListFeeds);
        if let Some(e) = script.list_errors.pop_front() {
            return Err(e);
        }
        Ok(script.feeds.clone())
    }

    async fn fetch_items(
        &self,
        feed_id: FeedId,
        limit: u32,
        min_id: Option<ItemId>,
    ) -> TransportResult<Vec<Item>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::FetchItems { feed_id, min_id });
        if let Some(e) = script
            .item_errors
            .get_mut(&feed_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(e);
        }

        let mut items: Vec<Item> = script
            .items
            .get(&feed_id)
            .ok_or_else(|| TransportError::permanent(format!("feed {feed_id} not found")))?
            .iter()
            .filter(|item| min_id.is_none_or(|min| item.id > min))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        items.truncate(limit as usize);
        Ok(items)
    }

    async fn fetch_media(
        &self,
        feed_id: FeedId,
        item: &Item,
        destination: &Path,
        progress: Option<&ProgressFn>,
    ) -> TransportResult<u64> {
        let (failing, hanging) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Call::FetchMedia {
                feed_id,
                item_id: item.id,
            });
            (
                script.failing_media.contains(&item.id),
                script.hanging_media.contains(&item.id),
            )
        };
        self.media_started.notify_one();

        if hanging {
            tokio::fs::write(destination, &MEDIA_BYTES[..2]).await.unwrap();
            std::future::pending::<()>().await;
        }
        if failing {
            tokio::fs::write(destination, &MEDIA_BYTES[..2]).await.unwrap();
            return Err(TransportError::transient("connection reset mid-download"));
        }

        tokio::fs::write(destination, MEDIA_BYTES).await.unwrap();
        if let Some(progress) = progress {
            progress(MEDIA_BYTES.len() as u64, Some(MEDIA_BYTES.len() as u64));
        }
        Ok(MEDIA_BYTES.len() as u64)
    }

    async fn fetch_participants(&self, feed_id: FeedId) -> TransportResult<Vec<Participant>> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(Call::FetchParticipants { feed_id });
        Ok(script.participants.get(&feed_id).cloned().unwrap_or_default())
    }
}

/// Config with zero pacing and fast retries rooted in `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("harvest.db");
    config.media.download_dir = dir.join("downloads");
    config.crawl.history_interval = Duration::ZERO;
    config.media.media_interval = Duration::ZERO;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(5);
    config.retry.jitter = false;
    config
}

/// Harvester over a scripted transport; keep the tempdir alive for the test's duration
pub(crate) async fn create_test_harvester(
    transport: ScriptedTransport,
) -> (Harvester, Arc<ScriptedTransport>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = test_config(temp_dir.path());
    create_test_harvester_with(transport, config, temp_dir).await
}

pub(crate) async fn create_test_harvester_with(
    transport: ScriptedTransport,
    config: Config,
    temp_dir: tempfile::TempDir,
) -> (Harvester, Arc<ScriptedTransport>, tempfile::TempDir) {
    let transport = Arc::new(transport);
    let harvester = Harvester::new(config, transport.clone()).await.unwrap();
    (harvester, transport, temp_dir)
}

/// Reopen a harvester on the same state directory, as a new process run would
pub(crate) async fn reopen_harvester(
    transport: Arc<ScriptedTransport>,
    dir: &Path,
) -> Harvester {
    Harvester::new(test_config(dir), transport).await.unwrap()
}
