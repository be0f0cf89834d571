//! HTTP JSON gateway adapter
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call | Request |
//! |------|---------|
//! | [`list_feeds`](Transport::list_feeds) | `GET feeds` |
//! | [`fetch_items`](Transport::fetch_items) | `GET feeds/{id}/items?limit=N[&min_id=M]` |
//! | [`fetch_media`](Transport::fetch_media) | `GET feeds/{id}/items/{item_id}/media` |
//! | [`fetch_participants`](Transport::fetch_participants) | `GET feeds/{id}/participants` |
//!
//! Listing endpoints return JSON arrays. Status codes are classified once, in
//! [`classify_status`]: 408, 429 and 5xx are transient, everything else non-2xx is
//! permanent. Remote item objects are decoded into [`Item`] here and nowhere else.

use super::{ProgressFn, Transport, TransportResult};
use crate::config::HttpTransportConfig;
use crate::error::TransportError;
use crate::types::{FeedId, ForwardOrigin, Item, ItemId, MediaAttachment, MediaKind, Participant, RemoteFeed};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// [`Transport`] over a JSON HTTP gateway
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

impl HttpTransport {
    /// Build the adapter from its configuration
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the base URL is invalid or the HTTP client cannot be created
    pub fn new(config: &HttpTransportConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| Error::Config {
            message: format!("invalid base_url '{}': {}", config.base_url, e),
            key: Some("http.base_url".to_string()),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config {
                message: format!("base_url '{}' cannot carry a path", config.base_url),
                key: Some("http.base_url".to_string()),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("feed-harvest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token.clone(),
        })
    }

    fn endpoint<I>(&self, segments: I) -> TransportResult<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::permanent(format!("base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> TransportResult<reqwest::Response> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| classify_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, response.headers(), &url));
        }
        Ok(response)
    }

    async fn get_json<T>(&self, url: Url) -> TransportResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.get(url.clone()).await?;
        let body = response.bytes().await.map_err(|e| classify_reqwest(&url, e))?;
        serde_json::from_slice(&body).map_err(|e| {
            TransportError::permanent(format!("malformed payload from {}: {}", url, e))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn list_feeds(&self) -> TransportResult<Vec<RemoteFeed>> {
        let url = self.endpoint(["feeds"])?;
        let feeds: Vec<WireFeed> = self.get_json(url).await?;
        Ok(feeds
            .into_iter()
            .map(|f| RemoteFeed {
                id: FeedId(f.id),
                name: f.name,
            })
            .collect())
    }

    async fn fetch_items(
        &self,
        feed_id: FeedId,
        limit: u32,
        min_id: Option<ItemId>,
    ) -> TransportResult<Vec<Item>> {
        let mut url = self.endpoint(["feeds", feed_id.to_string().as_str(), "items"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(min_id) = min_id {
                query.append_pair("min_id", &min_id.to_string());
            }
        }

        let raw: Vec<serde_json::Value> = self.get_json(url).await?;
        let mut items = raw
            .into_iter()
            .map(decode_item)
            .collect::<TransportResult<Vec<_>>>()?;

        // Gateways may page newest-first; the crawl needs ascending ids above min_id
        items.retain(|item| min_id.is_none_or(|min| item.id > min));
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
        let url = self.endpoint([
            "feeds",
            feed_id.to_string().as_str(),
            "items",
            item.id.to_string().as_str(),
            "media",
        ])?;
        let mut response = self.get(url.clone()).await?;
        let total = response.content_length();

        let write_error = |e: std::io::Error| {
            TransportError::transient(format!("writing {}: {}", destination.display(), e))
        };
        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(write_error)?;

        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(|e| classify_reqwest(&url, e))? {
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
            if let Some(progress) = progress {
                progress(written, total);
            }
        }
        file.flush().await.map_err(write_error)?;
        file.sync_all().await.map_err(write_error)?;

        if let Some(total) = total {
            if written != total {
                return Err(TransportError::transient(format!(
                    "short media body from {}: {} of {} bytes",
                    url, written, total
                )));
            }
        }

        Ok(written)
    }

    async fn fetch_participants(&self, feed_id: FeedId) -> TransportResult<Vec<Participant>> {
        let url = self.endpoint(["feeds", feed_id.to_string().as_str(), "participants"])?;
        let raw: Vec<serde_json::Value> = self.get_json(url).await?;
        raw.into_iter().map(decode_participant).collect()
    }
}

/// Map a non-success status onto the transient/permanent split
pub(crate) fn classify_status(status: StatusCode, headers: &HeaderMap, url: &Url) -> TransportError {
    let message = format!("HTTP {} from {}", status.as_u16(), url);
    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::Transient {
            message,
            retry_after: retry_after(headers),
        },
        StatusCode::REQUEST_TIMEOUT => TransportError::transient(message),
        s if s.is_server_error() => TransportError::Transient {
            message,
            retry_after: retry_after(headers),
        },
        _ => TransportError::permanent(message),
    }
}

/// Parse a `Retry-After` header given in seconds
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify_reqwest(url: &Url, e: reqwest::Error) -> TransportError {
    if e.is_decode() || e.is_builder() {
        TransportError::permanent(format!("request to {} failed: {}", url, e))
    } else if e.is_timeout() {
        TransportError::transient(format!("timeout requesting {}", url))
    } else {
        TransportError::transient(format!("request to {} failed: {}", url, e))
    }
}

#[derive(Debug, Deserialize)]
struct WireFeed {
    id: i64,
    #[serde(alias = "title")]
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireItem {
    id: i64,
    /// Unix seconds
    date: i64,
    #[serde(default, alias = "text")]
    message: Option<String>,
    #[serde(default)]
    from_id: Option<i64>,
    #[serde(default)]
    views: Option<i64>,
    #[serde(default)]
    forwards: Option<i64>,
    #[serde(default)]
    replies: Option<i64>,
    #[serde(default)]
    fwd_from: Option<WireForward>,
    #[serde(default)]
    media: Option<WireMedia>,
}

#[derive(Debug, Deserialize)]
struct WireForward {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    from_id: Option<i64>,
    #[serde(default)]
    channel_post: Option<i64>,
    #[serde(default)]
    from_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMedia {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    size: Option<i64>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    dc_id: Option<i32>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    hash: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireParticipant {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

/// Decode one remote item object, keeping the untouched object as the raw payload
fn decode_item(raw: serde_json::Value) -> TransportResult<Item> {
    let wire: WireItem = serde_json::from_value(raw.clone())
        .map_err(|e| TransportError::permanent(format!("malformed item: {}", e)))?;

    let posted_at = Utc
        .timestamp_opt(wire.date, 0)
        .single()
        .ok_or_else(|| TransportError::permanent(format!("item {} has invalid date {}", wire.id, wire.date)))?;

    Ok(Item {
        id: ItemId(wire.id),
        posted_at,
        text: wire.message.filter(|m| !m.is_empty()),
        sender_id: wire.from_id,
        views: wire.views,
        forwards: wire.forwards,
        replies: wire.replies,
        forward: wire.fwd_from.and_then(decode_forward),
        media: wire.media.and_then(|m| decode_media(wire.id, m)),
        raw,
    })
}

fn decode_forward(wire: WireForward) -> Option<ForwardOrigin> {
    match (wire.kind.as_str(), wire.from_id) {
        ("user", Some(user_id)) => Some(ForwardOrigin::User { user_id }),
        ("channel" | "feed" | "chat", Some(feed_id)) => Some(ForwardOrigin::Feed {
            feed_id: FeedId(feed_id),
            item_id: wire.channel_post.map(ItemId),
        }),
        (_, _) => wire.from_name.map(|name| ForwardOrigin::Hidden { name }),
    }
}

/// Map the remote media tag; non-downloadable attachments (polls, links, locations) yield None
fn decode_media(item_id: i64, wire: WireMedia) -> Option<MediaAttachment> {
    let kind = match wire.kind.as_str() {
        "photo" | "image" => MediaKind::Image,
        "video" | "gif" | "animation" | "round" => MediaKind::Video,
        "audio" | "voice" => MediaKind::Audio,
        "document" | "file" => MediaKind::Document,
        "webpage" | "poll" | "geo" | "venue" | "contact" | "dice" | "game" => return None,
        _ => MediaKind::Other,
    };

    Some(MediaAttachment {
        media_id: wire.id.unwrap_or(item_id),
        kind,
        size: wire.size,
        mime_type: wire.mime_type,
        dc_id: wire.dc_id,
        location: wire.location,
        hash: wire.hash,
    })
}

fn decode_participant(raw: serde_json::Value) -> TransportResult<Participant> {
    let wire: WireParticipant = serde_json::from_value(raw.clone())
        .map_err(|e| TransportError::permanent(format!("malformed participant: {}", e)))?;

    Ok(Participant {
        user_id: wire.id,
        username: wire.username,
        first_name: wire.first_name,
        last_name: wire.last_name,
        is_bot: wire.bot,
        raw,
    })
}
