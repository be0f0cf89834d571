//! Gateway payloads and mock mounting helpers

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes served for every media download
pub const MEDIA_BODY: &[u8] = b"\x89PNG fake image bytes";

/// A plain text message as the gateway returns it
pub fn text_message(id: i64) -> Value {
    json!({ "id": id, "date": 1_700_000_000 + id, "message": format!("message {id}"), "views": 3 })
}

/// A message carrying a photo
pub fn photo_message(id: i64) -> Value {
    json!({
        "id": id,
        "date": 1_700_000_000 + id,
        "message": "",
        "media": { "type": "photo", "id": 9000 + id, "size": MEDIA_BODY.len(), "mime_type": "image/png" }
    })
}

pub async fn mount_feeds(server: &MockServer, feeds: Value) {
    Mock::given(method("GET"))
        .and(path("/api/feeds"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feeds))
        .mount(server)
        .await;
}

/// Serve the full history of a feed; the transport drops ids at or below `min_id`
pub async fn mount_items(server: &MockServer, feed_id: i64, items: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/feeds/{feed_id}/items")))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(server)
        .await;
}

pub async fn mount_media(server: &MockServer, feed_id: i64, item_id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/feeds/{feed_id}/items/{item_id}/media")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(MEDIA_BODY))
        .mount(server)
        .await;
}

/// Respond with `status` to the next `times` media requests for an item
pub async fn mount_media_failure(server: &MockServer, feed_id: i64, item_id: i64, status: u16, times: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/api/feeds/{feed_id}/items/{item_id}/media")))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(times)
        .with_priority(1)
        .mount(server)
        .await;
}

/// Number of requests the server received for a path
pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}
