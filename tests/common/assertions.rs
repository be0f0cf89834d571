//! Event collection helpers for integration tests

use feed_harvest::Event;
use tokio::sync::broadcast;

/// Drain every event already sitting in the receiver
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

/// Whether a media download finished for the item
pub fn downloaded(events: &[Event], item: i64) -> bool {
    events
        .iter()
        .any(|e| matches!(e, Event::MediaDownloaded { item_id, .. } if *item_id == item))
}

/// Whether a media download failed for the item
pub fn failed(events: &[Event], item: i64) -> bool {
    events
        .iter()
        .any(|e| matches!(e, Event::MediaFailed { item_id, .. } if *item_id == item))
}
