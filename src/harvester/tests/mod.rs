mod crawl;
mod participants;
mod past_media;

use crate::types::{FeedId, RemoteFeed};

pub(super) fn feed(id: i64, name: &str) -> RemoteFeed {
    RemoteFeed {
        id: FeedId(id),
        name: name.to_string(),
    }
}
