//! Media acquisition
//!
//! - [`queue`] - in-memory producer/consumer queue shared by the crawl and the workers
//! - [`worker`] - consumer tasks that download, skip or defer each queued item
//!
//! On disk every feed gets one directory and every media item one file named by its
//! item id. The final file name is the only "already downloaded" marker; downloads are
//! written to `<item_id>.part` first and renamed when complete.

use crate::config::FolderNaming;
use crate::types::{ItemId, RemoteFeed};
use std::path::{Path, PathBuf};

pub mod queue;
pub mod worker;

pub use queue::MediaQueue;
pub use worker::{MediaStats, MediaWorkerContext, run_media_worker};

/// Suffix of in-flight downloads
pub const PARTIAL_SUFFIX: &str = "part";

/// Characters that are invalid in Windows file names
const INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Directory name for a feed
///
/// Titles are sanitized for every common filesystem; a title with nothing usable left
/// falls back to the feed id.
pub fn feed_folder_name(feed: &RemoteFeed, naming: FolderNaming) -> String {
    match naming {
        FolderNaming::Id => feed.id.to_string(),
        FolderNaming::Title => {
            sanitize_folder_name(&feed.name).unwrap_or_else(|| feed.id.to_string())
        }
    }
}

/// Directory that receives a feed's media
pub fn feed_dir(download_dir: &Path, feed: &RemoteFeed, naming: FolderNaming) -> PathBuf {
    download_dir.join(feed_folder_name(feed, naming))
}

/// Final location of an item's media
pub fn media_path(feed_dir: &Path, item_id: ItemId) -> PathBuf {
    feed_dir.join(item_id.to_string())
}

/// In-flight location of an item's media
pub fn partial_path(feed_dir: &Path, item_id: ItemId) -> PathBuf {
    feed_dir.join(format!("{}.{}", item_id, PARTIAL_SUFFIX))
}

/// Replace path separators, reserved and control characters; collapse runs of them
/// into one underscore and trim surrounding dots and spaces.
fn sanitize_folder_name(title: &str) -> Option<String> {
    let mut result = String::with_capacity(title.len());
    let mut last_was_replacement = false;

    for c in title.chars() {
        if c.is_control() || INVALID_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() || trimmed.chars().all(|c| c == '_') {
        None
    } else {
        Some(trimmed.to_string())
    }
}
