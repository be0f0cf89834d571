//! Configuration types for feed-harvest

use crate::error::{Error, Result};
use crate::types::FeedId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pagination settings for the crawl loop
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Items requested per history fetch (default: 500)
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Minimum spacing between two history fetches (default: 1 second)
    #[serde(default = "default_history_interval", with = "duration_serde")]
    pub history_interval: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            history_interval: default_history_interval(),
        }
    }
}

/// How the per-feed download directory is named
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderNaming {
    /// Sanitized feed title, falling back to the id when nothing printable is left
    #[default]
    Title,
    /// Numeric feed id
    Id,
}

/// Media acquisition settings
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Whether media is downloaded at all (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Root directory for downloaded media (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Minimum spacing between two media downloads per worker (default: 3 seconds)
    #[serde(default = "default_media_interval", with = "duration_serde")]
    pub media_interval: Duration,

    /// Number of concurrent media consumers (default: 1)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-feed directory naming
    #[serde(default)]
    pub folder_naming: FolderNaming,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            download_dir: default_download_dir(),
            media_interval: default_media_interval(),
            workers: default_workers(),
            folder_naming: FolderNaming::default(),
        }
    }
}

/// Data storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// SQLite database file (default: "./harvest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Which remote feeds a multi-feed run acts on
///
/// A non-empty whitelist wins over the blacklist.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Only these feeds are harvested
    #[serde(default)]
    pub whitelist: Vec<FeedId>,

    /// These feeds are never harvested
    #[serde(default)]
    pub blacklist: Vec<FeedId>,
}

impl SelectionConfig {
    /// Whether a feed passes the selection
    pub fn allows(&self, feed_id: FeedId) -> bool {
        if !self.whitelist.is_empty() {
            return self.whitelist.contains(&feed_id);
        }
        !self.blacklist.contains(&feed_id)
    }
}

/// Retry configuration for transient transport failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Settings for the bundled HTTP JSON transport
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    /// Gateway base URL, e.g. "http://127.0.0.1:8080/api/"
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Per-request timeout (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

/// Main configuration for [`Harvester`](crate::Harvester)
///
/// Sub-configs:
/// - [`crawl`](CrawlConfig) - batch size and history pacing
/// - [`media`](MediaConfig) - download directory, media pacing, workers
/// - [`persistence`](PersistenceConfig) - database location
/// - [`selection`](SelectionConfig) - whitelist / blacklist
/// - [`retry`](RetryConfig) - backoff for transient transport failures
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Pagination settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Media acquisition settings
    #[serde(default)]
    pub media: MediaConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Feed selection
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Bundled HTTP transport, when used
    #[serde(default)]
    pub http: Option<HttpTransportConfig>,
}

impl Config {
    /// Load a JSON configuration file and validate it
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| Error::Config {
            message: format!("failed to parse {}: {}", path.display(), e),
            key: None,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.crawl.batch_size == 0 {
            return Err(Error::Config {
                message: "batch_size must be at least 1".to_string(),
                key: Some("crawl.batch_size".to_string()),
            });
        }
        if self.media.workers == 0 {
            return Err(Error::Config {
                message: "at least one media worker is required".to_string(),
                key: Some("media.workers".to_string()),
            });
        }
        if !self.retry.backoff_multiplier.is_finite() || self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be a finite number >= 1.0".to_string(),
                key: Some("retry.backoff_multiplier".to_string()),
            });
        }
        if let Some(http) = &self.http {
            if url::Url::parse(&http.base_url).is_err() {
                return Err(Error::Config {
                    message: format!("invalid base_url '{}'", http.base_url),
                    key: Some("http.base_url".to_string()),
                });
            }
        }
        Ok(())
    }
}

fn default_batch_size() -> u32 {
    500
}

fn default_history_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_media_interval() -> Duration {
    Duration::from_secs(3)
}

fn default_workers() -> usize {
    1
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("harvest.db")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

/// Durations as fractional seconds (`1.5` = 1500 ms)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
