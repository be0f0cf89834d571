//! Harvester construction against a mock gateway

use feed_harvest::config::HttpTransportConfig;
use feed_harvest::{Config, Harvester, HttpTransport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Config with zero pacing and quick retries, storing everything under `dir`
pub fn test_config(dir: &Path, server: &MockServer) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = dir.join("harvest.db");
    config.media.download_dir = dir.join("downloads");
    config.crawl.history_interval = Duration::ZERO;
    config.media.media_interval = Duration::ZERO;
    config.retry.max_attempts = 1;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.jitter = false;
    config.http = Some(HttpTransportConfig {
        base_url: format!("{}/api/", server.uri()),
        api_token: Some("test-token".to_string()),
        timeout: Duration::from_secs(5),
    });
    config
}

/// Build a harvester over the bundled HTTP transport
pub async fn create_harvester(config: Config) -> Harvester {
    let http = config.http.clone().unwrap();
    let transport = Arc::new(HttpTransport::new(&http).unwrap());
    Harvester::new(config, transport).await.unwrap()
}

/// Fresh state directory plus a harvester talking to `server`
pub async fn create_test_harvester(server: &MockServer) -> (Harvester, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let harvester = create_harvester(test_config(temp_dir.path(), server)).await;
    (harvester, temp_dir)
}
