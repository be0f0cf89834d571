//! Basic harvest example
//!
//! This example demonstrates the core functionality of feed-harvest:
//! - Loading a JSON configuration
//! - Creating a harvester over the HTTP gateway transport
//! - Subscribing to events
//! - Running every selected feed until caught up or Ctrl+C

use feed_harvest::config::HttpTransportConfig;
use feed_harvest::{Config, Event, Harvester, HttpTransport, run_until_signal};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    // Config file from the first argument, otherwise a local gateway with defaults
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_json_file(path.as_ref())?,
        None => Config {
            http: Some(HttpTransportConfig {
                base_url: "http://127.0.0.1:8080/api/".to_string(),
                api_token: std::env::var("FEED_GATEWAY_TOKEN").ok(),
                timeout: Duration::from_secs(60),
            }),
            ..Default::default()
        },
    };

    let http = config.http.clone().ok_or("configuration has no http section")?;
    let transport = Arc::new(HttpTransport::new(&http)?);
    let harvester = Harvester::new(config, transport).await?;

    // Subscribe to events
    let mut events = harvester.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::FeedStarted { feed_id, name } => {
                    println!("▶ Feed {} ({})", feed_id, name);
                }
                Event::ResumeRestored { feed_id, count } => {
                    println!("↺ Feed {}: {} pending downloads restored", feed_id, count);
                }
                Event::BatchPersisted {
                    count,
                    media,
                    cursor,
                    ..
                } => {
                    println!("  + {} items ({} with media), cursor {}", count, media, cursor);
                }
                Event::MediaDownloaded { path, bytes, .. } => {
                    println!("  ⬇ {} ({} bytes)", path.display(), bytes);
                }
                Event::MediaFailed { item_id, error, .. } => {
                    println!("  ✗ media of item {}: {}", item_id, error);
                }
                Event::FeedCaughtUp { feed_id, fetched } => {
                    println!("✓ Feed {} caught up, {} new items", feed_id, fetched);
                }
                Event::FeedSkipped { feed_id, reason } => {
                    println!("- Feed {} skipped: {}", feed_id, reason);
                }
                Event::FeedFailed { feed_id, error, .. } => {
                    println!("✗ Feed {} failed: {}", feed_id, error);
                }
                _ => {}
            }
        }
    });

    let report = run_until_signal(&harvester).await?;
    harvester.shutdown().await;

    println!(
        "Done: {} harvested, {} skipped, {} failed",
        report.feeds.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}
