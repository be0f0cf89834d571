use super::feed;
use crate::error::Error;
use crate::harvester::test_helpers::*;
use crate::types::{FeedId, ItemId};

#[tokio::test]
async fn test_missing_media_is_downloaded_again() {
    let transport = ScriptedTransport::new().with_feed(
        1,
        "F1",
        vec![media_item(1), item(2), media_item(3)],
    );
    let (harvester, transport, temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    let dir = temp_dir.path().join("downloads").join("F1");
    std::fs::remove_file(dir.join("1")).unwrap();

    let report = harvester.download_past_media(&f1).await.unwrap();

    assert_eq!(report.media_downloaded, 1);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.cursor, Some(ItemId(3)));
    assert!(dir.join("1").exists());
    assert_eq!(
        transport.media_requests(),
        vec![ItemId(1), ItemId(3), ItemId(1)]
    );
}

#[tokio::test]
async fn test_rebuilt_item_matches_the_harvested_one() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![media_item(4)]);
    transport.fail_media(4);
    let temp_dir = tempfile::tempdir().unwrap();
    let (harvester, transport, _temp_dir) =
        create_test_harvester_with(transport, test_config(temp_dir.path()), temp_dir).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    // Drop the ledger entry so only the stored rows can bring the item back
    harvester.db.clear_pending_downloads(FeedId(1)).await.unwrap();

    let report = harvester.download_past_media(&f1).await.unwrap();

    assert_eq!(report.restored, 0);
    assert_eq!(report.media_failed, 1);
    let pending = harvester.db.get_pending_downloads(FeedId(1)).await.unwrap();
    assert_eq!(pending.len(), 1);
    let rebuilt = pending[0].item().unwrap();
    assert_eq!(rebuilt.id, ItemId(4));
    assert_eq!(rebuilt.media, media_item(4).media);
    assert_eq!(transport.media_requests(), vec![ItemId(4), ItemId(4)]);
}

#[tokio::test]
async fn test_past_media_requires_media_enabled() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.media.enabled = false;
    let (harvester, _transport, _temp_dir) =
        create_test_harvester_with(ScriptedTransport::new(), config, temp_dir).await;

    let err = harvester
        .download_past_media(&feed(1, "F1"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
}

#[tokio::test]
async fn test_ledger_item_is_queued_once() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![media_item(4)]);
    transport.fail_media(4);
    let temp_dir = tempfile::tempdir().unwrap();
    let (harvester, transport, _temp_dir) =
        create_test_harvester_with(transport, test_config(temp_dir.path()), temp_dir).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    assert_eq!(harvester.db.count_pending_downloads(FeedId(1)).await.unwrap(), 1);

    let report = harvester.download_past_media(&f1).await.unwrap();

    assert_eq!(report.restored, 1);
    assert_eq!(report.media_failed, 1);
    assert_eq!(report.deferred, 1);
    assert_eq!(transport.media_requests(), vec![ItemId(4), ItemId(4)]);
    assert_eq!(harvester.db.count_pending_downloads(FeedId(1)).await.unwrap(), 1);
}
