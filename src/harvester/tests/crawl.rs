use super::feed;
use crate::error::{Error, TransportError};
use crate::harvester::test_helpers::*;
use crate::types::{Event, FeedId, ItemId};

#[tokio::test]
async fn test_first_batch_persists_items_media_and_cursor() {
    let transport =
        ScriptedTransport::new().with_feed(1, "F1", vec![item(10), item(11), media_item(12)]);
    let (harvester, transport, temp_dir) = create_test_harvester(transport).await;

    let report = harvester.harvest_feed(&feed(1, "F1")).await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.batches, 1);
    assert_eq!(report.cursor, Some(ItemId(12)));
    assert!(!report.cancelled);

    let db = &harvester.db;
    assert_eq!(db.get_cursor(FeedId(1)).await.unwrap(), Some(ItemId(12)));
    assert_eq!(db.count_items(FeedId(1)).await.unwrap(), 3);
    assert_eq!(db.count_media(FeedId(1)).await.unwrap(), 1);

    // The media item went through the queue exactly once
    assert_eq!(transport.media_requests(), vec![ItemId(12)]);
    assert_eq!(report.media_downloaded, 1);

    let dir = temp_dir.path().join("downloads").join("F1");
    assert_eq!(std::fs::read(dir.join("12")).unwrap(), MEDIA_BYTES);
    assert!(!dir.join("12.part").exists());
    assert!(!dir.join("10").exists());

    // One fetch from the start, one confirming nothing newer exists
    assert_eq!(transport.fetch_cursors(1), vec![None, Some(ItemId(12))]);
}

#[tokio::test]
async fn test_rerun_without_new_items_leaves_state_unchanged() {
    let transport =
        ScriptedTransport::new().with_feed(1, "F1", vec![item(10), item(11), media_item(12)]);
    let (harvester, transport, _temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    let report = harvester.harvest_feed(&f1).await.unwrap();

    assert_eq!(report.fetched, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(report.cursor, Some(ItemId(12)));
    assert_eq!(
        harvester.db.get_cursor(FeedId(1)).await.unwrap(),
        Some(ItemId(12))
    );
    assert_eq!(harvester.db.count_items(FeedId(1)).await.unwrap(), 3);
    assert_eq!(transport.media_requests(), vec![ItemId(12)]);
    assert_eq!(transport.fetch_cursors(1).last(), Some(&Some(ItemId(12))));
}

#[tokio::test]
async fn test_pagination_walks_cursor_forward_in_batches() {
    let items = (1..=5).map(item).collect();
    let transport = ScriptedTransport::new().with_feed(1, "F1", items);
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.crawl.batch_size = 2;
    let (harvester, transport, _temp_dir) =
        create_test_harvester_with(transport, config, temp_dir).await;

    let report = harvester.harvest_feed(&feed(1, "F1")).await.unwrap();

    assert_eq!(report.fetched, 5);
    assert_eq!(report.batches, 3);
    assert_eq!(
        transport.fetch_cursors(1),
        vec![None, Some(ItemId(2)), Some(ItemId(4)), Some(ItemId(5))]
    );
}

#[tokio::test]
async fn test_new_items_are_picked_up_from_the_cursor() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1), item(2)]);
    let (harvester, transport, _temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    transport.add_items(1, vec![item(3), media_item(4)]);
    let report = harvester.harvest_feed(&f1).await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.cursor, Some(ItemId(4)));
    assert_eq!(harvester.db.count_items(FeedId(1)).await.unwrap(), 4);
    assert_eq!(transport.media_requests(), vec![ItemId(4)]);
}

#[tokio::test]
async fn test_transient_fetch_failure_is_retried() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1)]);
    transport.fail_next_fetch(1, TransportError::transient("429"));
    let (harvester, transport, _temp_dir) = create_test_harvester(transport).await;

    let report = harvester.harvest_feed(&feed(1, "F1")).await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(transport.fetch_cursors(1), vec![None, None, Some(ItemId(1))]);
}

#[tokio::test]
async fn test_failed_batch_keeps_cursor_and_next_run_retries_range() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1), item(2)]);
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.retry.max_attempts = 0;
    let (harvester, transport, _temp_dir) =
        create_test_harvester_with(transport, config, temp_dir).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();

    transport.add_items(1, vec![item(3), item(4)]);
    transport.fail_next_fetch(1, TransportError::transient("503"));
    let err = harvester.harvest_feed(&f1).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Transient { .. })));
    assert_eq!(
        harvester.db.get_cursor(FeedId(1)).await.unwrap(),
        Some(ItemId(2))
    );
    assert_eq!(harvester.db.count_items(FeedId(1)).await.unwrap(), 2);

    let report = harvester.harvest_feed(&f1).await.unwrap();
    assert_eq!(report.fetched, 2);
    assert_eq!(
        harvester.db.get_cursor(FeedId(1)).await.unwrap(),
        Some(ItemId(4))
    );

    // The failed run and the next one asked for the same range
    let cursors = transport.fetch_cursors(1);
    assert_eq!(&cursors[2..4], &[Some(ItemId(2)), Some(ItemId(2))]);
}

#[tokio::test]
async fn test_permanent_failure_on_new_feed_leaves_no_feed_row() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1)]);
    transport.fail_next_fetch(1, TransportError::permanent("channel private"));
    let (harvester, _transport, _temp_dir) = create_test_harvester(transport).await;

    let err = harvester.harvest_feed(&feed(1, "F1")).await.unwrap_err();

    assert!(err.is_permanent_transport());
    assert!(harvester.db.get_feed(FeedId(1)).await.unwrap().is_none());
    assert_eq!(harvester.db.count_items(FeedId(1)).await.unwrap(), 0);
}

#[tokio::test]
async fn test_caught_up_sets_completion_flag() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1)]);
    let (harvester, transport, _temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    assert!(harvester.db.get_feed(FeedId(1)).await.unwrap().unwrap().is_complete);

    transport.add_items(1, vec![item(2)]);
    harvester.harvest_feed(&f1).await.unwrap();
    let stored = harvester.db.get_feed(FeedId(1)).await.unwrap().unwrap();
    assert!(stored.is_complete);
    assert_eq!(stored.max_item_id, Some(ItemId(2)));
}

#[tokio::test]
async fn test_empty_feed_is_registered_as_caught_up() {
    let transport = ScriptedTransport::new().with_feed(1, "Quiet", vec![]);
    let (harvester, _transport, _temp_dir) = create_test_harvester(transport).await;

    let report = harvester.harvest_feed(&feed(1, "Quiet")).await.unwrap();

    assert_eq!(report.fetched, 0);
    let stored = harvester.db.get_feed(FeedId(1)).await.unwrap().unwrap();
    assert!(stored.is_complete);
    assert_eq!(stored.max_item_id, None);
}

#[tokio::test]
async fn test_batch_events_are_emitted_in_order() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(1), media_item(2)]);
    let (harvester, _transport, _temp_dir) = create_test_harvester(transport).await;
    let mut events = harvester.subscribe();

    harvester.harvest_feed(&feed(1, "F1")).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    assert!(matches!(seen.first(), Some(Event::FeedStarted { name, .. }) if name == "F1"));
    let batch = seen
        .iter()
        .position(|e| matches!(e, Event::BatchPersisted { count: 2, media: 1, .. }))
        .unwrap();
    let caught_up = seen
        .iter()
        .position(|e| matches!(e, Event::FeedCaughtUp { fetched: 2, .. }))
        .unwrap();
    assert!(batch < caught_up);
    assert!(
        seen.iter()
            .any(|e| matches!(e, Event::MediaDownloaded { item_id, .. } if *item_id == ItemId(2)))
    );
}

#[tokio::test]
async fn test_media_disabled_stores_descriptors_without_downloading() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![media_item(1)]);
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    config.media.enabled = false;
    let (harvester, transport, temp_dir) =
        create_test_harvester_with(transport, config, temp_dir).await;

    let report = harvester.harvest_feed(&feed(1, "F1")).await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(harvester.db.count_media(FeedId(1)).await.unwrap(), 1);
    assert!(transport.media_requests().is_empty());
    assert_eq!(
        harvester.db.count_pending_downloads(FeedId(1)).await.unwrap(),
        0
    );
    assert!(!temp_dir.path().join("downloads").exists());
}
