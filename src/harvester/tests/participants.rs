use super::feed;
use crate::harvester::test_helpers::*;
use crate::types::{FeedId, Participant};

fn participant(user_id: i64, username: &str) -> Participant {
    Participant {
        user_id,
        username: Some(username.to_string()),
        first_name: None,
        last_name: None,
        is_bot: false,
        raw: serde_json::json!({ "id": user_id, "username": username }),
    }
}

#[tokio::test]
async fn test_participants_are_stored_and_linked() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![]);
    transport.set_participants(1, vec![participant(100, "alice"), participant(200, "bob")]);
    let (harvester, transport, _temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    assert_eq!(harvester.harvest_participants(&f1).await.unwrap(), 2);

    let stored = harvester.db.list_participants(FeedId(1)).await.unwrap();
    let names: Vec<_> = stored.iter().map(|p| p.username.clone().unwrap()).collect();
    assert_eq!(names, vec!["alice", "bob"]);

    // The feed row exists without a cursor
    let row = harvester.db.get_feed(FeedId(1)).await.unwrap().unwrap();
    assert_eq!(row.max_item_id, None);

    // A second snapshot only refreshes profiles
    transport.set_participants(1, vec![participant(100, "alice_renamed")]);
    assert_eq!(harvester.harvest_participants(&f1).await.unwrap(), 0);
    let stored = harvester.db.list_participants(FeedId(1)).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].username.as_deref(), Some("alice_renamed"));
}

#[tokio::test]
async fn test_participants_do_not_touch_the_cursor() {
    let transport = ScriptedTransport::new().with_feed(1, "F1", vec![item(5)]);
    transport.set_participants(1, vec![participant(1, "a")]);
    let (harvester, _transport, _temp_dir) = create_test_harvester(transport).await;
    let f1 = feed(1, "F1");

    harvester.harvest_feed(&f1).await.unwrap();
    harvester.harvest_participants(&f1).await.unwrap();

    assert_eq!(
        harvester.db.get_cursor(FeedId(1)).await.unwrap(),
        Some(crate::types::ItemId(5))
    );
}
