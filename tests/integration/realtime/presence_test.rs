//! Presence and fan-out scenarios driven through the hub

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use tripsync::backend::realtime::{EventEnvelope, EventPublisher, MutationKind, RealtimeHub};
use tripsync::shared::event::ChatMessageRecord;
use tripsync::shared::{ServerEvent, TripId, UserId};

use crate::common::HubPeer;
use crate::{assert_event_names, assert_ok};

fn trip(id: &str) -> TripId {
    TripId::from(id)
}

#[tokio::test]
async fn test_multi_tab_user_is_announced_once_and_leaves_once() {
    let hub = RealtimeHub::spawn();
    let mut watcher = HubPeer::connect(&hub, "w");
    assert_ok!(hub.join(watcher.id, trip("t")).await);

    let mut tab1 = HubPeer::connect(&hub, "u");
    let mut tab2 = HubPeer::connect(&hub, "u");
    assert_ok!(hub.join(tab1.id, trip("t")).await);
    let second = assert_ok!(hub.join(tab2.id, trip("t")).await);

    assert!(!second.announced);
    assert_eq!(
        second.snapshot.connected_user_ids,
        vec![UserId::from("u"), UserId::from("w")]
    );

    let joined: Vec<_> = watcher
        .drain()
        .into_iter()
        .filter(|event| matches!(event, ServerEvent::UserJoined(_)))
        .collect();
    assert_eq!(joined.len(), 1);
    tab1.drain();
    tab2.drain();

    assert_ok!(hub.disconnect(tab1.id));
    assert!(assert_ok!(hub.is_present(trip("t"), UserId::from("u")).await));
    assert!(watcher.drain().is_empty());
    assert!(tab2.drain().is_empty());

    assert_ok!(hub.disconnect(tab2.id));
    assert!(!assert_ok!(hub.is_present(trip("t"), UserId::from("u")).await));
    assert_matches!(
        watcher.drain().as_slice(),
        [ServerEvent::UserLeft(change)] if change.user_id == UserId::from("u")
    );
    assert_eq!(
        assert_ok!(hub.members_of(trip("t")).await).into_iter().collect::<Vec<_>>(),
        vec![UserId::from("w")]
    );
}

#[tokio::test]
async fn test_chat_is_suppressed_for_every_connection_of_the_author() {
    let hub = RealtimeHub::spawn();
    let mut a1 = HubPeer::connect(&hub, "a");
    let mut a2 = HubPeer::connect(&hub, "a");
    let mut b = HubPeer::connect(&hub, "b");
    for peer in [&a1, &a2, &b] {
        assert_ok!(hub.join(peer.id, trip("t")).await);
    }
    a1.drain();
    a2.drain();
    b.drain();

    let record = ChatMessageRecord {
        id: uuid::Uuid::new_v4(),
        trip_id: trip("t"),
        user_id: UserId::from("a"),
        user_name: "A".to_string(),
        content: "hello".to_string(),
        message_type: "text".to_string(),
        created_at: chrono::Utc::now(),
    };
    assert_ok!(hub.publish(EventEnvelope::chat_message(record)));
    assert_ok!(hub.snapshot(trip("t")).await);

    assert!(a1.drain().is_empty());
    assert!(a2.drain().is_empty());
    assert_event_names!(b.drain(), ["chat:newMessage"]);
}

#[tokio::test]
async fn test_joining_from_second_tab_is_not_announced() {
    let hub = RealtimeHub::spawn();
    let mut other_room = HubPeer::connect(&hub, "u");
    assert_ok!(hub.join(other_room.id, trip("t")).await);
    other_room.drain();

    let mut tab = HubPeer::connect(&hub, "u");
    assert_ok!(hub.join(tab.id, trip("t2")).await);
    assert_ok!(hub.join(other_room.id, trip("t2")).await);

    assert_event_names!(tab.drain(), ["trip:joined"]);
    assert_event_names!(other_room.drain(), ["trip:joined"]);
}

#[tokio::test]
async fn test_room_switch_leaves_then_joins() {
    let hub = RealtimeHub::spawn();
    let mut in_t1 = HubPeer::connect(&hub, "x");
    let mut in_t2 = HubPeer::connect(&hub, "y");
    let mut mover = HubPeer::connect(&hub, "m");
    assert_ok!(hub.join(in_t1.id, trip("t1")).await);
    assert_ok!(hub.join(in_t2.id, trip("t2")).await);
    assert_ok!(hub.join(mover.id, trip("t1")).await);
    in_t1.drain();
    in_t2.drain();
    mover.drain();

    let outcome = assert_ok!(hub.join(mover.id, trip("t2")).await);

    assert_eq!(outcome.left_room, Some(trip("t1")));
    assert!(outcome.announced);
    assert!(!assert_ok!(hub.members_of(trip("t1")).await).contains(&UserId::from("m")));
    assert!(assert_ok!(hub.members_of(trip("t2")).await).contains(&UserId::from("m")));
    assert_event_names!(in_t1.drain(), ["trip:userLeft"]);
    assert_event_names!(in_t2.drain(), ["trip:userJoined"]);
    assert_matches!(
        mover.drain().as_slice(),
        [ServerEvent::TripJoined(snapshot)] if snapshot.trip_id == trip("t2")
    );
}

#[tokio::test]
async fn test_activity_mutation_reaches_room_with_actor_info() {
    let hub = RealtimeHub::spawn();
    let mut actor = HubPeer::connect(&hub, "a");
    let mut viewer = HubPeer::connect(&hub, "v");
    let mut elsewhere = HubPeer::connect(&hub, "e");
    assert_ok!(hub.join(actor.id, trip("t")).await);
    assert_ok!(hub.join(viewer.id, trip("t")).await);
    assert_ok!(hub.join(elsewhere.id, trip("other")).await);
    actor.drain();
    viewer.drain();
    elsewhere.drain();

    let envelope = EventEnvelope::activity(
        trip("t"),
        UserId::from("a"),
        "Ana",
        MutationKind::Updated,
        serde_json::json!({"id": "act-1", "title": "Museum"}),
        "day-2",
    )
    .with_notification_hint(true);
    let publisher: &dyn EventPublisher = &hub;
    assert_ok!(publisher.publish(envelope));
    assert_ok!(hub.snapshot(trip("t")).await);

    assert!(actor.drain().is_empty());
    assert!(elsewhere.drain().is_empty());
    assert_matches!(
        viewer.drain().as_slice(),
        [ServerEvent::ActivityUpdated(change)]
            if change.trip_day_id == "day-2"
                && change.actor.actor_name == "Ana"
                && change.actor.suppress_notification
    );
}
