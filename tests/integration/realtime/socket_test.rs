//! End-to-end tests over real WebSocket connections

use assert_matches::assert_matches;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tripsync::backend::realtime::SocketSettings;
use tripsync::backend::server::ServerConfig;
use tripsync::backend::trips::InMemoryTripStore;
use tripsync::shared::event::SendMessage;
use tripsync::shared::{ClientEvent, ServerEvent, TripId, UserId};

use crate::common::{cookie_for, test_config, TestServer, WsClient};

fn trip(id: &str) -> TripId {
    TripId::from(id)
}

async fn member_store(members: &[(&str, &str)]) -> InMemoryTripStore {
    let store = InMemoryTripStore::listed();
    for (trip_id, user) in members {
        store.add_member(trip(trip_id), UserId::from(*user)).await;
    }
    store
}

#[tokio::test]
async fn test_connection_without_session_is_closed_with_4001() {
    let server = TestServer::start(InMemoryTripStore::open()).await;
    let mut client = WsClient::connect(&server.ws_url(), None).await;

    assert_matches!(client.recv().await, ServerEvent::Error(payload) if payload.message.contains("session"));
    let frame = client.recv_close().await.expect("Expected a close frame");
    assert_eq!(u16::from(frame.code), 4001);
}

#[tokio::test]
async fn test_join_sends_snapshot_and_ack() {
    let server = TestServer::start(member_store(&[("t", "alice")]).await).await;
    let mut alice = WsClient::connect(&server.ws_url(), Some(&cookie_for("alice"))).await;

    let ack_id = alice.send(ClientEvent::Join(trip("t"))).await;

    assert_matches!(
        alice.recv().await,
        ServerEvent::TripJoined(snapshot) if snapshot.connected_user_ids == vec![UserId::from("alice")]
    );
    assert_matches!(alice.recv().await, ServerEvent::Ack(ack) if ack.ack_id == ack_id && ack.ok);
}

#[tokio::test]
async fn test_join_without_membership_keeps_connection_alive() {
    let server = TestServer::start(member_store(&[("mine", "alice")]).await).await;
    let mut alice = WsClient::connect(&server.ws_url(), Some(&cookie_for("alice"))).await;

    let rejected = alice.send(ClientEvent::Join(trip("theirs"))).await;
    assert_matches!(alice.recv().await, ServerEvent::Error(_));
    assert_matches!(alice.recv().await, ServerEvent::Ack(ack) if ack.ack_id == rejected && !ack.ok);

    alice.send(ClientEvent::Join(trip("mine"))).await;
    assert_matches!(alice.recv().await, ServerEvent::TripJoined(_));
    assert!(server
        .state
        .realtime
        .members_of(trip("theirs"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let server = TestServer::start(InMemoryTripStore::open()).await;
    let mut alice = WsClient::connect(&server.ws_url(), Some(&cookie_for("alice"))).await;

    alice.send_raw(r#"{"event":"trip:join","data":{}}"#).await;
    assert_matches!(alice.recv().await, ServerEvent::Error(payload) if payload.message.contains("tripId"));

    alice.send(ClientEvent::Join(trip("t"))).await;
    assert_matches!(alice.recv().await, ServerEvent::TripJoined(_));
}

#[tokio::test]
async fn test_two_user_chat() {
    let server = TestServer::start(member_store(&[("t", "alice"), ("t", "bob")]).await).await;
    let url = server.ws_url();
    let mut alice = WsClient::connect(&url, Some(&cookie_for("alice"))).await;
    let mut alice_tab = WsClient::connect(&url, Some(&cookie_for("alice"))).await;
    let mut bob = WsClient::connect(&url, Some(&cookie_for("bob"))).await;

    alice.send(ClientEvent::Join(trip("t"))).await;
    alice.recv_named("ack").await;
    alice_tab.send(ClientEvent::Join(trip("t"))).await;
    alice_tab.recv_named("ack").await;
    bob.send(ClientEvent::Join(trip("t"))).await;
    assert_matches!(
        bob.recv().await,
        ServerEvent::TripJoined(snapshot) if snapshot.connected_user_ids.len() == 2
    );
    bob.recv_named("ack").await;
    alice.recv_named("trip:userJoined").await;
    alice_tab.recv_named("trip:userJoined").await;

    let ack_id = alice
        .send(ClientEvent::SendMessage(SendMessage {
            trip_id: trip("t"),
            content: "Meet at the station".to_string(),
            message_type: "text".to_string(),
        }))
        .await;

    assert_matches!(
        bob.recv().await,
        ServerEvent::NewMessage(record)
            if record.content == "Meet at the station" && record.user_id == UserId::from("alice")
    );
    assert_matches!(alice.recv().await, ServerEvent::Ack(ack) if ack.ack_id == ack_id && ack.ok);
    alice_tab.expect_silence().await;
}

#[tokio::test]
async fn test_closing_tabs_emits_single_leave() {
    let server = TestServer::start(InMemoryTripStore::open()).await;
    let url = server.ws_url();
    let mut watcher = WsClient::connect(&url, Some(&cookie_for("watcher"))).await;
    watcher.send(ClientEvent::Join(trip("t"))).await;
    watcher.recv_named("ack").await;

    let mut tab1 = WsClient::connect(&url, Some(&cookie_for("u"))).await;
    let mut tab2 = WsClient::connect(&url, Some(&cookie_for("u"))).await;
    tab1.send(ClientEvent::Join(trip("t"))).await;
    tab1.recv_named("ack").await;
    tab2.send(ClientEvent::Join(trip("t"))).await;
    tab2.recv_named("ack").await;
    watcher.recv_named("trip:userJoined").await;

    tab1.close().await;
    watcher.expect_silence().await;
    assert!(server
        .state
        .realtime
        .is_present(trip("t"), UserId::from("u"))
        .await
        .unwrap());

    tab2.close().await;
    assert_matches!(
        watcher.recv().await,
        ServerEvent::UserLeft(change) if change.user_id == UserId::from("u")
    );
}

#[tokio::test]
async fn test_typing_before_join_is_rejected() {
    let server = TestServer::start(InMemoryTripStore::open()).await;
    let mut alice = WsClient::connect(&server.ws_url(), Some(&cookie_for("alice"))).await;

    alice
        .send_raw(r#"{"event":"chat:typing","data":{"tripId":"t","isTyping":true}}"#)
        .await;
    assert_matches!(alice.recv().await, ServerEvent::Error(_));
}

#[tokio::test]
async fn test_unresponsive_connection_leaves_after_pong_timeout() {
    let config = ServerConfig {
        socket: SocketSettings {
            ping_interval: Duration::from_millis(300),
            pong_timeout: Duration::from_millis(300),
            ..SocketSettings::default()
        },
        ..test_config()
    };
    let server = TestServer::start_with(InMemoryTripStore::open(), config).await;
    let url = server.ws_url();

    let mut watcher = WsClient::connect(&url, Some(&cookie_for("watcher"))).await;
    watcher.send(ClientEvent::Join(trip("t"))).await;
    watcher.recv_named("ack").await;

    // Stops reading after its ack, so pings go unanswered
    let mut ghost = WsClient::connect(&url, Some(&cookie_for("ghost"))).await;
    ghost.send(ClientEvent::Join(trip("t"))).await;
    ghost.recv_named("ack").await;

    assert_matches!(
        watcher.recv_named("trip:userLeft").await,
        ServerEvent::UserLeft(change) if change.user_id == UserId::from("ghost")
    );
    assert!(!server
        .state
        .realtime
        .is_present(trip("t"), UserId::from("ghost"))
        .await
        .unwrap());
    drop(ghost);
}
