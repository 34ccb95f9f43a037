//! Trip hooks: authentication, membership and fan-out

use assert_matches::assert_matches;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use tripsync::backend::routes::create_router;
use tripsync::backend::server::AppState;
use tripsync::backend::trips::InMemoryTripStore;
use tripsync::shared::{ServerEvent, TripId, UserId};

use crate::assert_ok;
use crate::common::{cookie_for, test_state, token_for, HubPeer};

async fn setup() -> (Router, AppState) {
    let store = InMemoryTripStore::listed();
    for user in ["alice", "bob"] {
        store.add_member(TripId::from("t"), UserId::from(user)).await;
    }
    let state = test_state(store);
    (create_router(state.clone()), state)
}

fn post_event(cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/api/trips/t/events")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn get(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
        .body(Body::empty())
        .expect("Failed to build request")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

fn activity_body() -> Value {
    json!({
        "kind": "activity",
        "action": "created",
        "activity": {"id": "act-9", "title": "Harbour cruise"},
        "tripDayId": "day-1",
        "silent": true
    })
}

#[tokio::test]
async fn test_publish_requires_session() {
    let (app, _) = setup().await;
    let response = assert_ok!(app.oneshot(post_event(None, activity_body())).await);

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["status"], 401);
}

#[tokio::test]
async fn test_publish_requires_membership() {
    let (app, _) = setup().await;
    let response = assert_ok!(
        app.oneshot(post_event(Some(&cookie_for("mallory")), activity_body()))
            .await
    );
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_published_activity_reaches_other_members() {
    let (app, state) = setup().await;
    let mut alice = HubPeer::connect(&state.realtime, "alice");
    let mut bob = HubPeer::connect(&state.realtime, "bob");
    assert_ok!(state.realtime.join(alice.id, TripId::from("t")).await);
    assert_ok!(state.realtime.join(bob.id, TripId::from("t")).await);
    alice.drain();
    bob.drain();

    let response = assert_ok!(
        app.oneshot(post_event(Some(&cookie_for("alice")), activity_body()))
            .await
    );
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_ok!(state.realtime.snapshot(TripId::from("t")).await);

    assert!(alice.drain().is_empty());
    assert_matches!(
        bob.drain().as_slice(),
        [ServerEvent::ActivityCreated(change)]
            if change.actor.actor_id == UserId::from("alice")
                && change.actor.suppress_notification
                && change.activity["title"] == "Harbour cruise"
    );
}

#[tokio::test]
async fn test_invitation_goes_to_private_channel() {
    let (app, state) = setup().await;
    // Not joined to any trip
    let mut carol = HubPeer::connect(&state.realtime, "carol");

    let body = json!({"kind": "invitation", "userId": "carol"});
    let response = assert_ok!(app.oneshot(post_event(Some(&cookie_for("alice")), body)).await);
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_ok!(state.realtime.snapshot(TripId::from("t")).await);

    assert_matches!(
        carol.drain().as_slice(),
        [ServerEvent::TripInvited(invitation)]
            if invitation.trip_id == TripId::from("t")
                && invitation.invited_by == UserId::from("alice")
    );
}

#[tokio::test]
async fn test_presence_endpoints() {
    let (app, state) = setup().await;
    let bob = HubPeer::connect(&state.realtime, "bob");
    assert_ok!(state.realtime.join(bob.id, TripId::from("t")).await);

    let response = assert_ok!(
        app.clone()
            .oneshot(get("/api/trips/t/presence", "alice"))
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"tripId": "t", "connectedUserIds": ["bob"]})
    );

    let response = assert_ok!(
        app.clone()
            .oneshot(get("/api/trips/t/presence/alice", "alice"))
            .await
    );
    assert_eq!(json_body(response).await["present"], false);

    let response = assert_ok!(app.oneshot(get("/api/trips/t/presence", "mallory")).await);
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_and_fallback() {
    let (app, _) = setup().await;

    let response = assert_ok!(
        app.clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
    );
    assert_eq!(response.status(), StatusCode::OK);

    let response = assert_ok!(
        app.oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
    );
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
