//! Property-based tests for inbound frame validation

use proptest::prelude::*;
use serde_json::{json, Value};
use tripsync::shared::{ClientEvent, IncomingFrame, TripId};

proptest! {
    #[test]
    fn test_arbitrary_text_never_panics(text in ".*") {
        if let Ok(frame) = IncomingFrame::parse(&text) {
            let _ = frame.decode();
        }
    }

    #[test]
    fn test_arbitrary_payload_never_panics(
        event in prop_oneof![
            Just("trip:join"),
            Just("trip:leave"),
            Just("chat:sendMessage"),
            Just("chat:typing"),
        ],
        key in "[a-zA-Z]{0,10}",
        value in ".*",
    ) {
        let mut data = serde_json::Map::new();
        data.insert(key, Value::String(value));
        let frame = IncomingFrame {
            event: event.to_string(),
            data: Value::Object(data),
            ack_id: None,
        };
        let _ = frame.decode();
    }

    #[test]
    fn test_trip_id_is_trimmed_for_every_event(id in "[a-z0-9-]{1,24}", pad in " {0,3}") {
        let text = json!({"event": "trip:join", "data": {"tripId": format!("{pad}{id}{pad}")}})
            .to_string();
        let frame = IncomingFrame::parse(&text).unwrap();
        prop_assert_eq!(frame.decode().unwrap(), ClientEvent::Join(TripId::new(id.clone())));

        let bare = json!({"event": "trip:join", "data": id.clone()}).to_string();
        let frame = IncomingFrame::parse(&bare).unwrap();
        prop_assert_eq!(frame.decode().unwrap(), ClientEvent::Join(TripId::new(id.clone())));

        let chat = json!({
            "event": "chat:sendMessage",
            "data": {"tripId": format!("{pad}{id}{pad}"), "content": "hi"},
        })
        .to_string();
        match IncomingFrame::parse(&chat).unwrap().decode().unwrap() {
            ClientEvent::SendMessage(message) => prop_assert_eq!(message.trip_id, TripId::new(id.clone())),
            other => prop_assert!(false, "unexpected event {:?}", other),
        }

        let typing = json!({
            "event": "chat:typing",
            "data": {"tripId": format!("{pad}{id}{pad}"), "isTyping": true},
        })
        .to_string();
        match IncomingFrame::parse(&typing).unwrap().decode().unwrap() {
            ClientEvent::Typing(input) => prop_assert_eq!(input.trip_id, TripId::new(id)),
            other => prop_assert!(false, "unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_blank_trip_id_is_rejected(pad in " {0,5}") {
        let text = json!({"event": "trip:leave", "data": {"tripId": pad}}).to_string();
        let frame = IncomingFrame::parse(&text).unwrap();
        prop_assert!(frame.decode().is_err());
    }
}
