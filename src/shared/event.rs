/**
 * Realtime Wire Protocol
 *
 * This module defines the frames exchanged over the realtime channel.
 * Every frame is a JSON text message of the form
 * `{"event": "<name>", "data": <payload>, "ackId": <n>?}`.
 *
 * Client frames are decoded in two steps: the outer `IncomingFrame` is parsed
 * first so that the `ackId` is known even when the payload turns out to be
 * malformed, then `IncomingFrame::decode` validates the payload for the named
 * event. Server frames are a closed, adjacently tagged enum.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::ids::{TripId, UserId};

/// Upper bound on chat message content, in characters
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Event names used on the wire
pub mod names {
    pub const TRIP_JOIN: &str = "trip:join";
    pub const TRIP_LEAVE: &str = "trip:leave";
    pub const CHAT_SEND_MESSAGE: &str = "chat:sendMessage";
    pub const CHAT_TYPING: &str = "chat:typing";
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// A decoded client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// `trip:join`
    Join(TripId),
    /// `trip:leave`
    Leave(TripId),
    /// `chat:sendMessage`
    SendMessage(SendMessage),
    /// `chat:typing`
    Typing(TypingInput),
}

/// Payload of `chat:sendMessage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub trip_id: TripId,
    pub content: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
}

/// Payload of `chat:typing`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingInput {
    pub trip_id: TripId,
    pub is_typing: bool,
    #[serde(default)]
    pub name: String,
}

fn default_message_type() -> String {
    "text".to_string()
}

/// Outer shape of a client frame, before the payload is validated
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(rename = "ackId", default)]
    pub ack_id: Option<u64>,
}

/// `trip:join` accepts either a bare string or `{ "tripId": "..." }`
#[derive(Deserialize)]
#[serde(untagged)]
enum TripRef {
    Bare(String),
    Object {
        #[serde(rename = "tripId")]
        trip_id: String,
    },
}

impl IncomingFrame {
    /// Parse the outer frame from a text message
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Validate the payload for the named event
    pub fn decode(&self) -> Result<ClientEvent, SharedError> {
        match self.event.as_str() {
            names::TRIP_JOIN => Ok(ClientEvent::Join(trip_ref(&self.event, &self.data)?)),
            names::TRIP_LEAVE => Ok(ClientEvent::Leave(trip_ref(&self.event, &self.data)?)),
            names::CHAT_SEND_MESSAGE => {
                let mut message: SendMessage = serde_json::from_value(self.data.clone())?;
                message.trip_id = normalized_trip_id(&self.event, &message.trip_id)?;
                let trimmed = message.content.trim();
                if trimmed.is_empty() {
                    return Err(SharedError::validation("content", "message content is empty"));
                }
                if trimmed.chars().count() > MAX_MESSAGE_LEN {
                    return Err(SharedError::validation(
                        "content",
                        format!("message exceeds {} characters", MAX_MESSAGE_LEN),
                    ));
                }
                message.content = trimmed.to_string();
                Ok(ClientEvent::SendMessage(message))
            }
            names::CHAT_TYPING => {
                let mut typing: TypingInput = serde_json::from_value(self.data.clone())?;
                typing.trip_id = normalized_trip_id(&self.event, &typing.trip_id)?;
                Ok(ClientEvent::Typing(typing))
            }
            other => Err(SharedError::unknown_event(other)),
        }
    }
}

fn trip_ref(event: &str, data: &Value) -> Result<TripId, SharedError> {
    match serde_json::from_value::<TripRef>(data.clone()) {
        Ok(TripRef::Bare(id)) | Ok(TripRef::Object { trip_id: id }) => {
            normalized_trip_id(event, &TripId::new(id))
        }
        Err(_) => Err(missing_trip_id(event)),
    }
}

/// Trimmed trip id; every event addresses rooms by the same key
fn normalized_trip_id(event: &str, trip_id: &TripId) -> Result<TripId, SharedError> {
    let trimmed = trip_id.as_str().trim();
    if trimmed.is_empty() {
        return Err(missing_trip_id(event));
    }
    Ok(TripId::new(trimmed))
}

fn missing_trip_id(event: &str) -> SharedError {
    SharedError::validation("tripId", format!("{} requires a tripId", event))
}

impl ClientEvent {
    /// Wire name of this request
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => names::TRIP_JOIN,
            Self::Leave(_) => names::TRIP_LEAVE,
            Self::SendMessage(_) => names::CHAT_SEND_MESSAGE,
            Self::Typing(_) => names::CHAT_TYPING,
        }
    }

    /// Trip this request targets
    pub fn trip_id(&self) -> &TripId {
        match self {
            Self::Join(trip_id) | Self::Leave(trip_id) => trip_id,
            Self::SendMessage(message) => &message.trip_id,
            Self::Typing(typing) => &typing.trip_id,
        }
    }

    /// Encode as a text frame, optionally requesting an acknowledgement
    pub fn to_text(&self, ack_id: Option<u64>) -> Result<String, SharedError> {
        let data = match self {
            Self::Join(trip_id) | Self::Leave(trip_id) => serde_json::to_value(trip_id)?,
            Self::SendMessage(message) => serde_json::to_value(message)?,
            Self::Typing(typing) => serde_json::to_value(typing)?,
        };
        let mut frame = serde_json::json!({
            "event": self.name(),
            "data": data,
        });
        if let Some(id) = ack_id {
            frame["ackId"] = Value::from(id);
        }
        Ok(serde_json::to_string(&frame)?)
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Full presence snapshot, sent only to the joining connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub trip_id: TripId,
    pub connected_user_ids: Vec<UserId>,
}

/// Incremental presence change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: UserId,
    pub trip_id: TripId,
    pub timestamp: String,
}

impl PresenceChange {
    pub fn now(user_id: UserId, trip_id: TripId) -> Self {
        Self {
            user_id,
            trip_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// A chat message as stored by the trip store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageRecord {
    pub id: Uuid,
    pub trip_id: TripId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub created_at: DateTime<Utc>,
}

/// Typing indicator as seen by other participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingState {
    pub user_id: UserId,
    pub trip_id: TripId,
    pub is_typing: bool,
    pub name: String,
}

/// Who performed a mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorInfo {
    pub actor_id: UserId,
    pub actor_name: String,
    /// UI hint: render silently, without a toast or badge
    #[serde(default)]
    pub suppress_notification: bool,
}

/// Itinerary activity mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityChange {
    pub activity: Value,
    pub trip_day_id: String,
    #[serde(flatten)]
    pub actor: ActorInfo,
}

/// Expense mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseChange {
    pub expense: Value,
    #[serde(flatten)]
    pub actor: ActorInfo,
}

/// Direct, trip-independent notification that the user was invited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripInvitation {
    pub trip_id: TripId,
    pub invited_by: UserId,
    pub invited_by_name: String,
}

/// Reply to a client frame that carried an `ackId`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    pub ack_id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AckPayload {
    pub fn ok(ack_id: u64, data: Option<Value>) -> Self {
        Self {
            ack_id,
            ok: true,
            data,
            error: None,
        }
    }

    pub fn failed(ack_id: u64, error: impl Into<String>) -> Self {
        Self {
            ack_id,
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// Every frame the server can send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "trip:joined")]
    TripJoined(TripSnapshot),
    #[serde(rename = "trip:userJoined")]
    UserJoined(PresenceChange),
    #[serde(rename = "trip:userLeft")]
    UserLeft(PresenceChange),
    #[serde(rename = "chat:newMessage")]
    NewMessage(ChatMessageRecord),
    #[serde(rename = "chat:userTyping")]
    UserTyping(TypingState),
    #[serde(rename = "activity:created")]
    ActivityCreated(ActivityChange),
    #[serde(rename = "activity:updated")]
    ActivityUpdated(ActivityChange),
    #[serde(rename = "activity:deleted")]
    ActivityDeleted(ActivityChange),
    #[serde(rename = "activity:expense:created")]
    ExpenseCreated(ExpenseChange),
    #[serde(rename = "activity:expense:updated")]
    ExpenseUpdated(ExpenseChange),
    #[serde(rename = "activity:expense:deleted")]
    ExpenseDeleted(ExpenseChange),
    #[serde(rename = "trip:invited")]
    TripInvited(TripInvitation),
    #[serde(rename = "ack")]
    Ack(AckPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Wire name of this frame
    pub fn name(&self) -> &'static str {
        match self {
            Self::TripJoined(_) => "trip:joined",
            Self::UserJoined(_) => "trip:userJoined",
            Self::UserLeft(_) => "trip:userLeft",
            Self::NewMessage(_) => "chat:newMessage",
            Self::UserTyping(_) => "chat:userTyping",
            Self::ActivityCreated(_) => "activity:created",
            Self::ActivityUpdated(_) => "activity:updated",
            Self::ActivityDeleted(_) => "activity:deleted",
            Self::ExpenseCreated(_) => "activity:expense:created",
            Self::ExpenseUpdated(_) => "activity:expense:updated",
            Self::ExpenseDeleted(_) => "activity:expense:deleted",
            Self::TripInvited(_) => "trip:invited",
            Self::Ack(_) => "ack",
            Self::Error(_) => "error",
        }
    }

    pub fn to_text(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_text(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}
