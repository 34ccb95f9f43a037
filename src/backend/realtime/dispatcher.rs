/**
 * Event Broadcast Dispatcher
 *
 * Fans a domain event envelope out to every connection joined to the
 * envelope's trip.
 *
 * # Exclusion Rules
 *
 * - `suppress_for_actor` skips every connection of the acting user. Mutation
 *   echoes use it because the acting client already has the result from its
 *   own request.
 * - Presence envelopes ignore `suppress_for_actor`: a user's second tab must
 *   still learn that their first tab joined.
 * - The caller may exclude one specific connection (the one that caused a
 *   presence change).
 *
 * Delivery uses `try_send` on each connection's bounded queue. A full or
 * closed queue is logged and skipped; it never affects other recipients and
 * is never retried.
 */

use serde_json::Value;

use crate::backend::realtime::connection::{ConnectionTable, DeliveryFailure};
use crate::backend::realtime::presence::PresenceRegistry;
use crate::shared::event::{
    ActivityChange, ActorInfo, ChatMessageRecord, ExpenseChange, PresenceChange, TypingState,
};
use crate::shared::{ConnectionId, ServerEvent, TripId, UserId};

/// Kind of mutation carried by activity and expense envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    ChatMessage,
    TypingState,
    ActivityCreated,
    ActivityUpdated,
    ActivityDeleted,
    ExpenseCreated,
    ExpenseUpdated,
    ExpenseDeleted,
    PresenceJoined,
    PresenceLeft,
}

/// Event-specific data, one case per event type
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopePayload {
    ChatMessage(ChatMessageRecord),
    Typing(TypingState),
    Activity(MutationKind, ActivityChange),
    Expense(MutationKind, ExpenseChange),
    PresenceJoined(PresenceChange),
    PresenceLeft(PresenceChange),
}

/// The unit of broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub trip_id: TripId,
    pub actor_user_id: UserId,
    pub actor_name: String,
    pub payload: EnvelopePayload,
    pub suppress_for_actor: bool,
    pub suppress_notification_hint: bool,
}

impl EventEnvelope {
    pub fn chat_message(record: ChatMessageRecord) -> Self {
        Self {
            trip_id: record.trip_id.clone(),
            actor_user_id: record.user_id.clone(),
            actor_name: record.user_name.clone(),
            payload: EnvelopePayload::ChatMessage(record),
            suppress_for_actor: true,
            suppress_notification_hint: false,
        }
    }

    pub fn typing(state: TypingState) -> Self {
        Self {
            trip_id: state.trip_id.clone(),
            actor_user_id: state.user_id.clone(),
            actor_name: state.name.clone(),
            payload: EnvelopePayload::Typing(state),
            suppress_for_actor: true,
            suppress_notification_hint: true,
        }
    }

    pub fn activity(
        trip_id: TripId,
        actor_user_id: UserId,
        actor_name: impl Into<String>,
        kind: MutationKind,
        activity: Value,
        trip_day_id: impl Into<String>,
    ) -> Self {
        let actor_name = actor_name.into();
        let change = ActivityChange {
            activity,
            trip_day_id: trip_day_id.into(),
            actor: ActorInfo {
                actor_id: actor_user_id.clone(),
                actor_name: actor_name.clone(),
                suppress_notification: false,
            },
        };
        Self {
            trip_id,
            actor_user_id,
            actor_name,
            payload: EnvelopePayload::Activity(kind, change),
            suppress_for_actor: true,
            suppress_notification_hint: false,
        }
    }

    pub fn expense(
        trip_id: TripId,
        actor_user_id: UserId,
        actor_name: impl Into<String>,
        kind: MutationKind,
        expense: Value,
    ) -> Self {
        let actor_name = actor_name.into();
        let change = ExpenseChange {
            expense,
            actor: ActorInfo {
                actor_id: actor_user_id.clone(),
                actor_name: actor_name.clone(),
                suppress_notification: false,
            },
        };
        Self {
            trip_id,
            actor_user_id,
            actor_name,
            payload: EnvelopePayload::Expense(kind, change),
            suppress_for_actor: true,
            suppress_notification_hint: false,
        }
    }

    pub fn presence_joined(trip_id: TripId, user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            payload: EnvelopePayload::PresenceJoined(PresenceChange::now(
                user_id.clone(),
                trip_id.clone(),
            )),
            trip_id,
            actor_user_id: user_id,
            actor_name: name.into(),
            suppress_for_actor: false,
            suppress_notification_hint: false,
        }
    }

    pub fn presence_left(trip_id: TripId, user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            payload: EnvelopePayload::PresenceLeft(PresenceChange::now(
                user_id.clone(),
                trip_id.clone(),
            )),
            trip_id,
            actor_user_id: user_id,
            actor_name: name.into(),
            suppress_for_actor: false,
            suppress_notification_hint: false,
        }
    }

    pub fn with_notification_hint(mut self, suppress: bool) -> Self {
        self.suppress_notification_hint = suppress;
        self
    }

    pub fn event_type(&self) -> EventType {
        match &self.payload {
            EnvelopePayload::ChatMessage(_) => EventType::ChatMessage,
            EnvelopePayload::Typing(_) => EventType::TypingState,
            EnvelopePayload::Activity(MutationKind::Created, _) => EventType::ActivityCreated,
            EnvelopePayload::Activity(MutationKind::Updated, _) => EventType::ActivityUpdated,
            EnvelopePayload::Activity(MutationKind::Deleted, _) => EventType::ActivityDeleted,
            EnvelopePayload::Expense(MutationKind::Created, _) => EventType::ExpenseCreated,
            EnvelopePayload::Expense(MutationKind::Updated, _) => EventType::ExpenseUpdated,
            EnvelopePayload::Expense(MutationKind::Deleted, _) => EventType::ExpenseDeleted,
            EnvelopePayload::PresenceJoined(_) => EventType::PresenceJoined,
            EnvelopePayload::PresenceLeft(_) => EventType::PresenceLeft,
        }
    }

    pub fn is_presence(&self) -> bool {
        matches!(
            self.payload,
            EnvelopePayload::PresenceJoined(_) | EnvelopePayload::PresenceLeft(_)
        )
    }

    /// Whether this envelope skips connections of its actor
    pub fn skips_actor(&self) -> bool {
        self.suppress_for_actor && !self.is_presence()
    }

    /// Wire frame for recipients
    pub fn into_server_event(self) -> ServerEvent {
        let hint = self.suppress_notification_hint;
        match self.payload {
            EnvelopePayload::ChatMessage(record) => ServerEvent::NewMessage(record),
            EnvelopePayload::Typing(state) => ServerEvent::UserTyping(state),
            EnvelopePayload::Activity(kind, mut change) => {
                change.actor.suppress_notification = hint;
                match kind {
                    MutationKind::Created => ServerEvent::ActivityCreated(change),
                    MutationKind::Updated => ServerEvent::ActivityUpdated(change),
                    MutationKind::Deleted => ServerEvent::ActivityDeleted(change),
                }
            }
            EnvelopePayload::Expense(kind, mut change) => {
                change.actor.suppress_notification = hint;
                match kind {
                    MutationKind::Created => ServerEvent::ExpenseCreated(change),
                    MutationKind::Updated => ServerEvent::ExpenseUpdated(change),
                    MutationKind::Deleted => ServerEvent::ExpenseDeleted(change),
                }
            }
            EnvelopePayload::PresenceJoined(change) => ServerEvent::UserJoined(change),
            EnvelopePayload::PresenceLeft(change) => ServerEvent::UserLeft(change),
        }
    }
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub suppressed: usize,
    pub failed: usize,
}

/// Deliver an envelope to every connection joined to its trip
pub fn publish(
    connections: &ConnectionTable,
    registry: &PresenceRegistry,
    envelope: EventEnvelope,
    exclude: Option<ConnectionId>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    let trip_id = envelope.trip_id.clone();
    let actor = envelope.actor_user_id.clone();
    let skip_actor = envelope.skips_actor();
    let event_type = envelope.event_type();
    let event = envelope.into_server_event();

    for connection_id in registry.connections_in(&trip_id) {
        if exclude == Some(connection_id) {
            continue;
        }
        let Some(connection) = connections.get(connection_id) else {
            continue;
        };
        if skip_actor && connection.user_id() == &actor {
            report.suppressed += 1;
            continue;
        }
        match connection.deliver(event.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.failed += 1;
                log_failure(connection_id, connection.user_id(), failure, event.name());
            }
        }
    }

    tracing::debug!(
        trip_id = %trip_id,
        event_type = ?event_type,
        delivered = report.delivered,
        suppressed = report.suppressed,
        failed = report.failed,
        "[Realtime] Envelope dispatched"
    );
    report
}

/// Deliver a frame on a user's private channel, independent of rooms
pub fn notify_user(connections: &ConnectionTable, user_id: &UserId, event: ServerEvent) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for connection in connections.user_connections(user_id) {
        match connection.deliver(event.clone()) {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.failed += 1;
                log_failure(connection.id(), user_id, failure, event.name());
            }
        }
    }
    report
}

fn log_failure(connection_id: ConnectionId, user_id: &UserId, failure: DeliveryFailure, event: &str) {
    tracing::warn!(
        connection_id = %connection_id,
        user_id = %user_id,
        event,
        ?failure,
        "[Realtime] Dropped frame for connection"
    );
}
