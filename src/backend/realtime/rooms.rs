/**
 * Room Transition Manager
 *
 * Owns the connection table and the presence registry and is their only
 * writer. Each connection is in exactly one of:
 *
 * - `Unjoined` - record exists, `current_room` is `None`
 * - `InRoom(trip)` - record exists, registered in the registry for `trip`
 * - `Terminated` - record removed
 *
 * # Transitions
 *
 * - `join(T)` from `Unjoined`: register, send the snapshot to the joiner,
 *   announce `trip:userJoined` to the rest of the room on the user's first
 *   connection.
 * - `join(T)` from `InRoom(T)`: resend the snapshot only.
 * - `join(T2)` from `InRoom(T1)`: leave `T1` first, then join `T2`.
 * - `leave(T)` from `InRoom(T)`: unregister, announce `trip:userLeft` when the
 *   user's last connection left.
 * - `disconnect`: leave the current room, then discard the record.
 */

use std::collections::BTreeSet;

use crate::backend::error::BackendError;
use crate::backend::realtime::connection::{Connection, ConnectionTable, OutboundSender};
use crate::backend::realtime::dispatcher::{self, DeliveryReport, EventEnvelope};
use crate::backend::realtime::presence::{PresenceRegistry, Transition};
use crate::shared::event::TripSnapshot;
use crate::shared::{ConnectionId, ServerEvent, TripId, UserId};

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub snapshot: TripSnapshot,
    /// Room implicitly left to make this join possible
    pub left_room: Option<TripId>,
    /// Whether this join made the user present in the trip
    pub announced: bool,
}

#[derive(Debug, Default)]
pub struct RoomManager {
    connections: ConnectionTable,
    registry: PresenceRegistry,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an authenticated connection in the `Unjoined` state
    pub fn connect(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        display_name: impl Into<String>,
        outbound: OutboundSender,
    ) -> bool {
        let inserted = self.connections.insert(Connection::new(
            connection_id,
            user_id.clone(),
            display_name,
            outbound,
        ));
        if inserted {
            tracing::info!(
                connection_id = %connection_id,
                user_id = %user_id,
                connections = self.connections.len(),
                "[Realtime] Connection registered"
            );
        }
        inserted
    }

    /// Join a trip room, leaving any other room first
    ///
    /// Fails with [`BackendError::ConnectionGone`] when the connection was torn
    /// down while the request was in flight; nothing is mutated in that case.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        trip_id: TripId,
    ) -> Result<JoinOutcome, BackendError> {
        let current = self
            .connections
            .get(connection_id)
            .ok_or(BackendError::ConnectionGone)?
            .current_room()
            .cloned();

        if current.as_ref() == Some(&trip_id) {
            let snapshot = self.snapshot(&trip_id);
            self.send_to(connection_id, ServerEvent::TripJoined(snapshot.clone()));
            tracing::debug!(
                connection_id = %connection_id,
                trip_id = %trip_id,
                "[Realtime] Repeated join, snapshot resent"
            );
            return Ok(JoinOutcome {
                snapshot,
                left_room: None,
                announced: false,
            });
        }

        let left_room = match current {
            Some(previous) => {
                self.leave_room(connection_id, &previous);
                Some(previous)
            }
            None => None,
        };

        let (user_id, display_name) = {
            let connection = self
                .connections
                .get(connection_id)
                .ok_or(BackendError::ConnectionGone)?;
            (connection.user_id().clone(), connection.display_name().to_string())
        };

        let transition = self
            .registry
            .add(&trip_id, &user_id, connection_id)
            .map_err(|e| BackendError::state(e.to_string()))?;
        if let Some(connection) = self.connections.get_mut(connection_id) {
            connection.set_current_room(Some(trip_id.clone()));
        }

        let snapshot = self.snapshot(&trip_id);
        self.send_to(connection_id, ServerEvent::TripJoined(snapshot.clone()));

        let announced = transition == Transition::Arrived;
        if announced {
            let envelope = EventEnvelope::presence_joined(trip_id.clone(), user_id.clone(), display_name);
            dispatcher::publish(&self.connections, &self.registry, envelope, Some(connection_id));
        }

        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            trip_id = %trip_id,
            first_connection = announced,
            "[Realtime] Joined trip"
        );

        Ok(JoinOutcome {
            snapshot,
            left_room,
            announced,
        })
    }

    /// Leave a trip room
    ///
    /// A no-op (returning false) when the connection is unknown, unjoined, or
    /// joined to a different trip.
    pub fn leave(&mut self, connection_id: ConnectionId, trip_id: &TripId) -> bool {
        let in_room = self
            .connections
            .get(connection_id)
            .and_then(Connection::current_room)
            == Some(trip_id);
        if !in_room {
            return false;
        }
        self.leave_room(connection_id, trip_id);
        true
    }

    /// Tear down a connection: leave its room, then discard the record
    ///
    /// Returns false if the connection was already gone.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> bool {
        let current = match self.connections.get(connection_id) {
            Some(connection) => connection.current_room().cloned(),
            None => return false,
        };
        if let Some(trip_id) = current {
            self.leave_room(connection_id, &trip_id);
        }
        if let Some(connection) = self.connections.remove(connection_id) {
            tracing::info!(
                connection_id = %connection_id,
                user_id = %connection.user_id(),
                connections = self.connections.len(),
                "[Realtime] Connection removed"
            );
        }
        true
    }

    /// Fan an envelope out to its trip room
    pub fn publish(&self, envelope: EventEnvelope) -> DeliveryReport {
        dispatcher::publish(&self.connections, &self.registry, envelope, None)
    }

    /// Publish on behalf of a connection, which must be joined to the trip
    pub fn publish_from(
        &self,
        origin: ConnectionId,
        envelope: EventEnvelope,
    ) -> Result<DeliveryReport, BackendError> {
        let connection = self
            .connections
            .get(origin)
            .ok_or(BackendError::ConnectionGone)?;
        if connection.current_room() != Some(&envelope.trip_id) {
            return Err(BackendError::authorization(format!(
                "Join trip {} before sending events to it",
                envelope.trip_id
            )));
        }
        Ok(self.publish(envelope))
    }

    /// Deliver on a user's private channel
    pub fn notify_user(&self, user_id: &UserId, event: ServerEvent) -> DeliveryReport {
        dispatcher::notify_user(&self.connections, user_id, event)
    }

    pub fn members_of(&self, trip_id: &TripId) -> BTreeSet<UserId> {
        self.registry.members_of(trip_id)
    }

    pub fn is_present(&self, trip_id: &TripId, user_id: &UserId) -> bool {
        self.registry.is_present(trip_id, user_id)
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&TripId> {
        self.connections.get(connection_id)?.current_room()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn snapshot(&self, trip_id: &TripId) -> TripSnapshot {
        TripSnapshot {
            trip_id: trip_id.clone(),
            connected_user_ids: self.registry.members_of(trip_id).into_iter().collect(),
        }
    }

    /// Unregister from `trip_id` and announce a departure if it was the last
    /// connection of the user
    fn leave_room(&mut self, connection_id: ConnectionId, trip_id: &TripId) {
        let Some(connection) = self.connections.get_mut(connection_id) else {
            return;
        };
        connection.set_current_room(None);
        let user_id = connection.user_id().clone();
        let display_name = connection.display_name().to_string();

        let transition = self.registry.remove(trip_id, &user_id, connection_id);
        if transition == Transition::Departed {
            let envelope = EventEnvelope::presence_left(trip_id.clone(), user_id.clone(), display_name);
            dispatcher::publish(&self.connections, &self.registry, envelope, None);
        }

        tracing::info!(
            connection_id = %connection_id,
            user_id = %user_id,
            trip_id = %trip_id,
            last_connection = transition == Transition::Departed,
            "[Realtime] Left trip"
        );
    }

    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(connection) = self.connections.get(connection_id) {
            if let Err(failure) = connection.deliver(event) {
                tracing::warn!(
                    connection_id = %connection_id,
                    ?failure,
                    "[Realtime] Could not queue snapshot"
                );
            }
        }
    }
}
