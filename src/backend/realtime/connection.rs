/**
 * Connection Records
 *
 * One record per authenticated socket. The user is fixed when the record is
 * created by the connection gate; the current room is only changed by the
 * room manager. Every record is also attached to its user's private channel,
 * which carries notifications that do not belong to any trip room.
 */

use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::shared::{ConnectionId, ServerEvent, TripId, UserId};

/// Outbound queue of a single connection
pub type OutboundSender = mpsc::Sender<ServerEvent>;

/// Why a frame could not be queued for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The connection's outbound queue is full
    Backpressure,
    /// The connection's writer has gone away
    Closed,
}

#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    display_name: String,
    current_room: Option<TripId>,
    outbound: OutboundSender,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        display_name: impl Into<String>,
        outbound: OutboundSender,
    ) -> Self {
        Self {
            id,
            user_id,
            display_name: display_name.into(),
            current_room: None,
            outbound,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn current_room(&self) -> Option<&TripId> {
        self.current_room.as_ref()
    }

    pub(super) fn set_current_room(&mut self, room: Option<TripId>) {
        self.current_room = room;
    }

    /// Queue a frame without waiting
    pub fn deliver(&self, event: ServerEvent) -> Result<(), DeliveryFailure> {
        self.outbound.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::Backpressure,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }
}

/// All live connections, indexed by id and by user
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<ConnectionId, Connection>,
    user_channels: HashMap<UserId, HashSet<ConnectionId>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record and attach it to its user's private channel
    ///
    /// Returns false if the id was already taken.
    pub fn insert(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(&connection.id) {
            return false;
        }
        self.user_channels
            .entry(connection.user_id.clone())
            .or_default()
            .insert(connection.id);
        self.connections.insert(connection.id, connection);
        true
    }

    /// Discard a record and detach it from its user's private channel
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&connection_id)?;
        if let Some(channel) = self.user_channels.get_mut(&connection.user_id) {
            channel.remove(&connection_id);
            if channel.is_empty() {
                self.user_channels.remove(&connection.user_id);
            }
        }
        Some(connection)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    pub(super) fn get_mut(&mut self, connection_id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&connection_id)
    }

    /// Connections on a user's private channel
    pub fn user_connections(&self, user_id: &UserId) -> impl Iterator<Item = &Connection> + '_ {
        self.user_channels
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
