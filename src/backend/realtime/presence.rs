/**
 * Presence Registry
 *
 * In-memory map of trip -> user -> live connection ids. A user is present in
 * a trip while at least one of their connections is joined to it, so closing
 * one of two tabs does not make the user disappear for everyone else.
 *
 * # Invariants
 *
 * - An entry for `(trip, user)` exists only while its connection set is
 *   non-empty. Empty sets and empty trips are removed immediately.
 * - A connection id appears in at most one entry across the registry.
 *
 * `add` and `remove` report presence transitions (absent -> present and
 * present -> absent). Those transitions, not individual connections, decide
 * whether a join or leave is announced.
 */

use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

use crate::shared::{ConnectionId, TripId, UserId};

/// Effect of a registry mutation on a user's presence in a trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The user went from zero to one connection in the trip
    Arrived,
    /// The user's last connection in the trip was removed
    Departed,
    /// Connection count changed (or not) without crossing zero
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("connection {connection_id} is already registered in trip {trip_id}")]
    ConnectionElsewhere {
        connection_id: ConnectionId,
        trip_id: TripId,
    },
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    trips: HashMap<TripId, HashMap<UserId, HashSet<ConnectionId>>>,
    /// Reverse index enforcing one entry per connection
    locations: HashMap<ConnectionId, (TripId, UserId)>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user in a trip
    ///
    /// Adding the same triple twice is a no-op; only the first call can
    /// report [`Transition::Arrived`]. A connection registered under a
    /// different trip or user must be removed first.
    pub fn add(
        &mut self,
        trip_id: &TripId,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<Transition, RegistryError> {
        if let Some((existing_trip, existing_user)) = self.locations.get(&connection_id) {
            if existing_trip == trip_id && existing_user == user_id {
                return Ok(Transition::Unchanged);
            }
            return Err(RegistryError::ConnectionElsewhere {
                connection_id,
                trip_id: existing_trip.clone(),
            });
        }

        let connections = self
            .trips
            .entry(trip_id.clone())
            .or_default()
            .entry(user_id.clone())
            .or_default();
        let arrived = connections.is_empty();
        connections.insert(connection_id);
        self.locations
            .insert(connection_id, (trip_id.clone(), user_id.clone()));

        Ok(if arrived {
            Transition::Arrived
        } else {
            Transition::Unchanged
        })
    }

    /// Remove a connection for a user from a trip
    ///
    /// Safe to call for entries that are already gone. Returns
    /// [`Transition::Departed`] only when this call removed the user's last
    /// connection to the trip.
    pub fn remove(
        &mut self,
        trip_id: &TripId,
        user_id: &UserId,
        connection_id: ConnectionId,
    ) -> Transition {
        match self.locations.get(&connection_id) {
            Some((t, u)) if t == trip_id && u == user_id => {}
            _ => return Transition::Unchanged,
        }
        self.locations.remove(&connection_id);

        let Some(users) = self.trips.get_mut(trip_id) else {
            return Transition::Unchanged;
        };
        let Some(connections) = users.get_mut(user_id) else {
            return Transition::Unchanged;
        };

        connections.remove(&connection_id);
        if !connections.is_empty() {
            return Transition::Unchanged;
        }

        users.remove(user_id);
        if users.is_empty() {
            self.trips.remove(trip_id);
        }
        Transition::Departed
    }

    /// Distinct users with at least one connection in the trip
    pub fn members_of(&self, trip_id: &TripId) -> BTreeSet<UserId> {
        self.trips
            .get(trip_id)
            .map(|users| users.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_present(&self, trip_id: &TripId, user_id: &UserId) -> bool {
        self.trips
            .get(trip_id)
            .is_some_and(|users| users.contains_key(user_id))
    }

    /// Every connection joined to the trip, across all users
    pub fn connections_in(&self, trip_id: &TripId) -> impl Iterator<Item = ConnectionId> + '_ {
        self.trips
            .get(trip_id)
            .into_iter()
            .flat_map(|users| users.values())
            .flat_map(|connections| connections.iter().copied())
    }

    pub fn connection_count(&self, trip_id: &TripId, user_id: &UserId) -> usize {
        self.trips
            .get(trip_id)
            .and_then(|users| users.get(user_id))
            .map_or(0, HashSet::len)
    }

    /// Trip and user a connection is registered under, if any
    pub fn location_of(&self, connection_id: ConnectionId) -> Option<&(TripId, UserId)> {
        self.locations.get(&connection_id)
    }

    /// Number of trips with at least one present user
    pub fn active_trips(&self) -> usize {
        self.trips.len()
    }
}
