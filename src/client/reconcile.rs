/**
 * Presence Reconciliation
 *
 * Client-side view of who is looking at the current trip. The tracker does
 * no I/O: the transport feeds it connection changes and server frames, and
 * sends whatever [`Outgoing`] frames it returns.
 *
 * # Rules
 *
 * - Every (re)connect re-joins the trip being viewed; the server forgets
 *   room membership with the old connection.
 * - A `trip:joined` snapshot replaces the local member set.
 * - `trip:userJoined` / `trip:userLeft` patch it until the next snapshot.
 * - No answer to a join within `join_ack_timeout`: presence is unknown and
 *   [`PresenceTracker::visible_members`] returns `None`.
 */

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::shared::config::AppConfig;
use crate::shared::event::TripSnapshot;
use crate::shared::{ClientEvent, ServerEvent, SharedError, TripId, UserId};

/// Whether presence can be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    /// Not connected, nothing viewed, join rejected, or join timed out
    Unknown,
    /// Join sent, waiting for the snapshot
    Pending,
    /// Snapshot received; member set is current
    Known,
}

/// A frame the transport must send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub event: ClientEvent,
    pub ack_id: Option<u64>,
}

impl Outgoing {
    pub fn to_text(&self) -> Result<String, SharedError> {
        self.event.to_text(self.ack_id)
    }
}

#[derive(Debug)]
pub struct PresenceTracker {
    join_ack_timeout: Duration,
    connected: bool,
    trip: Option<TripId>,
    status: PresenceStatus,
    members: BTreeSet<UserId>,
    next_ack_id: u64,
    /// Ack id and send time of the outstanding join
    pending_join: Option<(u64, Instant)>,
}

impl PresenceTracker {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_timeout(config.join_ack_timeout)
    }

    pub fn with_timeout(join_ack_timeout: Duration) -> Self {
        Self {
            join_ack_timeout,
            connected: false,
            trip: None,
            status: PresenceStatus::Unknown,
            members: BTreeSet::new(),
            next_ack_id: 1,
            pending_join: None,
        }
    }

    pub fn status(&self) -> PresenceStatus {
        self.status
    }

    pub fn trip(&self) -> Option<&TripId> {
        self.trip.as_ref()
    }

    /// Members to render, or `None` when presence UI must be hidden
    pub fn visible_members(&self) -> Option<&BTreeSet<UserId>> {
        (self.status == PresenceStatus::Known).then_some(&self.members)
    }

    /// The transport connected (first time or after a drop)
    pub fn on_connected(&mut self, now: Instant) -> Option<Outgoing> {
        self.connected = true;
        self.join_current(now)
    }

    /// The transport dropped; the server has already forgotten our room
    pub fn on_disconnected(&mut self) {
        self.connected = false;
        self.reset();
    }

    /// Start viewing a trip, leaving the previous one
    pub fn view_trip(&mut self, trip_id: TripId, now: Instant) -> Vec<Outgoing> {
        if self.trip.as_ref() == Some(&trip_id) {
            return Vec::new();
        }
        let mut frames = Vec::new();
        if let Some(previous) = self.trip.take() {
            if self.connected {
                frames.push(Outgoing {
                    event: ClientEvent::Leave(previous),
                    ack_id: None,
                });
            }
        }
        self.reset();
        self.trip = Some(trip_id);
        frames.extend(self.join_current(now));
        frames
    }

    /// Stop viewing any trip
    pub fn stop_viewing(&mut self) -> Option<Outgoing> {
        let previous = self.trip.take()?;
        self.reset();
        self.connected.then_some(Outgoing {
            event: ClientEvent::Leave(previous),
            ack_id: None,
        })
    }

    /// Re-issue the join, e.g. after an `error` frame
    pub fn retry_join(&mut self, now: Instant) -> Option<Outgoing> {
        self.join_current(now)
    }

    /// Apply a server frame
    pub fn on_server_event(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::TripJoined(snapshot) => self.apply_snapshot(snapshot),
            ServerEvent::UserJoined(change) if self.tracks(&change.trip_id) => {
                self.members.insert(change.user_id.clone());
            }
            ServerEvent::UserLeft(change) if self.tracks(&change.trip_id) => {
                self.members.remove(&change.user_id);
            }
            ServerEvent::Ack(ack) => {
                let Some((pending_id, _)) = self.pending_join else {
                    return;
                };
                if ack.ack_id != pending_id {
                    return;
                }
                self.pending_join = None;
                if !ack.ok {
                    self.status = PresenceStatus::Unknown;
                    self.members.clear();
                }
            }
            _ => {}
        }
    }

    /// Expire an unanswered join; returns true if presence just became unknown
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.pending_join {
            Some((_, sent_at))
                if self.status == PresenceStatus::Pending
                    && now.saturating_duration_since(sent_at) >= self.join_ack_timeout =>
            {
                self.pending_join = None;
                self.status = PresenceStatus::Unknown;
                true
            }
            _ => false,
        }
    }

    fn join_current(&mut self, now: Instant) -> Option<Outgoing> {
        if !self.connected {
            return None;
        }
        let trip_id = self.trip.clone()?;
        let ack_id = self.next_ack_id;
        self.next_ack_id += 1;
        self.pending_join = Some((ack_id, now));
        self.status = PresenceStatus::Pending;
        Some(Outgoing {
            event: ClientEvent::Join(trip_id),
            ack_id: Some(ack_id),
        })
    }

    fn apply_snapshot(&mut self, snapshot: &TripSnapshot) {
        if !self.connected || self.trip.as_ref() != Some(&snapshot.trip_id) {
            return;
        }
        self.members = snapshot.connected_user_ids.iter().cloned().collect();
        self.status = PresenceStatus::Known;
    }

    fn tracks(&self, trip_id: &TripId) -> bool {
        self.status == PresenceStatus::Known && self.trip.as_ref() == Some(trip_id)
    }

    fn reset(&mut self) {
        self.status = PresenceStatus::Unknown;
        self.members.clear();
        self.pending_join = None;
    }
}
