/**
 * Realtime Hub
 *
 * The hub is a single tokio task that owns the [`RoomManager`]. Every
 * connection event (connect, join, leave, disconnect) and every publish is
 * sent to it as a [`HubCommand`] and applied in arrival order, so registry
 * mutations never interleave.
 *
 * Socket tasks and REST handlers talk to the hub through a cloneable
 * [`RealtimeHandle`]. Commands that need an answer carry a oneshot reply;
 * the rest are fire-and-forget.
 *
 * # Suspension Points
 *
 * A join is authorized against the trip store before it reaches the hub.
 * By the time the command is applied the connection may already be gone;
 * the room manager checks liveness and answers `ConnectionGone` without
 * touching the registry.
 */

use std::collections::BTreeSet;
use tokio::sync::{mpsc, oneshot};

use crate::backend::auth::SessionUser;
use crate::backend::error::BackendError;
use crate::backend::realtime::connection::OutboundSender;
use crate::backend::realtime::dispatcher::{DeliveryReport, EventEnvelope};
use crate::backend::realtime::rooms::{JoinOutcome, RoomManager};
use crate::shared::event::TripSnapshot;
use crate::shared::{ConnectionId, ServerEvent, TripId, UserId};

/// Where domain mutations are pushed for fan-out
///
/// REST mutation handlers receive this as an injected dependency.
pub trait EventPublisher: Send + Sync {
    /// Fan an envelope out to its trip room
    fn publish(&self, envelope: EventEnvelope) -> Result<(), BackendError>;

    /// Deliver an event on a user's private channel
    fn notify_user(&self, user_id: &UserId, event: ServerEvent) -> Result<(), BackendError>;
}

/// Requests processed by the hub task
#[derive(Debug)]
pub enum HubCommand {
    Connect {
        connection_id: ConnectionId,
        user: SessionUser,
        outbound: OutboundSender,
    },
    Join {
        connection_id: ConnectionId,
        trip_id: TripId,
        reply: oneshot::Sender<Result<JoinOutcome, BackendError>>,
    },
    Leave {
        connection_id: ConnectionId,
        trip_id: TripId,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Publish {
        envelope: EventEnvelope,
    },
    PublishFrom {
        origin: ConnectionId,
        envelope: EventEnvelope,
        reply: oneshot::Sender<Result<DeliveryReport, BackendError>>,
    },
    NotifyUser {
        user_id: UserId,
        event: ServerEvent,
    },
    Snapshot {
        trip_id: TripId,
        reply: oneshot::Sender<TripSnapshot>,
    },
    IsPresent {
        trip_id: TripId,
        user_id: UserId,
        reply: oneshot::Sender<bool>,
    },
}

pub struct RealtimeHub {
    rooms: RoomManager,
    commands: mpsc::UnboundedReceiver<HubCommand>,
}

impl RealtimeHub {
    /// Start the hub task and return a handle to it
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn() -> RealtimeHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = RealtimeHub {
            rooms: RoomManager::new(),
            commands: rx,
        };
        tokio::spawn(hub.run());
        tracing::info!("[Realtime] Hub started");
        RealtimeHandle { commands: tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.apply(command);
        }
        tracing::info!("[Realtime] Hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect {
                connection_id,
                user,
                outbound,
            } => {
                if !self
                    .rooms
                    .connect(connection_id, user.user_id, user.display_name, outbound)
                {
                    tracing::warn!(connection_id = %connection_id, "[Realtime] Duplicate connection id ignored");
                }
            }
            HubCommand::Join {
                connection_id,
                trip_id,
                reply,
            } => {
                let result = self.rooms.join(connection_id, trip_id);
                // The requester may have gone away; its cleanup is already queued
                let _ = reply.send(result);
            }
            HubCommand::Leave {
                connection_id,
                trip_id,
            } => {
                self.rooms.leave(connection_id, &trip_id);
            }
            HubCommand::Disconnect { connection_id } => {
                self.rooms.disconnect(connection_id);
            }
            HubCommand::Publish { envelope } => {
                self.rooms.publish(envelope);
            }
            HubCommand::PublishFrom {
                origin,
                envelope,
                reply,
            } => {
                let _ = reply.send(self.rooms.publish_from(origin, envelope));
            }
            HubCommand::NotifyUser { user_id, event } => {
                self.rooms.notify_user(&user_id, event);
            }
            HubCommand::Snapshot { trip_id, reply } => {
                let _ = reply.send(self.rooms.snapshot(&trip_id));
            }
            HubCommand::IsPresent {
                trip_id,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.rooms.is_present(&trip_id, &user_id));
            }
        }
    }
}

/// Cloneable handle to the hub task
#[derive(Debug, Clone)]
pub struct RealtimeHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl RealtimeHandle {
    fn send(&self, command: HubCommand) -> Result<(), BackendError> {
        self.commands
            .send(command)
            .map_err(|_| BackendError::state("Realtime hub is not running"))
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> HubCommand,
    ) -> Result<T, BackendError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx))?;
        rx.await
            .map_err(|_| BackendError::state("Realtime hub dropped the request"))
    }

    /// Register an authenticated connection (state `Unjoined`)
    pub fn connect(
        &self,
        connection_id: ConnectionId,
        user: SessionUser,
        outbound: OutboundSender,
    ) -> Result<(), BackendError> {
        self.send(HubCommand::Connect {
            connection_id,
            user,
            outbound,
        })
    }

    /// Join a trip room; the snapshot is queued to the connection before
    /// this returns
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        trip_id: TripId,
    ) -> Result<JoinOutcome, BackendError> {
        self.request(|reply| HubCommand::Join {
            connection_id,
            trip_id,
            reply,
        })
        .await?
    }

    pub fn leave(&self, connection_id: ConnectionId, trip_id: TripId) -> Result<(), BackendError> {
        self.send(HubCommand::Leave {
            connection_id,
            trip_id,
        })
    }

    /// Queue room cleanup and removal of the connection record
    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<(), BackendError> {
        self.send(HubCommand::Disconnect { connection_id })
    }

    /// Publish on behalf of a connection that must be joined to the trip
    pub async fn publish_from(
        &self,
        origin: ConnectionId,
        envelope: EventEnvelope,
    ) -> Result<DeliveryReport, BackendError> {
        self.request(|reply| HubCommand::PublishFrom {
            origin,
            envelope,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self, trip_id: TripId) -> Result<TripSnapshot, BackendError> {
        self.request(|reply| HubCommand::Snapshot { trip_id, reply })
            .await
    }

    pub async fn members_of(&self, trip_id: TripId) -> Result<BTreeSet<UserId>, BackendError> {
        let snapshot = self.snapshot(trip_id).await?;
        Ok(snapshot.connected_user_ids.into_iter().collect())
    }

    pub async fn is_present(&self, trip_id: TripId, user_id: UserId) -> Result<bool, BackendError> {
        self.request(|reply| HubCommand::IsPresent {
            trip_id,
            user_id,
            reply,
        })
        .await
    }
}

impl EventPublisher for RealtimeHandle {
    fn publish(&self, envelope: EventEnvelope) -> Result<(), BackendError> {
        self.send(HubCommand::Publish { envelope })
    }

    fn notify_user(&self, user_id: &UserId, event: ServerEvent) -> Result<(), BackendError> {
        self.send(HubCommand::NotifyUser {
            user_id: user_id.clone(),
            event,
        })
    }
}
