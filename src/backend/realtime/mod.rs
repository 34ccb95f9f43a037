//! Real-time Collaboration Module
//!
//! This module implements the trip rooms behind `GET /ws`: who is looking at
//! which trip, and delivery of trip mutations to everyone else looking at it.
//!
//! # Architecture
//!
//! The realtime module is organized into focused submodules:
//!
//! - **`gate`** - Authenticates the upgrade request with the REST session
//! - **`socket`** - Per-connection reader/writer tasks and frame dispatch
//! - **`hub`** - Single task that applies connection events in order
//! - **`rooms`** - Join/leave/disconnect state machine, sole registry writer
//! - **`presence`** - trip -> user -> connection ids
//! - **`connection`** - Connection records and per-user private channels
//! - **`dispatcher`** - Event envelopes and room fan-out
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs          - Module exports and documentation
//! ├── gate.rs         - GET /ws upgrade handler
//! ├── socket.rs       - Connection task, keepalive, disconnect guard
//! ├── hub.rs          - RealtimeHub task and RealtimeHandle
//! ├── rooms.rs        - RoomManager
//! ├── presence.rs     - PresenceRegistry
//! ├── connection.rs   - Connection, ConnectionTable
//! └── dispatcher.rs   - EventEnvelope, publish
//! ```
//!
//! # Presence
//!
//! A user may hold several connections (tabs, devices). Presence is tracked
//! per connection but announced per user: `trip:userJoined` when the first
//! connection joins, `trip:userLeft` when the last one leaves or disconnects.
//!
//! # Delivery
//!
//! Each connection has a bounded outbound queue. Fan-out never waits: a full
//! or closed queue drops the frame for that recipient only.

pub mod connection;
pub mod dispatcher;
pub mod gate;
pub mod hub;
pub mod presence;
pub mod rooms;
pub mod socket;

pub use dispatcher::{EnvelopePayload, EventEnvelope, EventType, MutationKind};
pub use gate::ws_upgrade;
pub use hub::{EventPublisher, RealtimeHandle, RealtimeHub};
pub use presence::{PresenceRegistry, Transition};
pub use rooms::{JoinOutcome, RoomManager};
pub use socket::SocketSettings;
