//! Backend Module
//!
//! This module contains all server-side code for tripsync: the realtime
//! collaboration layer of the trip planner and the HTTP surface around it.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`server`** - Server initialization, application state, configuration
//! - **`routes`** - HTTP route configuration and router assembly
//! - **`realtime`** - Connection gate, presence, rooms, fan-out
//! - **`trips`** - Trip store seam and REST mutation hooks
//! - **`auth`** - Session tokens shared with the REST layer
//! - **`middleware`** - Session extractor for REST hooks
//! - **`error`** - Backend-specific error types
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── realtime/       - WebSocket rooms and presence
//! ├── trips/          - Membership store and REST hooks
//! ├── auth/           - Session tokens
//! ├── middleware/     - Request extractors
//! └── error/          - Error types
//! ```
//!
//! # Request Flow
//!
//! The REST layer establishes a session cookie. `GET /ws` reuses it: the gate
//! resolves the user, the socket task registers the connection with the hub,
//! and the client joins the trip it is viewing. REST handlers publish their
//! committed mutations through `POST /api/trips/{trip_id}/events`, which
//! fans them out to the trip room.
//!
//! # Thread Safety
//!
//! Presence and room state live inside a single hub task and are never
//! shared. Everything else in `AppState` is a cloneable handle.

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

/// Real-time rooms and presence
pub mod realtime;

/// Trip store and REST hooks
pub mod trips;

/// Backend error types
pub mod error;

/// Session tokens
pub mod auth;

/// Middleware for request processing
pub mod middleware;

pub use error::BackendError;
pub use realtime::{EventEnvelope, EventPublisher, RealtimeHandle, RealtimeHub};
pub use server::{create_app, AppState, ServerConfig};
