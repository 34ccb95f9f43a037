//! tripsync - Realtime Collaboration Layer
//!
//! Live presence and event fan-out for a collaborative trip planner. Users
//! viewing the same trip see who else is there, and see chat messages,
//! itinerary and expense changes as they happen.
//!
//! # Module Structure
//!
//! - **`shared`** - Types shared between server and clients
//!   - Trip, user and connection identifiers
//!   - Wire protocol frames and their validation
//!   - Client configuration
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Axum server with the `/ws` realtime endpoint
//!   - Presence registry, trip rooms, event dispatcher
//!   - Trip store (PostgreSQL or in-memory) and REST hooks
//!
//! - **`client`** - Presence reconciliation for realtime clients
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables the backend modules and server binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use tripsync::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() {
//! let app = create_app(ServerConfig::from_env()).await;
//! // Serve with axum::serve
//! # }
//! ```
//!
//! # Wire Protocol
//!
//! JSON text frames `{"event": name, "data": payload, "ackId"?: n}`:
//!
//! - Client: `trip:join`, `trip:leave`, `chat:sendMessage`, `chat:typing`
//! - Server: `trip:joined`, `trip:userJoined`, `trip:userLeft`,
//!   `chat:newMessage`, `chat:userTyping`, `activity:*`,
//!   `activity:expense:*`, `trip:invited`, `ack`, `error`

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;

/// Client-side presence reconciliation
pub mod client;
