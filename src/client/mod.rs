//! Client Module
//!
//! Transport-agnostic helpers for realtime clients. Not feature gated: it
//! only depends on the shared wire types.
//!
//! - **`reconcile`** - `PresenceTracker`, the rejoin and presence contract

pub mod reconcile;

pub use reconcile::{Outgoing, PresenceStatus, PresenceTracker};
