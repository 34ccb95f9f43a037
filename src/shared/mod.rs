//! Shared Module
//!
//! This module contains types that are shared between the realtime server and
//! its clients: identifiers, the wire protocol, and the errors raised while
//! decoding it.
//!
//! # Overview
//!
//! Nothing in here depends on the `ssr` feature, so client code can reuse the
//! exact frame definitions the server emits.

/// Trip, user and connection identifiers
pub mod ids;

/// Realtime wire protocol
pub mod event;

/// Shared error types
pub mod error;

/// Client configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use ids::{ConnectionId, TripId, UserId};
pub use event::{ClientEvent, IncomingFrame, ServerEvent};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
