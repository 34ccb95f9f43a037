//! Shared Error Types
//!
//! This module defines error types that are shared between the server and the
//! client adapter. They describe failures in decoding and validating realtime
//! frames, which both sides parse.
//!
//! # Error Categories
//!
//! - `SerializationError` - JSON serialization/deserialization failures
//! - `ValidationError` - A payload field is missing or out of bounds
//! - `UnknownEvent` - A frame names an event this side does not handle
//!
//! # Usage
//!
//! ```rust
//! use tripsync::shared::error::SharedError;
//!
//! let error = SharedError::validation("tripId", "trip:join requires a tripId");
//! ```
use thiserror::Error;

/// Shared error types that can occur on both ends of the realtime channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// JSON serialization or deserialization error
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
    },

    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// Frame names an event that is not part of the protocol
    #[error("Unknown event: {event}")]
    UnknownEvent {
        /// The event name as received
        event: String,
    },
}

impl SharedError {
    /// Create a new serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new unknown event error
    pub fn unknown_event(event: impl Into<String>) -> Self {
        Self::UnknownEvent {
            event: event.into(),
        }
    }
}

impl From<serde_json::Error> for SharedError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(format!("JSON error: {}", err))
    }
}
