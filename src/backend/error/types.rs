/**
 * Backend Error Types
 *
 * This module defines error types specific to the realtime server.
 * The same enum serves REST hooks (converted to HTTP responses) and socket
 * handlers (converted to an `error` frame).
 *
 * # Error Categories
 *
 * ## Authentication
 *
 * No valid session at connect time. Fatal to a realtime connection.
 *
 * ## Authorization
 *
 * Valid user, but not a member of the trip. Rejects the single request;
 * the connection stays alive.
 *
 * ## Protocol Violations
 *
 * Malformed payloads, e.g. a join without a trip id. Rejected with an
 * `error` frame; the connection stays alive.
 *
 * ## State Errors
 *
 * The realtime hub is unavailable or the connection went away while a
 * request was in flight.
 */

use thiserror::Error;
use axum::http::StatusCode;
use crate::shared::{ServerEvent, SharedError};

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use tripsync::backend::error::BackendError;
///
/// let err = BackendError::authorization("not a member of this trip");
/// assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// No valid session
    #[error("Authentication failed: {message}")]
    AuthenticationFailure {
        /// Human-readable error message
        message: String,
    },

    /// Valid session, insufficient access to the trip
    #[error("Not authorized: {message}")]
    AuthorizationFailure {
        /// Human-readable error message
        message: String,
    },

    /// Malformed request payload
    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        /// Human-readable error message
        message: String,
    },

    /// Handler error with an explicit status
    #[error("Handler error: {message}")]
    HandlerError {
        /// HTTP status code for this error
        status: StatusCode,
        /// Human-readable error message
        message: String,
    },

    /// Realtime state could not be reached
    #[error("State error: {message}")]
    StateError {
        /// Human-readable error message
        message: String,
    },

    /// The connection disconnected while its request was in flight
    #[error("Connection is no longer active")]
    ConnectionGone,

    /// Trip store failure
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Shared error (frame decoding and validation)
    #[error(transparent)]
    SharedError(#[from] SharedError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BackendError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::AuthenticationFailure {
            message: message.into(),
        }
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::AuthorizationFailure {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    pub fn handler(status: StatusCode, message: impl Into<String>) -> Self {
        Self::HandlerError {
            status,
            message: message.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::StateError {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `AuthenticationFailure` - 401 Unauthorized
    /// - `AuthorizationFailure` - 403 Forbidden
    /// - `ProtocolViolation` / `SharedError` - 400 Bad Request
    /// - `HandlerError` - Uses the status code from the error
    /// - `ConnectionGone` - 410 Gone
    /// - everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Self::AuthorizationFailure { .. } => StatusCode::FORBIDDEN,
            Self::ProtocolViolation { .. } => StatusCode::BAD_REQUEST,
            Self::HandlerError { status, .. } => *status,
            Self::StateError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConnectionGone => StatusCode::GONE,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SharedError(_) => StatusCode::BAD_REQUEST,
            Self::SerializationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to a client
    ///
    /// Store and serialization failures are not described to the peer.
    pub fn message(&self) -> String {
        match self {
            Self::AuthenticationFailure { message }
            | Self::AuthorizationFailure { message }
            | Self::ProtocolViolation { message }
            | Self::HandlerError { message, .. }
            | Self::StateError { message } => message.clone(),
            Self::ConnectionGone => self.to_string(),
            Self::SharedError(err) => err.to_string(),
            Self::Store(_) | Self::SerializationError(_) => "Internal server error".to_string(),
        }
    }

    /// Whether the realtime connection must be closed after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthenticationFailure { .. })
    }

    /// Wire frame sent in place of a failed handler
    pub fn to_error_event(&self) -> ServerEvent {
        ServerEvent::error(self.message())
    }
}
