//! Backend Error Module
//!
//! This module defines error types specific to the realtime server.
//!
//! # Architecture
//!
//! - **`types`** - Error type definitions and constructors
//! - **`conversion`** - `IntoResponse` for REST hooks
//!
//! Socket handlers convert the same errors into an `error` frame with
//! [`BackendError::to_error_event`].

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::BackendError;
