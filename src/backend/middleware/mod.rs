//! Middleware Module
//!
//! Request processing shared by REST hooks.
//!
//! - **`auth`** - Session extractor for protected routes

pub mod auth;

pub use auth::AuthUser;
