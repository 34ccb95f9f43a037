//! Authentication Module
//!
//! Session token validation shared by the REST hooks and the realtime
//! connection gate. Issuing sessions (login, signup) belongs to the REST
//! layer; this crate only verifies them.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - JWT session tokens and cookie extraction
//! ```

/// Session token verification
pub mod sessions;

pub use sessions::{Claims, SessionKeys, SessionUser, DEFAULT_SESSION_TTL};
