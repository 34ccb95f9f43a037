//! Server Module
//!
//! This module contains the code that initializes and configures the Axum
//! HTTP server.
//!
//! # Architecture
//!
//! - **`state`** - Application state structure and `FromRef` implementations
//! - **`config`** - Environment configuration and database loading
//! - **`init`** - Server initialization and app creation
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - ServerConfig, load_database
//! └── init.rs         - build_state, create_app
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Configuration Loading**: `ServerConfig::from_env`, then the database
//! 2. **Hub Start**: the realtime hub task is spawned
//! 3. **Router Creation**: routes and tracing middleware
//!
//! # Example
//!
//! ```rust,no_run
//! use tripsync::backend::server::{create_app, ServerConfig};
//!
//! # async fn example() {
//! let app = create_app(ServerConfig::from_env()).await;
//! # }
//! ```

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use config::ServerConfig;
pub use init::{build_state, create_app};
pub use state::AppState;
