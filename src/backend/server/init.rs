/**
 * Server Initialization
 *
 * This module handles the initialization and setup of the Axum HTTP server,
 * including state creation, database loading, and route configuration.
 *
 * # Initialization Process
 *
 * 1. Load the optional database and pick the trip store
 * 2. Start the realtime hub task
 * 3. Create the application state
 * 4. Create and configure the router
 */

use std::sync::Arc;

use axum::Router;

use crate::backend::realtime::RealtimeHub;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_database, ServerConfig};
use crate::backend::server::state::AppState;
use crate::backend::trips::{InMemoryTripStore, PgTripStore, TripStore};

/// Build the application state
///
/// Without a reachable database the in-memory store knows no members, so
/// every join is rejected unless `open_membership` is set for development.
pub async fn build_state(config: ServerConfig) -> AppState {
    let store: Arc<dyn TripStore> = match load_database(config.database_url.as_deref()).await {
        Some(pool) => Arc::new(PgTripStore::new(pool)),
        None if config.open_membership => {
            tracing::warn!("Using the in-memory trip store with open membership; do not deploy this.");
            Arc::new(InMemoryTripStore::open())
        }
        None => {
            tracing::warn!("Using the in-memory trip store; trip joins will be rejected");
            Arc::new(InMemoryTripStore::listed())
        }
    };

    let realtime = RealtimeHub::spawn();
    AppState::new(config, realtime, store)
}

/// Create and configure the Axum application
pub async fn create_app(config: ServerConfig) -> Router<()> {
    tracing::info!("Initializing tripsync realtime server");

    let app_state = build_state(config).await;
    let app = create_router(app_state);

    tracing::info!("Router configured");
    app
}
