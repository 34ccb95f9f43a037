/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * all route configurations into a single Axum router.
 *
 * # Route Order
 *
 * 1. Realtime upgrade (`GET /ws`)
 * 2. API routes (trip hooks)
 * 3. Health check
 * 4. Fallback handler (404)
 */

use axum::{http::StatusCode, response::Json, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::backend::realtime::ws_upgrade;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router with all routes configured
///
/// # Route Details
///
/// - `GET /ws` - Realtime WebSocket (session cookie or bearer token)
/// - `POST /api/trips/{trip_id}/events` - Publish a committed mutation
/// - `GET /api/trips/{trip_id}/presence` - Connected users of a trip
/// - `GET /api/trips/{trip_id}/presence/{user_id}` - Presence of one user
/// - `GET /health` - Liveness probe
pub fn create_router(app_state: AppState) -> Router<()> {
    let router = Router::new().route("/ws", get(ws_upgrade));

    let router = configure_api_routes(router);

    router
        .route("/health", get(health))
        .fallback(|| async { (StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
