/**
 * API Route Handlers
 *
 * Trip hooks called by the REST layer and by clients that need presence
 * outside a socket.
 *
 * # Routes
 *
 * - `POST /api/trips/{trip_id}/events` - Publish a mutation (requires session)
 * - `GET /api/trips/{trip_id}/presence` - Snapshot of connected users
 * - `GET /api/trips/{trip_id}/presence/{user_id}` - Is the user present
 */

use axum::routing::{get, post};
use axum::Router;

use crate::backend::server::state::AppState;
use crate::backend::trips::{get_trip_presence, get_user_presence, publish_trip_mutation};

/// Configure API routes
///
/// Every route here authenticates with `AuthUser` and checks trip
/// membership, answering 401 and 403 respectively.
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/trips/{trip_id}/events", post(publish_trip_mutation))
        .route("/api/trips/{trip_id}/presence", get(get_trip_presence))
        .route(
            "/api/trips/{trip_id}/presence/{user_id}",
            get(get_user_presence),
        )
}
