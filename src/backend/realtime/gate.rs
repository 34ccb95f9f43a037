/**
 * Connection Gate
 *
 * Entry point of `GET /ws`. The session is resolved from the request headers
 * with the same [`SessionKeys::authenticate`] the REST extractor uses, before
 * any handler runs and exactly once per connection.
 *
 * Browsers cannot read the HTTP status of a failed WebSocket handshake, so an
 * unauthenticated request is still upgraded, receives a single `error` frame
 * and is closed with code 4001. It is never registered with the hub.
 *
 * [`SessionKeys::authenticate`]: crate::backend::auth::SessionKeys::authenticate
 */

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;

use crate::backend::auth::{SessionKeys, SessionUser};
use crate::backend::error::BackendError;
use crate::backend::realtime::socket::{reject_connection, run_connection};
use crate::backend::server::state::AppState;

/// Resolve the connecting user, or the authentication error that ends the
/// connection
pub fn admit(keys: &SessionKeys, headers: &HeaderMap) -> Result<SessionUser, BackendError> {
    keys.authenticate(headers)
}

/// GET /ws
pub async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    match admit(&state.session_keys, &headers) {
        Ok(user) => {
            tracing::info!(user_id = %user.user_id, "[Gate] Connection authenticated");
            let realtime = state.realtime.clone();
            let store = state.store.clone();
            let settings = state.config.socket;
            ws.on_upgrade(move |socket| run_connection(socket, user, realtime, store, settings))
        }
        Err(err) => {
            tracing::warn!("[Gate] Connection rejected: {}", err);
            ws.on_upgrade(move |socket| reject_connection(socket, err))
        }
    }
}
