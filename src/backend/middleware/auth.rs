/**
 * Authentication Extractor
 *
 * Protects REST hooks that require a session. The extractor runs the same
 * session validation as the realtime connection gate and hands the resolved
 * user to the handler.
 */

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::backend::auth::sessions::SessionUser;
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

/// Axum extractor for the authenticated session user
///
/// Rejects with 401 when the request carries no valid session.
#[derive(Clone, Debug)]
pub struct AuthUser(pub SessionUser);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = BackendError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = state.session_keys.authenticate(&parts.headers).map_err(|e| {
            tracing::warn!("[Auth] Rejected {} {}: {}", parts.method, parts.uri.path(), e);
            e
        })?;
        Ok(AuthUser(user))
    }
}
