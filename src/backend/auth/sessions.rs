/**
 * Session Tokens
 *
 * The REST layer issues a signed session token (JWT) and stores it in the
 * session cookie. This module validates that token. REST hooks and the
 * realtime connection gate both call [`SessionKeys::authenticate`], so a
 * realtime connection is accepted exactly when the same request would be
 * accepted by the REST layer.
 */

use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::error::BackendError;
use crate::shared::UserId;

/// Session token lifetime used by [`SessionKeys::create_token`] callers
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Display name (optional for tokens minted before names existed)
    #[serde(default)]
    pub name: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// The user a session resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: UserId,
    pub display_name: String,
}

/// Signing material and cookie name for session tokens
#[derive(Clone)]
pub struct SessionKeys {
    secret: String,
    cookie_name: String,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(secret: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Create a session token for a user
    pub fn create_token(
        &self,
        user_id: &UserId,
        name: Option<&str>,
        ttl: Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: user_id.to_string(),
            name: name.map(str::to_string),
            exp: now + ttl.as_secs(),
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
    }

    /// Verify and decode a session token
    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    /// Resolve request headers to the session user
    ///
    /// The session cookie is preferred; an `Authorization: Bearer` header is
    /// accepted for non-browser clients.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<SessionUser, BackendError> {
        let token = session_token(headers, &self.cookie_name)
            .ok_or_else(|| BackendError::authentication("missing session"))?;

        let claims = self.verify_token(token).map_err(|e| {
            tracing::warn!("[Auth] Invalid session token: {:?}", e.kind());
            BackendError::authentication("invalid or expired session")
        })?;

        if claims.sub.trim().is_empty() {
            return Err(BackendError::authentication("session has no subject"));
        }

        let user_id = UserId::new(claims.sub);
        let display_name = claims
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| user_id.to_string());

        Ok(SessionUser {
            user_id,
            display_name,
        })
    }
}

/// Find the session token in the cookie header, falling back to a bearer token
fn session_token<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}
