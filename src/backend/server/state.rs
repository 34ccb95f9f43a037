/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct serves as the central state container, holding:
 * - Server configuration
 * - Session keys shared by the REST extractor and the connection gate
 * - The realtime hub handle
 * - The event publisher REST hooks push mutations into
 * - The trip store
 *
 * Everything in it is cheap to clone: handles, `Arc`s and small values.
 */

use std::sync::Arc;

use axum::extract::FromRef;

use crate::backend::auth::SessionKeys;
use crate::backend::realtime::{EventPublisher, RealtimeHandle};
use crate::backend::server::config::ServerConfig;
use crate::backend::trips::TripStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Session validation used by both `AuthUser` and the connection gate
    pub session_keys: SessionKeys,

    /// Handle to the hub task that owns presence and room state
    pub realtime: RealtimeHandle,

    /// Fan-out seam for REST mutation hooks
    ///
    /// In production this is the same hub as `realtime`.
    pub publisher: Arc<dyn EventPublisher>,

    /// Membership checks and chat persistence
    pub store: Arc<dyn TripStore>,
}

impl AppState {
    /// State whose publisher is the realtime hub itself
    pub fn new(
        config: ServerConfig,
        realtime: RealtimeHandle,
        store: Arc<dyn TripStore>,
    ) -> Self {
        let session_keys = SessionKeys::new(config.jwt_secret.clone(), config.cookie_name.clone());
        Self {
            config: Arc::new(config),
            session_keys,
            publisher: Arc::new(realtime.clone()),
            realtime,
            store,
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session_keys.clone()
    }
}

impl FromRef<AppState> for RealtimeHandle {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.realtime.clone()
    }
}

impl FromRef<AppState> for Arc<dyn TripStore> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}
