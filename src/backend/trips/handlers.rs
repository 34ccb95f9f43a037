/**
 * Trip REST Hooks
 *
 * The REST layer that owns trips calls these after it has committed a
 * mutation, so that everyone viewing the trip sees it live. The caller's
 * session becomes the actor of the published envelope.
 *
 * # Routes
 *
 * - `POST /api/trips/{trip_id}/events` - publish an activity or expense
 *   mutation to the trip room, or a trip invitation to a user's private
 *   channel
 * - `GET /api/trips/{trip_id}/presence` - users currently viewing the trip
 * - `GET /api/trips/{trip_id}/presence/{user_id}` - whether one user is
 *
 * All routes require a session and membership of the trip.
 */

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthUser;
use crate::backend::realtime::{EventEnvelope, MutationKind};
use crate::backend::server::state::AppState;
use crate::shared::event::{TripInvitation, TripSnapshot};
use crate::shared::{ServerEvent, TripId, UserId};

/// Body of `POST /api/trips/{trip_id}/events`
///
/// ```json
/// { "kind": "activity", "action": "updated", "activity": {...}, "tripDayId": "d1" }
/// { "kind": "expense", "action": "created", "expense": {...}, "silent": true }
/// { "kind": "invitation", "userId": "u42" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TripMutation {
    Activity {
        action: MutationKind,
        activity: Value,
        trip_day_id: String,
        /// Render without a toast on other clients
        #[serde(default)]
        silent: bool,
    },
    Expense {
        action: MutationKind,
        expense: Value,
        #[serde(default)]
        silent: bool,
    },
    Invitation {
        user_id: UserId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPresence {
    pub user_id: UserId,
    pub trip_id: TripId,
    pub present: bool,
}

async fn require_member(state: &AppState, trip_id: &TripId, user_id: &UserId) -> Result<(), BackendError> {
    if state.store.is_member(trip_id, user_id).await? {
        Ok(())
    } else {
        Err(BackendError::authorization(format!(
            "You do not have access to trip {}",
            trip_id
        )))
    }
}

/// POST /api/trips/{trip_id}/events
pub async fn publish_trip_mutation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<TripId>,
    Json(mutation): Json<TripMutation>,
) -> Result<StatusCode, BackendError> {
    require_member(&state, &trip_id, &user.user_id).await?;

    match mutation {
        TripMutation::Activity {
            action,
            activity,
            trip_day_id,
            silent,
        } => {
            let envelope = EventEnvelope::activity(
                trip_id.clone(),
                user.user_id.clone(),
                user.display_name.clone(),
                action,
                activity,
                trip_day_id,
            )
            .with_notification_hint(silent);
            state.publisher.publish(envelope)?;
        }
        TripMutation::Expense {
            action,
            expense,
            silent,
        } => {
            let envelope = EventEnvelope::expense(
                trip_id.clone(),
                user.user_id.clone(),
                user.display_name.clone(),
                action,
                expense,
            )
            .with_notification_hint(silent);
            state.publisher.publish(envelope)?;
        }
        TripMutation::Invitation { user_id } => {
            let invitation = ServerEvent::TripInvited(TripInvitation {
                trip_id: trip_id.clone(),
                invited_by: user.user_id.clone(),
                invited_by_name: user.display_name.clone(),
            });
            state.publisher.notify_user(&user_id, invitation)?;
        }
    }

    tracing::info!(trip_id = %trip_id, actor = %user.user_id, "[Trips] Mutation published");
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/trips/{trip_id}/presence
pub async fn get_trip_presence(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(trip_id): Path<TripId>,
) -> Result<Json<TripSnapshot>, BackendError> {
    require_member(&state, &trip_id, &user.user_id).await?;
    Ok(Json(state.realtime.snapshot(trip_id).await?))
}

/// GET /api/trips/{trip_id}/presence/{user_id}
pub async fn get_user_presence(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path((trip_id, user_id)): Path<(TripId, UserId)>,
) -> Result<Json<UserPresence>, BackendError> {
    require_member(&state, &trip_id, &user.user_id).await?;
    let present = state
        .realtime
        .is_present(trip_id.clone(), user_id.clone())
        .await?;
    Ok(Json(UserPresence {
        user_id,
        trip_id,
        present,
    }))
}
