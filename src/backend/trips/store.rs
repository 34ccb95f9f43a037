/**
 * Trip Store
 *
 * The realtime layer does not own trips. It asks the store two things:
 * whether a user may see a trip, and to persist a chat message before it is
 * broadcast. Two implementations exist:
 *
 * - [`PgTripStore`] - reads `trip_members` and writes `trip_chat_messages`
 *   in PostgreSQL (tables created by the migrations in `migrations/`)
 * - [`InMemoryTripStore`] - used when `DATABASE_URL` is not set, and in tests
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::shared::event::ChatMessageRecord;
use crate::shared::{TripId, UserId};

/// A chat message about to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChatMessage {
    pub trip_id: TripId,
    pub user_id: UserId,
    pub user_name: String,
    pub content: String,
    pub message_type: String,
}

impl NewChatMessage {
    fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> ChatMessageRecord {
        ChatMessageRecord {
            id,
            trip_id: self.trip_id,
            user_id: self.user_id,
            user_name: self.user_name,
            content: self.content,
            message_type: self.message_type,
            created_at,
        }
    }
}

/// Membership and chat persistence consulted by the realtime layer
pub trait TripStore: Send + Sync {
    /// Whether `user_id` may join `trip_id`
    fn is_member<'a>(
        &'a self,
        trip_id: &'a TripId,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<bool, BackendError>>;

    /// Persist a chat message and return the stored record
    fn save_chat_message(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'_, Result<ChatMessageRecord, BackendError>>;
}

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgTripStore {
    pool: PgPool,
}

impl PgTripStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TripStore for PgTripStore {
    fn is_member<'a>(
        &'a self,
        trip_id: &'a TripId,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(async move {
            let exists = sqlx::query_scalar::<_, bool>(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM trip_members
                    WHERE trip_id = $1 AND user_id = $2
                )
                "#,
            )
            .bind(trip_id.as_str())
            .bind(user_id.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        })
    }

    fn save_chat_message(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'_, Result<ChatMessageRecord, BackendError>> {
        Box::pin(async move {
            let id = Uuid::new_v4();
            let created_at = sqlx::query_scalar::<_, DateTime<Utc>>(
                r#"
                INSERT INTO trip_chat_messages (id, trip_id, user_id, user_name, content, message_type, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, NOW())
                RETURNING created_at
                "#,
            )
            .bind(id)
            .bind(message.trip_id.as_str())
            .bind(message.user_id.as_str())
            .bind(&message.user_name)
            .bind(&message.content)
            .bind(&message.message_type)
            .fetch_one(&self.pool)
            .await?;

            tracing::debug!(message_id = %id, trip_id = %message.trip_id, "[Trips] Chat message stored");
            Ok(message.into_record(id, created_at))
        })
    }
}

/// Who may join a trip held by [`InMemoryTripStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipPolicy {
    /// Every authenticated user is a member of every trip
    Open,
    /// Only users added with [`InMemoryTripStore::add_member`]
    Listed,
}

#[derive(Debug, Default)]
struct InMemoryTrips {
    members: HashMap<TripId, HashSet<UserId>>,
    messages: Vec<ChatMessageRecord>,
}

/// Process-local store
#[derive(Debug, Clone)]
pub struct InMemoryTripStore {
    policy: MembershipPolicy,
    inner: Arc<RwLock<InMemoryTrips>>,
}

impl InMemoryTripStore {
    pub fn new(policy: MembershipPolicy) -> Self {
        Self {
            policy,
            inner: Arc::new(RwLock::new(InMemoryTrips::default())),
        }
    }

    pub fn open() -> Self {
        Self::new(MembershipPolicy::Open)
    }

    pub fn listed() -> Self {
        Self::new(MembershipPolicy::Listed)
    }

    pub async fn add_member(&self, trip_id: TripId, user_id: UserId) {
        self.inner
            .write()
            .await
            .members
            .entry(trip_id)
            .or_default()
            .insert(user_id);
    }

    /// Stored messages for a trip, oldest first
    pub async fn messages(&self, trip_id: &TripId) -> Vec<ChatMessageRecord> {
        self.inner
            .read()
            .await
            .messages
            .iter()
            .filter(|message| &message.trip_id == trip_id)
            .cloned()
            .collect()
    }
}

impl TripStore for InMemoryTripStore {
    fn is_member<'a>(
        &'a self,
        trip_id: &'a TripId,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<bool, BackendError>> {
        Box::pin(async move {
            if self.policy == MembershipPolicy::Open {
                return Ok(true);
            }
            Ok(self
                .inner
                .read()
                .await
                .members
                .get(trip_id)
                .is_some_and(|members| members.contains(user_id)))
        })
    }

    fn save_chat_message(
        &self,
        message: NewChatMessage,
    ) -> BoxFuture<'_, Result<ChatMessageRecord, BackendError>> {
        Box::pin(async move {
            let record = message.into_record(Uuid::new_v4(), Utc::now());
            self.inner.write().await.messages.push(record.clone());
            Ok(record)
        })
    }
}
