//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `DocumentStore` and `IdentityService` ports from the core crate. It maps
//! the document paths onto PostgreSQL tables using `sqlx`, and serves live
//! conversation feeds from `LISTEN/NOTIFY`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use messenger_core::domain::{
    ConversationSummary, Message, MessageChange, MessageId, User, UserId,
};
use messenger_core::ports::{
    DocumentStore, IdentityService, MessageChangeStream, PortError, PortResult,
};
use serde::Deserialize;
use sqlx::postgres::PgListener;
use sqlx::{FromRow, PgPool};
use std::collections::HashSet;
use tracing::warn;
use uuid::Uuid;

/// The NOTIFY channel fed by the `messages_notify` trigger.
const CHANGE_CHANNEL: &str = "message_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DocumentStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    uid: String,
    email: String,
    name: String,
    profile_image_url: String,
    language: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: UserId::from(self.uid),
            email: self.email,
            name: self.name,
            profile_image_url: self.profile_image_url,
            language: self.language,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    from_id: String,
    to_id: String,
    text: String,
    sent_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            id: Some(self.id),
            from_id: UserId::from(self.from_id),
            to_id: UserId::from(self.to_id),
            text: self.text,
            timestamp: self.sent_at,
        }
    }
}

#[derive(FromRow)]
struct SummaryRecord {
    owner_id: String,
    counterpart_id: String,
    from_id: String,
    to_id: String,
    text: String,
    sent_at: DateTime<Utc>,
    email: String,
    profile_image_url: String,
}
impl SummaryRecord {
    fn to_domain(self) -> ConversationSummary {
        ConversationSummary {
            owner_id: UserId::from(self.owner_id),
            counterpart_id: UserId::from(self.counterpart_id),
            from_id: UserId::from(self.from_id),
            to_id: UserId::from(self.to_id),
            text: self.text,
            timestamp: self.sent_at,
            counterpart_email: self.email,
            counterpart_profile_image_url: self.profile_image_url,
        }
    }
}

/// Payload written by `notify_message_change()`.
#[derive(Deserialize)]
struct ChangeNotification {
    op: String,
    id: Uuid,
    owner_id: String,
    counterpart_id: String,
}

const SELECT_MESSAGE: &str = "SELECT id, from_id, to_id, text, sent_at FROM messages";

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for DbAdapter {
    async fn get_user(&self, user_id: &UserId) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT uid, email, name, profile_image_url, language FROM users WHERE uid = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn put_user(&self, user: &User) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO users (uid, email, name, profile_image_url, language) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (uid) DO UPDATE SET email = EXCLUDED.email, name = EXCLUDED.name, \
             profile_image_url = EXCLUDED.profile_image_url, language = EXCLUDED.language",
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.profile_image_url)
        .bind(&user.language)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_users_by_email(&self, email: &str) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(
            "SELECT uid, email, name, profile_image_url, language FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(UserRecord::to_domain).collect())
    }

    async fn create_message(
        &self,
        owner: &UserId,
        counterpart: &UserId,
        message: &Message,
    ) -> PortResult<MessageId> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO messages (id, owner_id, counterpart_id, from_id, to_id, text, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(owner.as_str())
        .bind(counterpart.as_str())
        .bind(message.from_id.as_str())
        .bind(message.to_id.as_str())
        .bind(&message.text)
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(id)
    }

    async fn list_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "{} WHERE owner_id = $1 AND counterpart_id = $2 ORDER BY sent_at ASC",
            SELECT_MESSAGE
        ))
        .bind(owner.as_str())
        .bind(counterpart.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn subscribe_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<MessageChangeStream> {
        // Listen before reading the snapshot so no insert falls between the two.
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(unexpected)?;
        listener.listen(CHANGE_CHANNEL).await.map_err(unexpected)?;
        let snapshot = self.list_messages(owner, counterpart).await?;

        let pool = self.pool.clone();
        let owner = owner.clone();
        let counterpart = counterpart.clone();
        let stream = async_stream::stream! {
            let mut seen: HashSet<Uuid> = snapshot.iter().filter_map(|m| m.id).collect();
            for message in snapshot {
                yield Ok(MessageChange::Added(message));
            }
            loop {
                let notification = match listener.recv().await {
                    Ok(notification) => notification,
                    Err(e) => {
                        yield Err(unexpected(e));
                        break;
                    }
                };
                let event: ChangeNotification = match serde_json::from_str(notification.payload()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Ignoring malformed change notification: {}", e);
                        continue;
                    }
                };
                if event.owner_id != owner.as_str() || event.counterpart_id != counterpart.as_str() {
                    continue;
                }
                if event.op == "DELETE" {
                    seen.remove(&event.id);
                    yield Ok(MessageChange::Removed(event.id));
                    continue;
                }
                let query = format!("{} WHERE id = $1", SELECT_MESSAGE);
                let record = match sqlx::query_as::<_, MessageRecord>(&query)
                    .bind(event.id)
                    .fetch_optional(&pool)
                    .await
                {
                    Ok(record) => record,
                    Err(e) => {
                        yield Err(unexpected(e));
                        break;
                    }
                };
                // A row deleted before we read it back produces its own DELETE event.
                let Some(record) = record else { continue };
                let message = record.to_domain();
                if event.op != "INSERT" {
                    yield Ok(MessageChange::Modified(message));
                } else if seen.insert(event.id) {
                    // Inserts racing the snapshot read were already delivered.
                    yield Ok(MessageChange::Added(message));
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn upsert_summary(&self, summary: &ConversationSummary) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO recent_messages \
             (owner_id, counterpart_id, from_id, to_id, text, sent_at, email, profile_image_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (owner_id, counterpart_id) DO UPDATE SET from_id = EXCLUDED.from_id, \
             to_id = EXCLUDED.to_id, text = EXCLUDED.text, sent_at = EXCLUDED.sent_at, \
             email = EXCLUDED.email, profile_image_url = EXCLUDED.profile_image_url",
        )
        .bind(summary.owner_id.as_str())
        .bind(summary.counterpart_id.as_str())
        .bind(summary.from_id.as_str())
        .bind(summary.to_id.as_str())
        .bind(&summary.text)
        .bind(summary.timestamp)
        .bind(&summary.counterpart_email)
        .bind(&summary.counterpart_profile_image_url)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_summaries(&self, owner: &UserId) -> PortResult<Vec<ConversationSummary>> {
        let records = sqlx::query_as::<_, SummaryRecord>(
            "SELECT owner_id, counterpart_id, from_id, to_id, text, sent_at, email, profile_image_url \
             FROM recent_messages WHERE owner_id = $1 ORDER BY sent_at DESC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(SummaryRecord::to_domain).collect())
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for DbAdapter {
    async fn verify_token(&self, token: &str) -> PortResult<UserId> {
        let user_id: Option<String> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.map(UserId::from).ok_or(PortError::Unauthorized)
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
