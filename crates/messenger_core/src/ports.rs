//! crates/messenger_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the messenger's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! pipeline independent of the concrete document store, translation engine
//! and identity provider.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{ConversationSummary, Message, MessageChange, MessageId, User, UserId};
use crate::language::LanguagePair;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A live change feed on one message collection. Dropping it releases the subscription.
pub type MessageChangeStream = Pin<Box<dyn Stream<Item = PortResult<MessageChange>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // --- users/{uid} ---
    /// Point read of a user profile. `Ok(None)` when no document exists.
    async fn get_user(&self, user_id: &UserId) -> PortResult<Option<User>>;

    async fn put_user(&self, user: &User) -> PortResult<()>;

    /// Equality query on the stored e-mail.
    async fn find_users_by_email(&self, email: &str) -> PortResult<Vec<User>>;

    // --- messages/{owner}/{counterpart}/{id} ---
    /// Creates a new message record and returns the store-assigned id.
    async fn create_message(
        &self,
        owner: &UserId,
        counterpart: &UserId,
        message: &Message,
    ) -> PortResult<MessageId>;

    /// Ordered (ascending timestamp) range query over one conversation copy.
    async fn list_messages(&self, owner: &UserId, counterpart: &UserId)
        -> PortResult<Vec<Message>>;

    /// Subscribes to one conversation copy. Existing messages are delivered
    /// first as `Added`, in timestamp order, followed by live changes.
    async fn subscribe_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<MessageChangeStream>;

    // --- recent_messages/{owner}/messages/{counterpart} ---
    async fn upsert_summary(&self, summary: &ConversationSummary) -> PortResult<()>;

    /// Summaries owned by `owner`, newest first.
    async fn list_summaries(&self, owner: &UserId) -> PortResult<Vec<ConversationSummary>>;
}

#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Makes the model for `pair` resident, fetching it if needed.
    async fn ensure_model(&self, pair: LanguagePair) -> PortResult<()>;

    /// Translates `text` with the model for `pair`. Callers ensure the model first.
    async fn translate(&self, pair: LanguagePair, text: &str) -> PortResult<String>;
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Resolves a bearer credential issued by the external sign-in flow.
    async fn verify_token(&self, token: &str) -> PortResult<UserId>;

    async fn revoke_token(&self, token: &str) -> PortResult<()>;
}
