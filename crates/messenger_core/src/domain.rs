//! crates/messenger_core/src/domain.rs
//!
//! Defines the pure, core data structures for the messenger.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

/// A store-assigned message identifier.
pub type MessageId = Uuid;

/// A stable user identifier issued by the external identity service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A user profile as stored under `users/{uid}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub profile_image_url: String,
    /// Free-text language name, e.g. "English". Legacy records may lack it.
    pub language: Option<String>,
}

impl User {
    pub fn contact(&self) -> Contact {
        Contact {
            id: self.id.clone(),
            email: self.email.clone(),
            profile_image_url: self.profile_image_url.clone(),
        }
    }
}

/// The counterpart of a conversation, as the pipeline needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub id: UserId,
    pub email: String,
    pub profile_image_url: String,
}

/// The explicit identity of the acting user, passed into every pipeline call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: UserId,
    pub email: String,
    pub profile_image_url: String,
}

impl SessionContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            profile_image_url: user.profile_image_url.clone(),
        }
    }
}

/// One physical copy of a message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Option<MessageId>,
    pub from_id: UserId,
    pub to_id: UserId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// The per-owner pointer to the latest message exchanged with a counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub owner_id: UserId,
    pub counterpart_id: UserId,
    pub from_id: UserId,
    pub to_id: UserId,
    /// The latest text as seen by the owner.
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub counterpart_email: String,
    pub counterpart_profile_image_url: String,
}

/// An incremental change on a subscribed message collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageChange {
    Added(Message),
    Modified(Message),
    Removed(MessageId),
}
