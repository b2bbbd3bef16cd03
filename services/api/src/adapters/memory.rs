//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DocumentStore` and `IdentityService`
//! ports. It backs `STORE_BACKEND=memory` for local development and the
//! service's integration tests. Nothing survives a restart.

use async_trait::async_trait;
use messenger_core::domain::{
    ConversationSummary, Message, MessageChange, MessageId, User, UserId,
};
use messenger_core::ports::{
    DocumentStore, IdentityService, MessageChangeStream, PortError, PortResult,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use uuid::Uuid;

const FEED_CAPACITY: usize = 256;

type ConversationKey = (UserId, UserId);

/// One change on `messages/{owner}/{counterpart}`, as published to every feed.
#[derive(Clone, Debug)]
struct ConversationChange {
    owner: UserId,
    counterpart: UserId,
    change: MessageChange,
}

#[derive(Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    messages: HashMap<ConversationKey, Vec<Message>>,
    summaries: HashMap<ConversationKey, ConversationSummary>,
    tokens: HashMap<String, UserId>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

pub struct MemoryDocumentStore {
    state: Mutex<MemoryState>,
    changes: broadcast::Sender<ConversationChange>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: Mutex::new(MemoryState::default()),
            changes,
        }
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that accepts the given `(token, user id)` bearer credentials.
    pub fn with_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let store = Self::default();
        for (token, user_id) in tokens {
            store.issue_token(&token, &UserId::from(user_id));
        }
        store
    }

    /// Registers a bearer credential, standing in for the external sign-in flow.
    pub fn issue_token(&self, token: &str, user_id: &UserId) {
        self.lock().tokens.insert(token.to_string(), user_id.clone());
    }

    /// Deletes one message copy and notifies its subscribers.
    pub fn remove_message(
        &self,
        owner: &UserId,
        counterpart: &UserId,
        id: MessageId,
    ) -> PortResult<()> {
        let mut state = self.lock();
        let key = (owner.clone(), counterpart.clone());
        let messages = state.messages.get_mut(&key).ok_or_else(|| {
            PortError::NotFound(format!("No conversation {} <-> {}", owner, counterpart))
        })?;
        let before = messages.len();
        messages.retain(|m| m.id != Some(id));
        if messages.len() == before {
            return Err(PortError::NotFound(format!("Message {} not found", id)));
        }
        self.publish(owner, counterpart, MessageChange::Removed(id));
        Ok(())
    }

    /// Number of change feeds currently open against this store.
    pub fn live_feeds(&self) -> usize {
        self.changes.receiver_count()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Must be called with the state lock held so that feeds see changes in commit order.
    fn publish(&self, owner: &UserId, counterpart: &UserId, change: MessageChange) {
        // No receivers is not an error: nobody has the conversation open.
        let _ = self.changes.send(ConversationChange {
            owner: owner.clone(),
            counterpart: counterpart.clone(),
            change,
        });
    }
}

//=========================================================================================
// `DocumentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_user(&self, user_id: &UserId) -> PortResult<Option<User>> {
        Ok(self.lock().users.get(user_id).cloned())
    }

    async fn put_user(&self, user: &User) -> PortResult<()> {
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_users_by_email(&self, email: &str) -> PortResult<Vec<User>> {
        let state = self.lock();
        let mut found: Vec<User> = state
            .users
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn create_message(
        &self,
        owner: &UserId,
        counterpart: &UserId,
        message: &Message,
    ) -> PortResult<MessageId> {
        let id = Uuid::new_v4();
        let stored = Message {
            id: Some(id),
            ..message.clone()
        };

        let mut state = self.lock();
        let messages = state
            .messages
            .entry((owner.clone(), counterpart.clone()))
            .or_default();
        // Keep the collection ordered by timestamp; equal timestamps keep insertion order.
        let position = messages.partition_point(|m| m.timestamp <= stored.timestamp);
        messages.insert(position, stored.clone());
        self.publish(owner, counterpart, MessageChange::Added(stored));
        Ok(id)
    }

    async fn list_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<Vec<Message>> {
        let key = (owner.clone(), counterpart.clone());
        Ok(self.lock().messages.get(&key).cloned().unwrap_or_default())
    }

    async fn subscribe_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<MessageChangeStream> {
        // Snapshot and subscribe under one lock so no change is missed or repeated.
        let (snapshot, mut receiver) = {
            let state = self.lock();
            let key = (owner.clone(), counterpart.clone());
            let snapshot = state.messages.get(&key).cloned().unwrap_or_default();
            (snapshot, self.changes.subscribe())
        };

        let owner = owner.clone();
        let counterpart = counterpart.clone();
        let stream = async_stream::stream! {
            for message in snapshot {
                yield Ok(MessageChange::Added(message));
            }
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if event.owner == owner && event.counterpart == counterpart {
                            yield Ok(event.change);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Feed {} <-> {} lagged by {} changes", owner, counterpart, skipped);
                        yield Err(PortError::Unexpected(format!(
                            "Change feed fell behind by {} changes",
                            skipped
                        )));
                        break;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }

    async fn upsert_summary(&self, summary: &ConversationSummary) -> PortResult<()> {
        let key = (summary.owner_id.clone(), summary.counterpart_id.clone());
        self.lock().summaries.insert(key, summary.clone());
        Ok(())
    }

    async fn list_summaries(&self, owner: &UserId) -> PortResult<Vec<ConversationSummary>> {
        let state = self.lock();
        let mut summaries: Vec<ConversationSummary> = state
            .summaries
            .values()
            .filter(|s| &s.owner_id == owner)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }
}

//=========================================================================================
// `IdentityService` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityService for MemoryDocumentStore {
    async fn verify_token(&self, token: &str) -> PortResult<UserId> {
        self.lock()
            .tokens
            .get(token)
            .cloned()
            .ok_or(PortError::Unauthorized)
    }

    async fn revoke_token(&self, token: &str) -> PortResult<()> {
        if let Some(user_id) = self.lock().tokens.remove(token) {
            info!("Revoked a bearer token for {}", user_id);
        }
        Ok(())
    }
}
