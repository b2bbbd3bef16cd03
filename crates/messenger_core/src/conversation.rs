//! crates/messenger_core/src/conversation.rs
//!
//! An open conversation: the draft buffer, the status line, the ordered
//! message list, and the one live subscription that keeps the list current.

use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{Contact, Message, MessageChange, SessionContext, UserId};
use crate::fanout::{FanOutWriter, SendError, SendReport};
use crate::ports::{DocumentStore, MessageChangeStream, PortResult};

/// A scoped subscription to `messages/{owner}/{counterpart}`. The underlying
/// store subscription is released when the feed is dropped.
pub struct ConversationFeed {
    owner: UserId,
    counterpart: UserId,
    changes: MessageChangeStream,
}

impl ConversationFeed {
    pub async fn open(
        store: &dyn DocumentStore,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<Self> {
        let changes = store.subscribe_messages(owner, counterpart).await?;
        info!("Subscribed to conversation {} <-> {}", owner, counterpart);
        Ok(Self {
            owner: owner.clone(),
            counterpart: counterpart.clone(),
            changes,
        })
    }

    /// The next change, or `None` once the store ends the feed.
    pub async fn next(&mut self) -> Option<PortResult<MessageChange>> {
        self.changes.next().await
    }
}

impl Drop for ConversationFeed {
    fn drop(&mut self) {
        info!("Released subscription {} <-> {}", self.owner, self.counterpart);
    }
}

/// What `next_update` applied to the message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationUpdate {
    Added(Message),
    Modified(Message),
    Removed(Message),
    Failed(String),
}

pub struct ConversationSession {
    session: SessionContext,
    contact: Contact,
    writer: Arc<FanOutWriter>,
    store: Arc<dyn DocumentStore>,
    pub draft: String,
    status: String,
    messages: Vec<Message>,
    feed: Option<ConversationFeed>,
}

impl ConversationSession {
    pub fn new(
        session: SessionContext,
        contact: Contact,
        writer: Arc<FanOutWriter>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            session,
            contact,
            writer,
            store,
            draft: String::new(),
            status: String::new(),
            messages: Vec::new(),
            feed: None,
        }
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        self.feed.is_some()
    }

    /// (Re)subscribes to this conversation, replacing any previous subscription.
    pub async fn open(&mut self) -> PortResult<()> {
        self.feed = None;
        self.messages.clear();
        match ConversationFeed::open(self.store.as_ref(), &self.session.user_id, &self.contact.id)
            .await
        {
            Ok(feed) => {
                self.feed = Some(feed);
                Ok(())
            }
            Err(e) => {
                self.status = format!("Failed to listen for messages: {}", e);
                warn!("{}", self.status);
                Err(e)
            }
        }
    }

    /// Releases the subscription. The message list is kept as last seen.
    pub fn close(&mut self) {
        self.feed = None;
    }

    /// Waits for the next change and applies it. Returns `None` when no feed
    /// is open or the store ended it.
    pub async fn next_update(&mut self) -> Option<ConversationUpdate> {
        let change = self.feed.as_mut()?.next().await;
        match change {
            None => {
                self.feed = None;
                None
            }
            Some(Err(e)) => {
                self.status = format!("Failed to listen for messages: {}", e);
                warn!("{}", self.status);
                Some(ConversationUpdate::Failed(self.status.clone()))
            }
            Some(Ok(change)) => Some(self.apply(change)),
        }
    }

    fn apply(&mut self, change: MessageChange) -> ConversationUpdate {
        match change {
            MessageChange::Added(message) => {
                self.messages.push(message.clone());
                ConversationUpdate::Added(message)
            }
            MessageChange::Modified(message) => {
                match self.messages.iter_mut().find(|m| m.id == message.id) {
                    Some(existing) => *existing = message.clone(),
                    None => self.messages.push(message.clone()),
                }
                ConversationUpdate::Modified(message)
            }
            MessageChange::Removed(id) => {
                match self.messages.iter().position(|m| m.id == Some(id)) {
                    Some(index) => ConversationUpdate::Removed(self.messages.remove(index)),
                    None => {
                        self.status = format!("Unknown message removed: {}", id);
                        warn!("{}", self.status);
                        ConversationUpdate::Failed(self.status.clone())
                    }
                }
            }
        }
    }

    /// Sends the draft. The draft is cleared once the sender's own copy is
    /// stored, whatever happened to the other three writes.
    pub async fn send_draft(&mut self) -> Result<SendReport, SendError> {
        let text = self.draft.clone();
        match self.writer.send(&self.session, &self.contact, &text).await {
            Ok(report) => {
                if report.sender_copy.is_written() {
                    self.draft.clear();
                }
                self.status = report.failures().join("\n");
                Ok(report)
            }
            Err(e) => {
                if matches!(e, SendError::LanguageLookup) {
                    self.status = e.status();
                }
                Err(e)
            }
        }
    }
}
