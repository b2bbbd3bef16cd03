//! In-crate fakes for the document store and translation engine.

use async_trait::async_trait;
use futures::channel::mpsc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{ConversationSummary, Message, MessageChange, MessageId, User, UserId};
use crate::language::LanguagePair;
use crate::ports::{DocumentStore, MessageChangeStream, PortError, PortResult, TranslationEngine};

type ConversationKey = (UserId, UserId);

pub fn user(id: &str, language: Option<&str>) -> User {
    User {
        id: id.into(),
        email: format!("{}@example.com", id),
        name: id.to_string(),
        profile_image_url: format!("https://img.example.com/{}.png", id),
        language: language.map(str::to_string),
    }
}

#[derive(Default)]
struct StoreState {
    users: HashMap<UserId, User>,
    messages: HashMap<ConversationKey, Vec<Message>>,
    summaries: HashMap<ConversationKey, ConversationSummary>,
    subscribers: HashMap<ConversationKey, Vec<mpsc::UnboundedSender<PortResult<MessageChange>>>>,
    failing_user_reads: HashSet<UserId>,
    failing_message_owners: HashSet<UserId>,
    failing_summary_owners: HashSet<UserId>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_user(&self, user: User) {
        self.state.lock().unwrap().users.insert(user.id.clone(), user);
    }

    pub fn fail_user_reads_for(&self, id: &str) {
        self.state.lock().unwrap().failing_user_reads.insert(id.into());
    }

    pub fn fail_message_writes_for(&self, owner: &str) {
        self.state.lock().unwrap().failing_message_owners.insert(owner.into());
    }

    pub fn fail_summary_writes_for(&self, owner: &str) {
        self.state.lock().unwrap().failing_summary_owners.insert(owner.into());
    }

    pub fn messages(&self, owner: &str, counterpart: &str) -> Vec<Message> {
        let key = (UserId::from(owner), UserId::from(counterpart));
        self.state.lock().unwrap().messages.get(&key).cloned().unwrap_or_default()
    }

    pub fn summary(&self, owner: &str, counterpart: &str) -> Option<ConversationSummary> {
        let key = (UserId::from(owner), UserId::from(counterpart));
        self.state.lock().unwrap().summaries.get(&key).cloned()
    }

    pub fn record_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.messages.values().map(Vec::len).sum::<usize>() + state.summaries.len()
    }

    pub fn active_subscriptions(&self, owner: &str, counterpart: &str) -> usize {
        let key = (UserId::from(owner), UserId::from(counterpart));
        let mut state = self.state.lock().unwrap();
        match state.subscribers.get_mut(&key) {
            Some(senders) => {
                senders.retain(|s| !s.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    /// Pushes a change to live subscribers without touching stored records.
    pub fn emit(&self, owner: &str, counterpart: &str, change: MessageChange) {
        let key = (UserId::from(owner), UserId::from(counterpart));
        let mut state = self.state.lock().unwrap();
        if let Some(senders) = state.subscribers.get_mut(&key) {
            senders.retain(|s| s.unbounded_send(Ok(change.clone())).is_ok());
        }
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn get_user(&self, user_id: &UserId) -> PortResult<Option<User>> {
        let state = self.state.lock().unwrap();
        if state.failing_user_reads.contains(user_id) {
            return Err(PortError::Unexpected("user read failed".to_string()));
        }
        Ok(state.users.get(user_id).cloned())
    }

    async fn put_user(&self, user: &User) -> PortResult<()> {
        self.insert_user(user.clone());
        Ok(())
    }

    async fn find_users_by_email(&self, email: &str) -> PortResult<Vec<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .values()
            .filter(|u| u.email == email)
            .cloned()
            .collect())
    }

    async fn create_message(
        &self,
        owner: &UserId,
        counterpart: &UserId,
        message: &Message,
    ) -> PortResult<MessageId> {
        let mut state = self.state.lock().unwrap();
        if state.failing_message_owners.contains(owner) {
            return Err(PortError::Unexpected("message write failed".to_string()));
        }
        let id = Uuid::new_v4();
        let stored = Message {
            id: Some(id),
            ..message.clone()
        };
        let key = (owner.clone(), counterpart.clone());
        state.messages.entry(key.clone()).or_default().push(stored.clone());
        if let Some(senders) = state.subscribers.get_mut(&key) {
            senders.retain(|s| s.unbounded_send(Ok(MessageChange::Added(stored.clone()))).is_ok());
        }
        Ok(id)
    }

    async fn list_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<Vec<Message>> {
        let key = (owner.clone(), counterpart.clone());
        let mut messages = self
            .state
            .lock()
            .unwrap()
            .messages
            .get(&key)
            .cloned()
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn subscribe_messages(
        &self,
        owner: &UserId,
        counterpart: &UserId,
    ) -> PortResult<MessageChangeStream> {
        let (tx, rx) = mpsc::unbounded();
        let key = (owner.clone(), counterpart.clone());
        let mut state = self.state.lock().unwrap();
        let mut existing = state.messages.get(&key).cloned().unwrap_or_default();
        existing.sort_by_key(|m| m.timestamp);
        for message in existing {
            let _ = tx.unbounded_send(Ok(MessageChange::Added(message)));
        }
        state.subscribers.entry(key).or_default().push(tx);
        Ok(Box::pin(rx))
    }

    async fn upsert_summary(&self, summary: &ConversationSummary) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_summary_owners.contains(&summary.owner_id) {
            return Err(PortError::Unexpected("summary write failed".to_string()));
        }
        let key = (summary.owner_id.clone(), summary.counterpart_id.clone());
        state.summaries.insert(key, summary.clone());
        Ok(())
    }

    async fn list_summaries(&self, owner: &UserId) -> PortResult<Vec<ConversationSummary>> {
        let state = self.state.lock().unwrap();
        let mut summaries: Vec<_> = state
            .summaries
            .values()
            .filter(|s| &s.owner_id == owner)
            .cloned()
            .collect();
        summaries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(summaries)
    }
}

/// Translation engine with a tiny phrase book and switchable failures.
#[derive(Default)]
pub struct FakeEngine {
    pub fail_download: bool,
    pub fail_translate: bool,
    pub delay: Option<Duration>,
    pub ensure_calls: AtomicUsize,
    pub translate_calls: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_download() -> Arc<Self> {
        Arc::new(Self {
            fail_download: true,
            ..Self::default()
        })
    }

    pub fn failing_translate() -> Arc<Self> {
        Arc::new(Self {
            fail_translate: true,
            ..Self::default()
        })
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }
}

#[async_trait]
impl TranslationEngine for FakeEngine {
    async fn ensure_model(&self, pair: LanguagePair) -> PortResult<()> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_download {
            return Err(PortError::Unexpected(format!("model download failed for {}", pair)));
        }
        Ok(())
    }

    async fn translate(&self, pair: LanguagePair, text: &str) -> PortResult<String> {
        self.translate_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_translate {
            return Err(PortError::Unexpected("translation failed".to_string()));
        }
        let translated = match (pair.to.code(), text) {
            ("es", "Hello") => "Hola".to_string(),
            ("fr", "Hello") => "Bonjour".to_string(),
            (code, other) => format!("[{}] {}", code, other),
        };
        Ok(translated)
    }
}
