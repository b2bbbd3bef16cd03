//! crates/messenger_core/src/fanout.rs
//!
//! The Fan-out Writer. A send is gated on both parties' languages (nothing
//! is written if either is unknown), then issues four independent writes:
//! the sender's copy, the recipient's copy, and each party's conversation
//! summary. The writes are not coordinated; one failing leaves the others in place.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{Contact, ConversationSummary, Message, MessageId, SessionContext};
use crate::language::{LanguageCode, LanguageResolver};
use crate::ports::{DocumentStore, PortResult};
use crate::translation::TranslationGateway;

/// Status shown when either party's language preference is unavailable.
pub const LANGUAGE_LOOKUP_FAILED: &str = "Failed to fetch user languages.";

/// Reasons a send stops before any write is issued.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("Send rejected: {0}")]
    Rejected(String),
    #[error("{}", LANGUAGE_LOOKUP_FAILED)]
    LanguageLookup,
}

impl SendError {
    pub fn status(&self) -> String {
        self.to_string()
    }
}

/// How the recipient's text was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated {
        from: LanguageCode,
        to: LanguageCode,
    },
    /// Both parties share a language; the original was used as is.
    SameLanguage(LanguageCode),
    /// Translation was unavailable; the recipient received the original text.
    Fallback {
        from: LanguageCode,
        to: LanguageCode,
    },
}

/// Result of one of the four writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { id: Option<MessageId> },
    Failed { status: String },
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            WriteOutcome::Written { .. } => None,
            WriteOutcome::Failed { status } => Some(status),
        }
    }
}

/// The observable outcome of a send that passed the language gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    pub sent_at: DateTime<Utc>,
    pub original_text: String,
    pub recipient_text: String,
    pub translation: TranslationOutcome,
    pub sender_copy: WriteOutcome,
    pub recipient_copy: WriteOutcome,
    pub sender_summary: WriteOutcome,
    pub recipient_summary: WriteOutcome,
}

impl SendReport {
    pub fn writes(&self) -> [&WriteOutcome; 4] {
        [
            &self.sender_copy,
            &self.recipient_copy,
            &self.sender_summary,
            &self.recipient_summary,
        ]
    }

    pub fn is_complete(&self) -> bool {
        self.writes().into_iter().all(WriteOutcome::is_written)
    }

    /// Status strings of the failed writes, in write order.
    pub fn failures(&self) -> Vec<&str> {
        self.writes().into_iter().filter_map(WriteOutcome::status).collect()
    }
}

//=========================================================================================
// Fan-out Writer
//=========================================================================================

pub struct FanOutWriter {
    store: Arc<dyn DocumentStore>,
    resolver: LanguageResolver,
    gateway: Arc<TranslationGateway>,
}

impl FanOutWriter {
    pub fn new(store: Arc<dyn DocumentStore>, gateway: Arc<TranslationGateway>) -> Self {
        Self {
            resolver: LanguageResolver::new(store.clone()),
            store,
            gateway,
        }
    }

    pub async fn send(
        &self,
        session: &SessionContext,
        recipient: &Contact,
        text: &str,
    ) -> Result<SendReport, SendError> {
        if session.user_id.is_empty() {
            return Err(SendError::Rejected("no signed-in sender".to_string()));
        }
        if recipient.id.is_empty() {
            return Err(SendError::Rejected("no recipient".to_string()));
        }
        if recipient.id == session.user_id {
            return Err(SendError::Rejected("cannot send a message to yourself".to_string()));
        }
        if text.trim().is_empty() {
            return Err(SendError::Rejected("empty message".to_string()));
        }

        let sender_id = &session.user_id;
        let recipient_id = &recipient.id;

        let (from, to) = match self
            .resolver
            .resolve_languages(sender_id, recipient_id)
            .await
        {
            (Some(from), Some(to)) => (from, to),
            _ => {
                warn!(
                    "Language lookup failed for {} -> {}; nothing written",
                    sender_id, recipient_id
                );
                return Err(SendError::LanguageLookup);
            }
        };

        let (recipient_text, translation) = match self.gateway.translate(text, from, to).await {
            Some(translated) if from == to => (translated, TranslationOutcome::SameLanguage(from)),
            Some(translated) => (translated, TranslationOutcome::Translated { from, to }),
            None => {
                info!("Falling back to original text for {} -> {}", sender_id, recipient_id);
                (text.to_string(), TranslationOutcome::Fallback { from, to })
            }
        };

        let sent_at = Utc::now();
        let sender_message = Message {
            id: None,
            from_id: sender_id.clone(),
            to_id: recipient_id.clone(),
            text: text.to_string(),
            timestamp: sent_at,
        };
        let recipient_message = Message {
            text: recipient_text.clone(),
            ..sender_message.clone()
        };
        let sender_recent = ConversationSummary {
            owner_id: sender_id.clone(),
            counterpart_id: recipient_id.clone(),
            from_id: sender_id.clone(),
            to_id: recipient_id.clone(),
            text: text.to_string(),
            timestamp: sent_at,
            counterpart_email: recipient.email.clone(),
            counterpart_profile_image_url: recipient.profile_image_url.clone(),
        };
        let recipient_recent = ConversationSummary {
            owner_id: recipient_id.clone(),
            counterpart_id: sender_id.clone(),
            text: recipient_text.clone(),
            counterpart_email: session.email.clone(),
            counterpart_profile_image_url: session.profile_image_url.clone(),
            ..sender_recent.clone()
        };

        let (sender_copy, recipient_copy, sender_summary, recipient_summary) = futures::join!(
            self.store
                .create_message(sender_id, recipient_id, &sender_message),
            self.store
                .create_message(recipient_id, sender_id, &recipient_message),
            self.store.upsert_summary(&sender_recent),
            self.store.upsert_summary(&recipient_recent),
        );

        let report = SendReport {
            sent_at,
            original_text: text.to_string(),
            recipient_text,
            translation,
            sender_copy: outcome(sender_copy.map(Some), "Failed to save sender message"),
            recipient_copy: outcome(recipient_copy.map(Some), "Failed to save recipient message"),
            sender_summary: outcome(
                sender_summary.map(|_| None),
                "Failed to save sender recent message",
            ),
            recipient_summary: outcome(
                recipient_summary.map(|_| None),
                "Failed to save recipient recent message",
            ),
        };

        if report.is_complete() {
            info!("Message from {} to {} delivered", sender_id, recipient_id);
        }
        Ok(report)
    }
}

fn outcome(result: PortResult<Option<MessageId>>, context: &str) -> WriteOutcome {
    match result {
        Ok(id) => WriteOutcome::Written { id },
        Err(e) => {
            let status = format!("{}: {}", context, e);
            error!("{}", status);
            WriteOutcome::Failed { status }
        }
    }
}
