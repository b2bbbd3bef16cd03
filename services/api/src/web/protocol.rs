//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the client and the API server,
//! and the wire shapes shared with the REST endpoints.

use chrono::{DateTime, Utc};
use messenger_core::{
    domain::Message, ConversationUpdate, SendReport, WriteOutcome,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Shared Payloads
//=========================================================================================

/// One message copy as shown to its owner.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct MessagePayload {
    pub id: Option<Uuid>,
    pub from_id: String,
    pub to_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessagePayload {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            from_id: message.from_id.to_string(),
            to_id: message.to_id.to_string(),
            text: message.text,
            timestamp: message.timestamp,
        }
    }
}

/// The result of one of the four writes of a send.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct WritePayload {
    pub written: bool,
    pub id: Option<Uuid>,
    pub status: Option<String>,
}

impl From<&WriteOutcome> for WritePayload {
    fn from(outcome: &WriteOutcome) -> Self {
        match outcome {
            WriteOutcome::Written { id } => Self {
                written: true,
                id: *id,
                status: None,
            },
            WriteOutcome::Failed { status } => Self {
                written: false,
                id: None,
                status: Some(status.clone()),
            },
        }
    }
}

/// What a send did, write by write, as reported to the sender. The
/// recipient's text and the translation outcome stay in the server log.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SendReportPayload {
    pub sent_at: DateTime<Utc>,
    pub original_text: String,
    pub sender_copy: WritePayload,
    pub recipient_copy: WritePayload,
    pub sender_summary: WritePayload,
    pub recipient_summary: WritePayload,
    /// Newline-joined failure statuses; empty when every write succeeded.
    pub status: String,
}

impl From<&SendReport> for SendReportPayload {
    fn from(report: &SendReport) -> Self {
        Self {
            sent_at: report.sent_at,
            original_text: report.original_text.clone(),
            sender_copy: (&report.sender_copy).into(),
            recipient_copy: (&report.recipient_copy).into(),
            sender_summary: (&report.sender_summary).into(),
            recipient_summary: (&report.recipient_summary).into(),
            status: report.failures().join("\n"),
        }
    }
}

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sends `text` to the counterpart of this connection.
    Send { text: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A message was appended to the caller's copy of the conversation. The
    /// existing history is replayed as a series of these right after connecting.
    MessageAdded { message: MessagePayload },

    MessageModified { message: MessagePayload },

    MessageRemoved { message: MessagePayload },

    /// The outcome of the caller's last `send`.
    SendCompleted { report: SendReportPayload },

    /// A human-readable status; the connection stays usable unless it is closed.
    Error { message: String },
}

impl From<ConversationUpdate> for ServerMessage {
    fn from(update: ConversationUpdate) -> Self {
        match update {
            ConversationUpdate::Added(message) => ServerMessage::MessageAdded {
                message: message.into(),
            },
            ConversationUpdate::Modified(message) => ServerMessage::MessageModified {
                message: message.into(),
            },
            ConversationUpdate::Removed(message) => ServerMessage::MessageRemoved {
                message: message.into(),
            },
            ConversationUpdate::Failed(status) => ServerMessage::Error { message: status },
        }
    }
}
