//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a conversation's WebSocket
//! connection. Each connection owns one `ConversationSession`, and with it one
//! live subscription that is released when the socket closes.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use messenger_core::{domain::UserId, ConversationSession};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const OUTBOUND_CAPACITY: usize = 64;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(counterpart): Path<String>,
) -> Response {
    let counterpart = UserId::from(counterpart);
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id, counterpart))
}

async fn handle_socket(
    socket: WebSocket,
    app_state: Arc<AppState>,
    user_id: UserId,
    counterpart: UserId,
) {
    info!("New WebSocket connection: {} <-> {}", user_id, counterpart);

    // Frames go out through a single forwarder task so the control loop never
    // blocks on a slow client while holding the session.
    let (sink, mut receiver) = socket.split();
    let (outbound, outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);
    let shutdown = CancellationToken::new();
    let forwarder = tokio::spawn(forward_frames(sink, outbound_rx, shutdown.clone()));

    // --- 1. Initialization Phase ---
    let session = match open_session(&app_state, &user_id, &counterpart).await {
        Ok(session) => Some(session),
        Err(message) => {
            let _ = outbound.send(ServerMessage::Error { message }).await;
            None
        }
    };

    // --- 2. Main Message Loop ---
    if let Some(mut session) = session {
        loop {
            tokio::select! {
                update = session.next_update() => match update {
                    Some(update) => {
                        if outbound.send(update.into()).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        info!("Conversation feed {} <-> {} ended", user_id, counterpart);
                        break;
                    }
                },
                frame = receiver.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(text.as_str(), &mut session).await;
                        if outbound.send(reply).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close message.");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                    None => {
                        info!("Client disconnected.");
                        break;
                    }
                },
            }
        }
        session.close();
    }

    // --- 3. Cleanup ---
    drop(outbound);
    shutdown.cancel();
    if let Err(e) = forwarder.await {
        error!("WebSocket forwarder failed: {:?}", e);
    }
    info!("WebSocket connection closed.");
}

/// Builds the session for `user_id` talking to `counterpart` and subscribes it.
async fn open_session(
    app_state: &AppState,
    user_id: &UserId,
    counterpart: &UserId,
) -> Result<ConversationSession, String> {
    let context = app_state.directory.session_for(user_id).await.map_err(|e| {
        warn!("No profile for {}: {}", user_id, e);
        "Register a profile before opening a conversation.".to_string()
    })?;
    let contact = app_state.directory.contact(counterpart).await.map_err(|e| {
        warn!("Unknown counterpart {}: {}", counterpart, e);
        format!("User {} not found", counterpart)
    })?;

    let mut session = ConversationSession::new(
        context,
        contact,
        app_state.writer.clone(),
        app_state.store.clone(),
    );
    match session.open().await {
        Ok(()) => Ok(session),
        Err(_) => Err(session.status().to_string()),
    }
}

/// Applies one client frame to the session and returns the reply frame.
async fn handle_text_message(text: &str, session: &mut ConversationSession) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Send { text }) => {
            session.draft = text;
            match session.send_draft().await {
                Ok(report) => ServerMessage::SendCompleted {
                    report: (&report).into(),
                },
                Err(e) => ServerMessage::Error {
                    message: e.status(),
                },
            }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            ServerMessage::Error {
                message: format!("Unrecognized message: {}", e),
            }
        }
    }
}

/// Serializes queued frames onto the socket until the queue closes or `shutdown` fires.
async fn forward_frames(
    mut sink: SplitSink<WebSocket, Message>,
    mut frames: mpsc::Receiver<ServerMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = frames.recv() => frame,
            _ = shutdown.cancelled() => None,
        };
        let Some(frame) = frame else { break };
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize server message: {}", e);
                continue;
            }
        };
        if sink.send(Message::Text(json.into())).await.is_err() {
            warn!("Client went away while sending; dropping remaining frames.");
            break;
        }
    }
    let _ = sink.close().await;
}
