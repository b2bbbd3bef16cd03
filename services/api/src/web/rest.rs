//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    protocol::{MessagePayload, SendReportPayload, WritePayload},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use messenger_core::{
    directory::SEARCH_FOUND,
    domain::{ConversationSummary, Contact, SessionContext, User, UserId},
    ports::PortError,
    NewProfile, ProfileError, SearchError, SendError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        get_profile_handler,
        put_profile_handler,
        search_users_handler,
        list_conversations_handler,
        list_messages_handler,
        send_message_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(
            ProfileResponse,
            RegisterProfileRequest,
            ContactResponse,
            SearchResponse,
            SummaryResponse,
            SendMessageRequest,
            MessagePayload,
            WritePayload,
            SendReportPayload,
        )
    ),
    tags(
        (name = "Messenger API", description = "Translating one-to-one messenger.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ProfileResponse {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub profile_image_url: String,
    pub language: Option<String>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.id.to_string(),
            email: user.email,
            name: user.name,
            profile_image_url: user.profile_image_url,
            language: user.language,
        }
    }
}

/// The profile written after the first sign-in. `language` defaults to English.
#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterProfileRequest {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub profile_image_url: String,
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ContactResponse {
    pub uid: String,
    pub email: String,
    pub profile_image_url: String,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            uid: contact.id.to_string(),
            email: contact.email,
            profile_image_url: contact.profile_image_url,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SearchResponse {
    pub contact: ContactResponse,
    pub status: String,
}

#[derive(Deserialize, Debug)]
pub struct SearchQuery {
    #[serde(default)]
    pub email: String,
}

/// One inbox row: the latest message exchanged with a counterpart.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SummaryResponse {
    pub counterpart_id: String,
    pub from_id: String,
    pub to_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub email: String,
    pub profile_image_url: String,
}

impl From<ConversationSummary> for SummaryResponse {
    fn from(summary: ConversationSummary) -> Self {
        Self {
            counterpart_id: summary.counterpart_id.to_string(),
            from_id: summary.from_id.to_string(),
            to_id: summary.to_id.to_string(),
            text: summary.text,
            timestamp: summary.timestamp,
            email: summary.counterpart_email,
            profile_image_url: summary.counterpart_profile_image_url,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct SendMessageRequest {
    pub text: String,
}

type HandlerError = (StatusCode, String);

/// Maps a port failure while loading a profile onto a response.
fn profile_error(user_id: &UserId, e: PortError) -> HandlerError {
    match e {
        PortError::NotFound(_) => (StatusCode::NOT_FOUND, format!("User {} not found", user_id)),
        other => {
            error!("Failed to load profile {}: {:?}", user_id, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user profile".to_string(),
            )
        }
    }
}

async fn session_for(app_state: &AppState, user_id: &UserId) -> Result<SessionContext, HandlerError> {
    app_state
        .directory
        .session_for(user_id)
        .await
        .map_err(|e| profile_error(user_id, e))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Returns the caller's profile. A 404 means the profile still has to be registered.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Profile found", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No profile registered yet")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<ProfileResponse>, HandlerError> {
    let user = app_state
        .directory
        .profile(&user_id)
        .await
        .map_err(|e| profile_error(&user_id, e))?;
    Ok(Json(user.into()))
}

/// Registers (or replaces) the caller's profile.
#[utoipa::path(
    put,
    path = "/users/me",
    request_body = RegisterProfileRequest,
    responses(
        (status = 200, description = "Profile stored", body = ProfileResponse),
        (status = 400, description = "Invalid e-mail or unsupported language"),
        (status = 500, description = "Failed to store the profile")
    )
)]
pub async fn put_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Json(req): Json<RegisterProfileRequest>,
) -> Result<Json<ProfileResponse>, HandlerError> {
    let profile = NewProfile {
        email: req.email,
        name: req.name,
        profile_image_url: req.profile_image_url,
        language: req.language,
    };
    match app_state.directory.register_profile(&user_id, profile).await {
        Ok(user) => Ok(Json(user.into())),
        Err(e @ ProfileError::Store(_)) => Err((StatusCode::INTERNAL_SERVER_ERROR, e.status())),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.status())),
    }
}

/// Looks up a chat partner by e-mail.
#[utoipa::path(
    get,
    path = "/users/search",
    params(("email" = String, Query, description = "The partner's e-mail address")),
    responses(
        (status = 200, description = "User found", body = SearchResponse),
        (status = 400, description = "Empty query or the caller's own address"),
        (status = 404, description = "No user with this e-mail")
    )
)]
pub async fn search_users_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, HandlerError> {
    let session = session_for(&app_state, &user_id).await?;
    match app_state.directory.search_by_email(&session, &query.email).await {
        Ok(contact) => Ok(Json(SearchResponse {
            contact: contact.into(),
            status: SEARCH_FOUND.to_string(),
        })),
        Err(e) => {
            let status = match e {
                SearchError::EmptyQuery | SearchError::SelfChat => StatusCode::BAD_REQUEST,
                SearchError::NotFound => StatusCode::NOT_FOUND,
                SearchError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((status, e.status()))
        }
    }
}

/// The caller's inbox, newest conversation first.
#[utoipa::path(
    get,
    path = "/conversations",
    responses((status = 200, description = "Recent conversations", body = [SummaryResponse]))
)]
pub async fn list_conversations_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<SummaryResponse>>, HandlerError> {
    let summaries = app_state.store.list_summaries(&user_id).await.map_err(|e| {
        error!("Failed to list conversations for {}: {:?}", user_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load conversations".to_string(),
        )
    })?;
    Ok(Json(summaries.into_iter().map(Into::into).collect()))
}

/// The caller's copy of one conversation, oldest message first.
#[utoipa::path(
    get,
    path = "/conversations/{counterpart}/messages",
    params(("counterpart" = String, Path, description = "The chat partner's user id")),
    responses((status = 200, description = "Conversation history", body = [MessagePayload]))
)]
pub async fn list_messages_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(counterpart): Path<String>,
) -> Result<Json<Vec<MessagePayload>>, HandlerError> {
    let counterpart = UserId::from(counterpart);
    let messages = app_state
        .store
        .list_messages(&user_id, &counterpart)
        .await
        .map_err(|e| {
            error!("Failed to list messages {} <-> {}: {:?}", user_id, counterpart, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load messages".to_string(),
            )
        })?;
    Ok(Json(messages.into_iter().map(Into::into).collect()))
}

/// Sends a message: translates it for the partner and writes all four records.
///
/// A 200 response can still carry failed writes; check each write and `status`.
#[utoipa::path(
    post,
    path = "/conversations/{counterpart}/messages",
    request_body = SendMessageRequest,
    params(("counterpart" = String, Path, description = "The chat partner's user id")),
    responses(
        (status = 200, description = "Send attempted", body = SendReportPayload),
        (status = 400, description = "Empty message, missing party or a message to yourself"),
        (status = 404, description = "Unknown chat partner"),
        (status = 422, description = "A language preference could not be read; nothing was written")
    )
)]
pub async fn send_message_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(counterpart): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let session = session_for(&app_state, &user_id).await?;
    let counterpart = UserId::from(counterpart);
    let contact = app_state
        .directory
        .contact(&counterpart)
        .await
        .map_err(|e| profile_error(&counterpart, e))?;

    // The send runs on its own task: once started it finishes even if the
    // client hangs up before the response is written.
    let writer = app_state.writer.clone();
    let text = req.text;
    let send = tokio::spawn(async move { writer.send(&session, &contact, &text).await });
    let outcome = send.await.map_err(|e| {
        error!("Send task {} -> {} failed: {:?}", user_id, counterpart, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to send message".to_string(),
        )
    })?;

    match outcome {
        Ok(report) => {
            info!(
                "Message {} -> {} sent ({} of 4 writes stored, translation {:?})",
                user_id,
                counterpart,
                report.writes().into_iter().filter(|w| w.is_written()).count(),
                report.translation
            );
            Ok((StatusCode::OK, Json(SendReportPayload::from(&report))))
        }
        Err(e @ SendError::LanguageLookup) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.status())),
        Err(e @ SendError::Rejected(_)) => Err((StatusCode::BAD_REQUEST, e.status())),
    }
}
