//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use messenger_core::ports::PortError;
use std::sync::Arc;
use tracing::{error, warn};

use crate::web::state::AppState;

/// The credential the current request was authenticated with.
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

/// Middleware that validates the bearer token and extracts the user id.
///
/// If valid, inserts the `UserId` and the `BearerToken` into request extensions
/// for handlers to use. If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the token from the header, or the query string for WebSocket upgrades
    let token = bearer_token(req.headers(), req.uri().query()).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Resolve it with the identity service
    let user_id = state.identity.verify_token(&token).await.map_err(|e| match e {
        PortError::Unauthorized => {
            warn!("Rejected an unknown or expired bearer token");
            StatusCode::UNAUTHORIZED
        }
        other => {
            error!("Failed to verify bearer token: {:?}", other);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(user_id);
    req.extensions_mut().insert(BearerToken(token));

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>` wins over an `access_token` query parameter.
fn bearer_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
