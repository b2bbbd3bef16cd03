//! services/api/src/web/auth.rs
//!
//! Session endpoints. Sign-in happens at the external identity provider;
//! this service only revokes the bearer tokens it was handed.

use axum::{extract::State, http::StatusCode, Extension};
use messenger_core::domain::UserId;
use std::sync::Arc;
use tracing::{error, info};

use crate::web::{middleware::BearerToken, state::AppState};

/// POST /auth/logout - Revoke the bearer token of this request
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.identity.revoke_token(&token).await.map_err(|e| {
        error!("Failed to revoke token for {}: {:?}", user_id, e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to logout".to_string())
    })?;
    info!("User {} signed out", user_id);
    Ok(StatusCode::OK)
}
