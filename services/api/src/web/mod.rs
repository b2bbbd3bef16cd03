pub mod auth;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API routes. Everything except `/health` requires a bearer token.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new().route("/health", get(rest::health_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/users/me",
            get(rest::get_profile_handler).put(rest::put_profile_handler),
        )
        .route("/users/search", get(rest::search_users_handler))
        .route("/conversations", get(rest::list_conversations_handler))
        .route(
            "/conversations/{counterpart}/messages",
            get(rest::list_messages_handler).post(rest::send_message_handler),
        )
        .route("/conversations/{counterpart}/ws", get(ws_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(app_state)
}
