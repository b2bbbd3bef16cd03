//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, MemoryDocumentStore, OpenAiTranslationAdapter},
    config::{Config, StoreBackend},
    error::ApiError,
    web::{rest::ApiDoc, router, AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    Router,
};
use messenger_core::ports::{DocumentStore, IdentityService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Set Up the Document Store & Identity Service ---
    let (store, identity): (Arc<dyn DocumentStore>, Arc<dyn IdentityService>) =
        match &config.store {
            StoreBackend::Postgres { database_url } => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                (
                    db_adapter.clone() as Arc<dyn DocumentStore>,
                    db_adapter as Arc<dyn IdentityService>,
                )
            }
            StoreBackend::Memory => {
                warn!("Using the in-memory store; all data is lost on restart.");
                let memory = Arc::new(MemoryDocumentStore::with_tokens(
                    config.dev_tokens.iter().cloned(),
                ));
                (
                    memory.clone() as Arc<dyn DocumentStore>,
                    memory as Arc<dyn IdentityService>,
                )
            }
        };

    // --- 3. Initialize the Translation Engine ---
    let mut openai_config = OpenAIConfig::new().with_api_key(config.openai_api_key.as_str());
    if let Some(api_base) = &config.openai_api_base {
        openai_config = openai_config.with_api_base(api_base.as_str());
    }
    let engine = Arc::new(OpenAiTranslationAdapter::new(
        Client::with_config(openai_config),
        config.translation_model.clone(),
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(store, identity, engine));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
