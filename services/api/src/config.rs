//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which document store adapter backs the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL at the given URL.
    Postgres { database_url: String },
    /// In-process store for local development; contents are lost on restart.
    Memory,
}

impl StoreBackend {
    /// Picks the backend named by `STORE_BACKEND`. PostgreSQL needs a database URL.
    fn select(name: &str, database_url: Option<String>) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "postgres" => database_url
                .map(|database_url| StoreBackend::Postgres { database_url })
                .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string())),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(ConfigError::InvalidValue(
                "STORE_BACKEND".to_string(),
                format!("'{}' is not one of postgres, memory", other),
            )),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub store: StoreBackend,
    pub log_level: Level,
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub translation_model: String,
    /// Bearer tokens accepted by the memory backend, as (token, user id).
    pub dev_tokens: Vec<(String, String)>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server and store ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let store_name =
            std::env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());
        let store = StoreBackend::select(&store_name, std::env::var("DATABASE_URL").ok())?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Translation engine ---
        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let openai_api_base = std::env::var("OPENAI_API_BASE").ok();
        let translation_model =
            std::env::var("TRANSLATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let dev_tokens = match std::env::var("DEV_TOKENS") {
            Ok(raw) => parse_dev_tokens(&raw)?,
            Err(_) => Vec::new(),
        };

        Ok(Self {
            bind_address,
            store,
            log_level,
            openai_api_key,
            openai_api_base,
            translation_model,
            dev_tokens,
        })
    }
}

/// Parses `token=uid,token=uid`.
fn parse_dev_tokens(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((token, uid)) if !token.trim().is_empty() && !uid.trim().is_empty() => {
                Ok((token.trim().to_string(), uid.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidValue(
                "DEV_TOKENS".to_string(),
                format!("'{}' is not a token=uid pair", entry),
            )),
        })
        .collect()
}
