//! crates/messenger_core/src/directory.rs
//!
//! User profiles: registration after external sign-in, lookup, and search by
//! e-mail when starting a new conversation.

use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{Contact, SessionContext, User, UserId};
use crate::language::LanguageCode;
use crate::ports::{DocumentStore, PortError, PortResult};

pub const DEFAULT_LANGUAGE: LanguageCode = LanguageCode::English;

pub const SEARCH_FOUND: &str = "User found! You can start a chat.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("Please enter a valid email address.")]
    EmptyQuery,
    #[error("No user found with this email. Try again.")]
    NotFound,
    #[error("Cannot start chat with yourself.")]
    SelfChat,
    #[error("Error: {0}")]
    Store(String),
}

impl SearchError {
    pub fn status(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("Failed to store user info: {0}")]
    Store(String),
}

impl ProfileError {
    pub fn status(&self) -> String {
        self.to_string()
    }
}

/// Input for a first-time profile registration.
#[derive(Debug, Clone, Default)]
pub struct NewProfile {
    pub email: String,
    pub name: String,
    pub profile_image_url: String,
    /// Language name; `None` registers the default language.
    pub language: Option<String>,
}

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn DocumentStore>,
}

impl Directory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Writes `users/{uid}` for a freshly signed-in user.
    pub async fn register_profile(
        &self,
        user_id: &UserId,
        profile: NewProfile,
    ) -> Result<User, ProfileError> {
        let email = normalize_email(&profile.email);
        if !looks_like_email(&email) {
            return Err(ProfileError::InvalidEmail);
        }
        let language = match profile.language.as_deref() {
            None => DEFAULT_LANGUAGE,
            Some(name) => LanguageCode::from_name(name)
                .ok_or_else(|| ProfileError::UnsupportedLanguage(name.to_string()))?,
        };

        let user = User {
            id: user_id.clone(),
            email,
            name: profile.name.trim().to_string(),
            profile_image_url: profile.profile_image_url,
            language: Some(language.name().to_string()),
        };
        self.store.put_user(&user).await.map_err(|e| {
            error!("Failed to store profile for {}: {}", user_id, e);
            ProfileError::Store(e.to_string())
        })?;
        info!("Registered profile for {} ({})", user_id, language);
        Ok(user)
    }

    /// Whether the signed-in user already has a profile (returning user).
    pub async fn profile_exists(&self, user_id: &UserId) -> PortResult<bool> {
        Ok(self.store.get_user(user_id).await?.is_some())
    }

    pub async fn profile(&self, user_id: &UserId) -> PortResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn contact(&self, user_id: &UserId) -> PortResult<Contact> {
        Ok(self.profile(user_id).await?.contact())
    }

    /// Builds the explicit identity context for an authenticated user.
    pub async fn session_for(&self, user_id: &UserId) -> PortResult<SessionContext> {
        Ok(SessionContext::from_user(&self.profile(user_id).await?))
    }

    /// Finds a chat partner by e-mail. Finding oneself is a validation failure.
    pub async fn search_by_email(
        &self,
        session: &SessionContext,
        email: &str,
    ) -> Result<Contact, SearchError> {
        let trimmed = email.trim();
        if trimmed.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let found = self
            .store
            .find_users_by_email(&trimmed.to_lowercase())
            .await
            .map_err(|e| SearchError::Store(e.to_string()))?;
        let user = found.into_iter().next().ok_or(SearchError::NotFound)?;

        if user.id == session.user_id {
            return Err(SearchError::SelfChat);
        }
        Ok(user.contact())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
