//! crates/messenger_core/src/language.rs
//!
//! The supported language table and the resolver that maps each party's
//! stored preference onto it.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::domain::UserId;
use crate::ports::DocumentStore;

/// Normalized identifier from the fixed set of supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageCode {
    English,
    Spanish,
    Urdu,
    Hindi,
    French,
    Arabic,
    Russian,
    Chinese,
    Japanese,
    Portuguese,
}

impl LanguageCode {
    pub const ALL: [LanguageCode; 10] = [
        LanguageCode::English,
        LanguageCode::Spanish,
        LanguageCode::Urdu,
        LanguageCode::Hindi,
        LanguageCode::French,
        LanguageCode::Arabic,
        LanguageCode::Russian,
        LanguageCode::Chinese,
        LanguageCode::Japanese,
        LanguageCode::Portuguese,
    ];

    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Spanish => "es",
            LanguageCode::Urdu => "ur",
            LanguageCode::Hindi => "hi",
            LanguageCode::French => "fr",
            LanguageCode::Arabic => "ar",
            LanguageCode::Russian => "ru",
            LanguageCode::Chinese => "zh",
            LanguageCode::Japanese => "ja",
            LanguageCode::Portuguese => "pt",
        }
    }

    /// English name, as stored in user profiles.
    pub fn name(self) -> &'static str {
        match self {
            LanguageCode::English => "English",
            LanguageCode::Spanish => "Spanish",
            LanguageCode::Urdu => "Urdu",
            LanguageCode::Hindi => "Hindi",
            LanguageCode::French => "French",
            LanguageCode::Arabic => "Arabic",
            LanguageCode::Russian => "Russian",
            LanguageCode::Chinese => "Chinese",
            LanguageCode::Japanese => "Japanese",
            LanguageCode::Portuguese => "Portuguese",
        }
    }

    /// Case-insensitive exact match against the name table. Surrounding
    /// whitespace is not stripped: " English" is not a known name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source and target of one translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LanguagePair {
    pub from: LanguageCode,
    pub to: LanguageCode,
}

impl LanguagePair {
    pub fn new(from: LanguageCode, to: LanguageCode) -> Self {
        Self { from, to }
    }

    pub fn is_identity(&self) -> bool {
        self.from == self.to
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from.code(), self.to.code())
    }
}

//=========================================================================================
// Language Resolver
//=========================================================================================

/// Looks up both parties' stored language preference.
#[derive(Clone)]
pub struct LanguageResolver {
    store: Arc<dyn DocumentStore>,
}

impl LanguageResolver {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Resolves `(sender, recipient)` languages. Both lookups run concurrently
    /// and are joined; a failed or empty lookup yields `None` for that side only.
    pub async fn resolve_languages(
        &self,
        sender_id: &UserId,
        recipient_id: &UserId,
    ) -> (Option<LanguageCode>, Option<LanguageCode>) {
        futures::join!(self.lookup(sender_id), self.lookup(recipient_id))
    }

    async fn lookup(&self, user_id: &UserId) -> Option<LanguageCode> {
        match self.store.get_user(user_id).await {
            Ok(Some(user)) => {
                let name = user.language?;
                let lang = LanguageCode::from_name(&name);
                if lang.is_none() {
                    warn!("Unrecognized language '{}' stored for user {}", name, user_id);
                }
                lang
            }
            Ok(None) => {
                warn!("No profile found for user {}", user_id);
                None
            }
            Err(e) => {
                warn!("Failed to fetch language for user {}: {}", user_id, e);
                None
            }
        }
    }
}
