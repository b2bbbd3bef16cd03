pub mod conversation;
pub mod directory;
pub mod domain;
pub mod fanout;
pub mod language;
pub mod ports;
pub mod translation;

#[cfg(test)]
mod test_support;

pub use conversation::{ConversationFeed, ConversationSession, ConversationUpdate};
pub use directory::{Directory, NewProfile, ProfileError, SearchError};
pub use domain::{
    Contact, ConversationSummary, Message, MessageChange, MessageId, SessionContext, User, UserId,
};
pub use fanout::{FanOutWriter, SendError, SendReport, TranslationOutcome, WriteOutcome};
pub use language::{LanguageCode, LanguagePair, LanguageResolver};
pub use ports::{
    DocumentStore, IdentityService, MessageChangeStream, PortError, PortResult, TranslationEngine,
};
pub use translation::TranslationGateway;
