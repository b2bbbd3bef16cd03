//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use messenger_core::{
    ports::{DocumentStore, IdentityService, TranslationEngine},
    Directory, FanOutWriter, TranslationGateway,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityService>,
    pub directory: Directory,
    /// One writer, and so one translation gateway, for the whole process.
    pub writer: Arc<FanOutWriter>,
}

impl AppState {
    /// Wires the core components on top of the given adapters.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityService>,
        engine: Arc<dyn TranslationEngine>,
    ) -> Self {
        let gateway = Arc::new(TranslationGateway::new(engine));
        Self {
            directory: Directory::new(store.clone()),
            writer: Arc::new(FanOutWriter::new(store.clone(), gateway)),
            store,
            identity,
        }
    }
}
