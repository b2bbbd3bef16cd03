//! services/api/src/adapters/translate_llm.rs
//!
//! This module contains the adapter for the translation LLM.
//! It implements the `TranslationEngine` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use messenger_core::{
    language::LanguagePair,
    ports::{PortError, PortResult, TranslationEngine},
};
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::info;

/// Text sent once per language pair to confirm the model is reachable.
const PROBE_TEXT: &str = "Hello";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TranslationEngine` using an OpenAI-compatible LLM.
pub struct OpenAiTranslationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    /// Pairs whose model has answered at least once.
    ready: Mutex<HashSet<LanguagePair>>,
}

impl OpenAiTranslationAdapter {
    /// Creates a new `OpenAiTranslationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            ready: Mutex::new(HashSet::new()),
        }
    }

    fn is_ready(&self, pair: LanguagePair) -> bool {
        self.ready
            .lock()
            .map(|ready| ready.contains(&pair))
            .unwrap_or(false)
    }

    fn mark_ready(&self, pair: LanguagePair) {
        if let Ok(mut ready) = self.ready.lock() {
            ready.insert(pair);
        }
    }

    async fn complete(&self, pair: LanguagePair, text: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt(pair))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| {
                PortError::Unexpected("Translation LLM returned no choices.".to_string())
            })?
            .message
            .content
            .ok_or_else(|| {
                PortError::Unexpected("Translation LLM response contained no text.".to_string())
            })?;

        let translated = content.trim();
        if translated.is_empty() {
            return Err(PortError::Unexpected(
                "Translation LLM returned an empty translation.".to_string(),
            ));
        }
        Ok(translated.to_string())
    }
}

fn system_prompt(pair: LanguagePair) -> String {
    format!(
        "You are a translator. Translate the user's message from {} to {}. \
         Reply with the translated text only, without quotes or commentary.",
        pair.from.name(),
        pair.to.name()
    )
}

//=========================================================================================
// `TranslationEngine` Trait Implementation
//=========================================================================================

#[async_trait]
impl TranslationEngine for OpenAiTranslationAdapter {
    /// Probes the model once per pair. Later calls for the same pair return immediately.
    async fn ensure_model(&self, pair: LanguagePair) -> PortResult<()> {
        if self.is_ready(pair) {
            return Ok(());
        }
        self.complete(pair, PROBE_TEXT).await?;
        self.mark_ready(pair);
        info!("Translation model {} ready for {}", self.model, pair);
        Ok(())
    }

    async fn translate(&self, pair: LanguagePair, text: &str) -> PortResult<String> {
        self.complete(pair, text).await
    }
}
