//! crates/messenger_core/src/translation.rs
//!
//! The Translation Gateway: ensures a model is resident, translates, and turns
//! every engine failure into "no translation available".

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::language::{LanguageCode, LanguagePair};
use crate::ports::TranslationEngine;

type PendingTranslation = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TranslationKey {
    text: String,
    pair: LanguagePair,
}

/// One shared engine call and the number of callers still waiting on it.
struct InFlight {
    pending: PendingTranslation,
    waiters: usize,
}

/// Coalesces concurrent identical requests onto one engine call.
pub struct TranslationGateway {
    engine: Arc<dyn TranslationEngine>,
    in_flight: Mutex<HashMap<TranslationKey, InFlight>>,
}

/// A caller's hold on an in-flight entry. Dropping it, on completion or when
/// the caller is cancelled, releases the hold.
struct Waiter<'a> {
    gateway: &'a TranslationGateway,
    key: TranslationKey,
    pending: PendingTranslation,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.gateway.leave(&self.key, &self.pending);
    }
}

impl TranslationGateway {
    pub fn new(engine: Arc<dyn TranslationEngine>) -> Self {
        Self {
            engine,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Translates `text`. `None` means no translation is available and the
    /// caller should fall back to the original. Same-language requests return
    /// the input without touching the engine.
    pub async fn translate(
        &self,
        text: &str,
        from: LanguageCode,
        to: LanguageCode,
    ) -> Option<String> {
        let pair = LanguagePair::new(from, to);
        if pair.is_identity() {
            return Some(text.to_string());
        }

        let key = TranslationKey {
            text: text.to_string(),
            pair,
        };
        let waiter = Waiter {
            pending: self.join_or_start(&key),
            gateway: self,
            key,
        };
        waiter.pending.clone().await
    }

    /// Number of distinct requests currently waiting on the engine.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TranslationKey, InFlight>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn join_or_start(&self, key: &TranslationKey) -> PendingTranslation {
        let mut map = self.lock();
        if let Some(existing) = map.get_mut(key) {
            info!("Joining in-flight translation {}", key.pair);
            existing.waiters += 1;
            return existing.pending.clone();
        }
        let pending = run_engine(self.engine.clone(), key.clone()).boxed().shared();
        map.insert(
            key.clone(),
            InFlight {
                pending: pending.clone(),
                waiters: 1,
            },
        );
        pending
    }

    /// Removes the entry for `key` once its last waiter is gone. An entry
    /// started later for the same key is left alone.
    fn leave(&self, key: &TranslationKey, pending: &PendingTranslation) {
        let mut map = self.lock();
        let Some(entry) = map.get_mut(key) else { return };
        if !entry.pending.ptr_eq(pending) {
            return;
        }
        entry.waiters = entry.waiters.saturating_sub(1);
        if entry.waiters == 0 {
            map.remove(key);
        }
    }
}

async fn run_engine(engine: Arc<dyn TranslationEngine>, key: TranslationKey) -> Option<String> {
    if let Err(e) = engine.ensure_model(key.pair).await {
        warn!("Failed to download translation model {}: {}", key.pair, e);
        return None;
    }
    match engine.translate(key.pair, &key.text).await {
        Ok(translated) => Some(translated),
        Err(e) => {
            warn!("Failed to translate text {}: {}", key.pair, e);
            None
        }
    }
}
