//! Wiring of the core services and the entry points the chat layer calls.

use std::{sync::Arc, time::Duration};

use crate::{
    access::AccessRegistry,
    cache::ListingCache,
    dialog::{
        engine::{DialogEngine, PromptCancel},
        DialogInput, DialogKind, Outcome,
    },
    domain::{MessageRef, SessionKey, ShortUrl, UserId},
    ephemeral::EphemeralLinks,
    messaging::port::MessagingPort,
    ports::{ShortenerGateway, StateStore},
    session::Sessions,
    shorten::QuickShortener,
    Result,
};

pub struct BotCore {
    gateway: Arc<dyn ShortenerGateway>,
    cache: Arc<ListingCache>,
    access: Arc<AccessRegistry>,
    engine: DialogEngine,
    ephemeral: Arc<EphemeralLinks>,
    shortener: QuickShortener,
}

impl BotCore {
    pub async fn new(
        gateway: Arc<dyn ShortenerGateway>,
        store: Arc<dyn StateStore>,
        messenger: Arc<dyn MessagingPort>,
        admin: UserId,
        cache_ttl: Duration,
    ) -> Result<Self> {
        let sessions = Arc::new(Sessions::new(store.clone()));
        let cache = Arc::new(ListingCache::new(gateway.clone(), cache_ttl));
        let access = Arc::new(AccessRegistry::load(admin, store).await?);
        let ephemeral = Arc::new(EphemeralLinks::new(sessions.clone(), gateway.clone()));
        let engine = DialogEngine::new(
            sessions,
            messenger,
            gateway.clone(),
            cache.clone(),
            access.clone(),
        );
        let shortener = QuickShortener::new(gateway.clone(), cache.clone(), ephemeral.clone());

        Ok(Self {
            gateway,
            cache,
            access,
            engine,
            ephemeral,
            shortener,
        })
    }

    pub fn gateway(&self) -> &dyn ShortenerGateway {
        self.gateway.as_ref()
    }

    pub fn access(&self) -> &AccessRegistry {
        &self.access
    }

    pub fn dialogs(&self) -> &DialogEngine {
        &self.engine
    }

    pub fn shortener(&self) -> &QuickShortener {
        &self.shortener
    }

    pub async fn start_dialog(&self, key: SessionKey, kind: DialogKind) -> Result<()> {
        self.engine.start(key, kind).await
    }

    pub async fn step_dialog(&self, key: SessionKey, input: DialogInput) -> Result<Option<Outcome>> {
        self.engine.step(key, input).await
    }

    pub async fn cancel_dialog(&self, key: SessionKey) -> Result<bool> {
        self.engine.cancel(key).await
    }

    pub async fn cancel_from_prompt(
        &self,
        key: SessionKey,
        prompt: MessageRef,
    ) -> Result<PromptCancel> {
        self.engine.cancel_from_prompt(key, prompt).await
    }

    pub async fn record_speculative_link(&self, key: SessionKey, keyword: &str) -> Result<()> {
        self.ephemeral.record_speculative(key, keyword).await
    }

    pub async fn resolve_ephemeral(&self, key: SessionKey, kept: Option<&str>) -> Result<usize> {
        self.ephemeral.resolve(key, kept).await
    }

    pub async fn check_exists(&self, keyword: &str) -> Result<Option<ShortUrl>> {
        self.cache.exists(keyword).await
    }
}
