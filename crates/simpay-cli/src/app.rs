//! Wiring of the session manager and feed engine for the terminal shell.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use simpay_core::api::{ApiClient, AuthGateway, FeedGateway, MockBackend};
use simpay_core::auth::{AuthOutcome, KeyringTokenStore, SecureTokenStore, SessionManager};
use simpay_core::cache::{FileProfileStore, ProfileStore};
use simpay_core::config::{Backend, Config};
use simpay_core::feed::{FeedCacheState, FeedSyncEngine, RefreshOutcome};

pub struct App {
    pub config: Config,
    pub session: SessionManager,
    pub feed: FeedSyncEngine,
}

impl App {
    /// Build the app from the saved config plus environment overrides.
    pub fn new() -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        config.apply_env_overrides();
        debug!(backend = ?config.backend, url = %config.api_base_url, "Config loaded");

        let cache_dir = config.cache_dir()?;
        let profiles: Arc<dyn ProfileStore> = Arc::new(FileProfileStore::new(cache_dir)?);
        let tokens: Arc<dyn SecureTokenStore> = Arc::new(KeyringTokenStore::new());

        let (auth, feed): (Arc<dyn AuthGateway>, Arc<dyn FeedGateway>) = match config.backend {
            Backend::Mock => {
                let (min, max) = config.mock_latency();
                let backend = Arc::new(
                    MockBackend::new()
                        .with_latency(min, max)
                        .with_feed_failure_rate(config.mock_feed_failure_rate),
                );
                let auth: Arc<dyn AuthGateway> = backend.clone();
                let feed: Arc<dyn FeedGateway> = backend;
                (auth, feed)
            }
            Backend::Http => {
                let client = Arc::new(
                    ApiClient::new(config.api_base_url.clone(), config.request_timeout())?
                        .with_token_store(tokens.clone()),
                );
                let auth: Arc<dyn AuthGateway> = client.clone();
                let feed: Arc<dyn FeedGateway> = client;
                (auth, feed)
            }
        };

        Ok(Self {
            session: SessionManager::new(tokens, profiles.clone(), auth),
            feed: FeedSyncEngine::new(profiles, feed),
            config,
        })
    }

    /// Remember the subject id of the last successful sign-in.
    pub fn remember_subject(&mut self, outcome: &AuthOutcome) {
        if let AuthOutcome::Authenticated(identity) = outcome {
            self.config.last_subject_id = Some(identity.subject_id.clone());
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
    }

    /// Refresh the feed and return the state it settled on.
    pub async fn load_feed(&self) -> (RefreshOutcome, FeedCacheState) {
        let outcome = self.feed.refresh().await;
        (outcome, self.feed.state())
    }
}
