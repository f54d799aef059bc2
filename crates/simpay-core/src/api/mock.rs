//! In-process stand-in for the SimPay backend.
//!
//! `MockBackend` implements both gateways against an in-memory account table
//! and a seeded home feed, with optional simulated latency and random feed
//! failures. All randomness in the client lives here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{Credential, FeedEntry, Identity};

use super::error::{AuthFailure, FeedFailure};
use super::gateway::{AuthGateway, AuthGrant, FeedGateway};

/// Seed feed served by a fresh backend
const SEED_FEED: &str = include_str!("../../data/home-feed.json");

/// Password of the seeded demo accounts
pub const DEMO_PASSWORD: &str = "Password123";

/// Display name given to accounts registered with a CPF
const DEFAULT_DISPLAY_NAME: &str = "Novo Usuário";

#[derive(Deserialize)]
struct SeedFeed {
    items: Vec<FeedEntry>,
}

struct MockAccount {
    password: String,
    identity: Identity,
}

pub struct MockBackend {
    accounts: Mutex<HashMap<String, MockAccount>>,
    feed: Mutex<Vec<FeedEntry>>,
    latency: (Duration, Duration),
    feed_failure_rate: f64,
}

impl MockBackend {
    /// Backend with the demo accounts and seed feed, no latency, no faults.
    pub fn new() -> Self {
        let mut accounts = HashMap::new();
        for (subject_id, name) in [
            ("teste@simpay.com", "Usuário Teste"),
            ("123.456.789-00", "Usuário CPF"),
        ] {
            accounts.insert(
                subject_id.to_string(),
                MockAccount {
                    password: DEMO_PASSWORD.to_string(),
                    identity: Identity::new(subject_id, name),
                },
            );
        }

        let feed = match serde_json::from_str::<SeedFeed>(SEED_FEED) {
            Ok(seed) => seed.items,
            Err(e) => {
                warn!(error = %e, "Seed feed is malformed; starting empty");
                Vec::new()
            }
        };

        Self {
            accounts: Mutex::new(accounts),
            feed: Mutex::new(feed),
            latency: (Duration::ZERO, Duration::ZERO),
            feed_failure_rate: 0.0,
        }
    }

    /// Delay every call by a uniformly random duration in `min..=max`.
    pub fn with_latency(mut self, min: Duration, max: Duration) -> Self {
        self.latency = (min, max.max(min));
        self
    }

    /// Fail this fraction of feed fetches with a server error.
    pub fn with_feed_failure_rate(mut self, rate: f64) -> Self {
        self.feed_failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Replace the feed the backend serves.
    pub fn set_feed(&self, entries: Vec<FeedEntry>) {
        *self.feed.lock().unwrap_or_else(|p| p.into_inner()) = entries;
    }

    async fn simulate_latency(&self) {
        let (min, max) = self.latency;
        if max.is_zero() {
            return;
        }
        let delay = rand::thread_rng().gen_range(min..=max);
        tokio::time::sleep(delay).await;
    }

    fn should_fail_feed(&self) -> bool {
        self.feed_failure_rate > 0.0 && rand::thread_rng().gen_bool(self.feed_failure_rate)
    }

    fn issue_token() -> Credential {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();
        Credential::new(format!(
            "fake-token-{}-{}",
            Utc::now().timestamp_millis(),
            suffix.to_lowercase()
        ))
    }

    /// E-mail accounts are named after the local part up to the first dot.
    fn display_name_for(subject_id: &str) -> String {
        match subject_id.split_once('@') {
            Some((local, _)) => local.split('.').next().unwrap_or(local).to_string(),
            None => DEFAULT_DISPLAY_NAME.to_string(),
        }
    }

    fn accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, MockAccount>> {
        self.accounts.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthGateway for MockBackend {
    async fn authenticate(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure> {
        self.simulate_latency().await;

        let accounts = self.accounts();
        match accounts.get(subject_id) {
            Some(account) if account.password == secret => Ok(AuthGrant {
                credential: Self::issue_token(),
                identity: account.identity.clone(),
            }),
            _ => {
                debug!(subject = subject_id, "Mock login rejected");
                Err(AuthFailure::InvalidCredentials)
            }
        }
    }

    async fn register(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure> {
        self.simulate_latency().await;

        let mut accounts = self.accounts();
        if accounts.contains_key(subject_id) {
            return Err(AuthFailure::AlreadyRegistered);
        }

        let identity = Identity::new(subject_id, Self::display_name_for(subject_id));
        accounts.insert(
            subject_id.to_string(),
            MockAccount {
                password: secret.to_string(),
                identity: identity.clone(),
            },
        );
        debug!(subject = subject_id, "Mock account created");

        Ok(AuthGrant {
            credential: Self::issue_token(),
            identity,
        })
    }
}

#[async_trait]
impl FeedGateway for MockBackend {
    async fn fetch_feed(&self) -> Result<Vec<FeedEntry>, FeedFailure> {
        self.simulate_latency().await;

        if self.should_fail_feed() {
            return Err(FeedFailure::Server(
                "simulated failure while fetching the feed".to_string(),
            ));
        }
        Ok(self.feed.lock().unwrap_or_else(|p| p.into_inner()).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_accounts_can_sign_in() {
        let backend = MockBackend::new();
        let grant = backend
            .authenticate("teste@simpay.com", DEMO_PASSWORD)
            .await
            .expect("demo login");
        assert!(grant.credential.as_str().starts_with("fake-token-"));
        assert_eq!(grant.identity.display_name, "Usuário Teste");

        let grant = backend
            .authenticate("123.456.789-00", DEMO_PASSWORD)
            .await
            .expect("cpf login");
        assert_eq!(grant.identity.display_name, "Usuário CPF");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_invalid_credentials() {
        let backend = MockBackend::new();
        assert_eq!(
            backend.authenticate("teste@simpay.com", "nope").await,
            Err(AuthFailure::InvalidCredentials)
        );
        assert_eq!(
            backend.authenticate("ghost@simpay.com", DEMO_PASSWORD).await,
            Err(AuthFailure::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn test_register_then_login_and_duplicate() {
        let backend = MockBackend::new();
        let grant = backend
            .register("joao.silva@example.com", "Segredo1")
            .await
            .expect("register");
        assert_eq!(grant.identity.display_name, "joao");

        assert!(backend
            .authenticate("joao.silva@example.com", "Segredo1")
            .await
            .is_ok());
        assert_eq!(
            backend.register("joao.silva@example.com", "other").await,
            Err(AuthFailure::AlreadyRegistered)
        );
        assert_eq!(
            backend.register("teste@simpay.com", DEMO_PASSWORD).await,
            Err(AuthFailure::AlreadyRegistered)
        );
    }

    #[test]
    fn test_display_name_for_cpf() {
        assert_eq!(MockBackend::display_name_for("987.654.321-00"), "Novo Usuário");
        assert_eq!(MockBackend::display_name_for("ana@simpay.com"), "ana");
    }

    #[tokio::test]
    async fn test_seed_feed_and_fault_injection() {
        let backend = MockBackend::new();
        let feed = backend.fetch_feed().await.expect("seed feed");
        assert_eq!(feed.len(), 4);
        assert_eq!(feed[0].id, "1");

        let failing = MockBackend::new().with_feed_failure_rate(1.0);
        assert_eq!(failing.fetch_feed().await.map_err(|e| e.kind()), Err("server"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let a = MockBackend::issue_token();
        let b = MockBackend::issue_token();
        assert_ne!(a, b);
    }
}
