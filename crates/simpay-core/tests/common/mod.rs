#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::oneshot;

use simpay_core::api::{FeedFailure, FeedGateway, MockBackend};
use simpay_core::auth::{MemoryTokenStore, SessionManager, CREDENTIAL_KEY};
use simpay_core::cache::{CachedData, MemoryProfileStore, FEED_CACHE_KEY, IDENTITY_KEY};
use simpay_core::feed::FeedSyncEngine;
use simpay_core::models::FeedEntry;

pub type FetchResult = Result<Vec<FeedEntry>, FeedFailure>;

/// A feed entry with a fixed timestamp offset by `id`.
pub fn entry(id: &str, title: &str) -> FeedEntry {
    let base = DateTime::from_timestamp(1_736_510_400, 0).unwrap_or_default();
    let offset = id.parse::<i64>().unwrap_or(0);
    FeedEntry::new(id, title, format!("subtitle {}", id), base + Duration::hours(offset))
}

/// Feed gateway that answers from a queue of canned results.
#[derive(Default)]
pub struct ScriptedFeed {
    results: Mutex<VecDeque<FetchResult>>,
    calls: AtomicUsize,
}

impl ScriptedFeed {
    pub fn new(results: Vec<FetchResult>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedGateway for ScriptedFeed {
    async fn fetch_feed(&self) -> FetchResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FeedFailure::Unknown("script exhausted".into())))
    }
}

/// Feed gateway whose calls complete only when the test releases them,
/// in whatever order the test chooses.
#[derive(Default)]
pub struct GatedFeed {
    gates: Mutex<VecDeque<oneshot::Receiver<FetchResult>>>,
}

impl GatedFeed {
    /// Register the gate for the next call to `fetch_feed`.
    pub fn next_call(&self) -> oneshot::Sender<FetchResult> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }
}

#[async_trait]
impl FeedGateway for GatedFeed {
    async fn fetch_feed(&self) -> FetchResult {
        let gate = self.gates.lock().unwrap().pop_front().expect("no gate registered");
        gate.await.unwrap_or_else(|_| Err(FeedFailure::Unknown("gate dropped".into())))
    }
}

pub struct SessionHarness {
    pub manager: SessionManager,
    pub tokens: MemoryTokenStore,
    pub profiles: MemoryProfileStore,
}

pub fn session_harness() -> SessionHarness {
    let tokens = MemoryTokenStore::new();
    let profiles = MemoryProfileStore::new();
    let manager = SessionManager::new(
        Arc::new(tokens.clone()),
        Arc::new(profiles.clone()),
        Arc::new(MockBackend::new()),
    );
    SessionHarness {
        manager,
        tokens,
        profiles,
    }
}

/// Seed both stores with a complete stored session.
pub fn store_session(tokens: &MemoryTokenStore, profiles: &MemoryProfileStore, subject_id: &str) {
    tokens.insert(CREDENTIAL_KEY, "fake-token-1700000000000-abc123");
    profiles.insert(
        IDENTITY_KEY,
        json!({"cpfOrEmail": subject_id, "name": "Usuário Teste"}),
    );
}

pub fn feed_engine(profiles: &MemoryProfileStore, gateway: Arc<dyn FeedGateway>) -> FeedSyncEngine {
    FeedSyncEngine::new(Arc::new(profiles.clone()), gateway)
}

/// Seed the durable feed cache in the current envelope layout.
pub fn store_feed(profiles: &MemoryProfileStore, entries: &[FeedEntry]) {
    let record = CachedData {
        data: entries.to_vec(),
        cached_at: Utc::now() - Duration::minutes(10),
    };
    profiles.insert(FEED_CACHE_KEY, serde_json::to_value(record).unwrap());
}

/// Entries currently held in the durable feed cache.
pub fn stored_feed(profiles: &MemoryProfileStore) -> Option<Vec<FeedEntry>> {
    let value = profiles.peek(FEED_CACHE_KEY)?;
    let record: CachedData<Vec<FeedEntry>> = serde_json::from_value(value).ok()?;
    Some(record.data)
}
