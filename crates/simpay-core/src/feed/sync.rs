use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{FeedFailure, FeedGateway};
use crate::cache::{age_display, CachedData, ProfileStore, FEED_CACHE_KEY};
use crate::models::FeedEntry;

/// Published view of the home feed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedCacheState {
    pub entries: Vec<FeedEntry>,
    pub is_refreshing: bool,
    /// Entries came from the durable cache and no fetch has confirmed them yet
    pub is_stale: bool,
    pub last_error: Option<FeedFailure>,
    /// When the durable cache was last written, if known
    pub cached_at: Option<DateTime<Utc>>,
}

/// What the feed screen should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedCondition {
    /// Nothing to show yet, fetch in progress
    Loading,
    Fresh,
    /// Showing cached data while revalidating
    Stale,
    /// Showing cached data because the last fetch failed
    StaleWithError,
    Empty,
    /// No data at all and the fetch failed
    EmptyWithError,
}

impl FeedCacheState {
    pub fn condition(&self) -> FeedCondition {
        match (
            self.entries.is_empty(),
            self.is_stale,
            self.is_refreshing,
            self.last_error.is_some(),
        ) {
            (true, _, true, _) => FeedCondition::Loading,
            (true, _, false, true) => FeedCondition::EmptyWithError,
            (true, _, false, false) => FeedCondition::Empty,
            (false, true, _, true) => FeedCondition::StaleWithError,
            (false, true, _, false) => FeedCondition::Stale,
            (false, false, _, _) => FeedCondition::Fresh,
        }
    }

    pub fn age_display(&self) -> Option<String> {
        self.cached_at.map(|at| age_display(at, Utc::now()))
    }
}

/// Result of one `refresh()` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The fetched feed differed from the cache and replaced it
    Updated,
    /// The fetched feed matched the cache; nothing was written
    Unchanged,
    Failed(FeedFailure),
}

/// The feed-cache record, current envelope or the older bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedCacheRecord {
    Envelope(CachedData<Vec<FeedEntry>>),
    Bare(Vec<FeedEntry>),
}

/// Counts a refresh as in flight until it commits or is dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter,
            finished: false,
        }
    }

    /// Leave the in-flight set; returns whether other refreshes remain.
    fn finish(&mut self) -> bool {
        self.finished = true;
        self.counter.fetch_sub(1, Ordering::SeqCst) > 1
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Cache-then-revalidate refresh of the home feed.
///
/// Every `refresh()` publishes twice: first whatever the durable cache holds
/// (marked stale), then the reconciled result of the remote fetch. Refreshes
/// may overlap. Their reconcile-and-publish phases are serialized, so the
/// durable cache and the published state both end up reflecting the fetch
/// that completed last.
pub struct FeedSyncEngine {
    profiles: Arc<dyn ProfileStore>,
    gateway: Arc<dyn FeedGateway>,
    state_tx: watch::Sender<FeedCacheState>,
    in_flight: AtomicUsize,
    /// Bumped by every successful commit
    generation: AtomicU64,
    commit_lock: Mutex<()>,
}

impl FeedSyncEngine {
    pub fn new(profiles: Arc<dyn ProfileStore>, gateway: Arc<dyn FeedGateway>) -> Self {
        let (state_tx, _) = watch::channel(FeedCacheState::default());
        Self {
            profiles,
            gateway,
            state_tx,
            in_flight: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FeedCacheState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedCacheState> {
        self.state_tx.subscribe()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let mut in_flight = InFlight::enter(&self.in_flight);
        let started_at = self.generation.load(Ordering::SeqCst);

        // Phase 1: publish what we already have
        let (cached_entries, cached_at) = self.load_cached().await.unwrap_or_default();
        let available = if cached_entries.is_empty() {
            self.state_tx.borrow().entries.clone()
        } else {
            cached_entries.clone()
        };
        self.state_tx.send_modify(|state| {
            if !available.is_empty() {
                state.entries = available.clone();
                state.is_stale = true;
            }
            if cached_at.is_some() {
                state.cached_at = cached_at;
            }
            state.is_refreshing = true;
            state.last_error = None;
        });
        debug!(cached = cached_entries.len(), "Feed refresh started");

        // Phase 2: revalidate
        let fetched = self.gateway.fetch_feed().await;

        let _commit = self.commit_lock.lock().await;
        let still_refreshing = in_flight.finish();

        match fetched {
            Ok(entries) => {
                // A refresh that committed in the meantime may have rewritten
                // the cache since our pre-fetch read.
                let baseline = if self.generation.load(Ordering::SeqCst) != started_at {
                    self.load_cached()
                        .await
                        .map(|(cached, _)| cached)
                        .unwrap_or_default()
                } else {
                    cached_entries
                };
                let changed = entries != baseline;
                let mut written_at = None;
                if changed {
                    written_at = self.store_cached(&entries).await;
                } else {
                    debug!("Fetched feed matches cache; skipping write");
                }
                self.generation.fetch_add(1, Ordering::SeqCst);

                info!(entries = entries.len(), changed, "Feed refreshed");
                self.state_tx.send_modify(|state| {
                    state.entries = entries;
                    state.is_stale = false;
                    state.is_refreshing = still_refreshing;
                    state.last_error = None;
                    if written_at.is_some() {
                        state.cached_at = written_at;
                    }
                });

                if changed {
                    RefreshOutcome::Updated
                } else {
                    RefreshOutcome::Unchanged
                }
            }
            Err(failure) => {
                // A refresh that completed successfully in the meantime has
                // newer data than our pre-fetch snapshot.
                let fallback = if self.generation.load(Ordering::SeqCst) != started_at {
                    self.state_tx.borrow().entries.clone()
                } else {
                    available
                };

                warn!(
                    kind = failure.kind(),
                    error = %failure,
                    showing_cached = !fallback.is_empty(),
                    "Feed refresh failed"
                );
                let error = failure.clone();
                self.state_tx.send_modify(|state| {
                    state.is_stale = !fallback.is_empty();
                    state.entries = fallback;
                    state.is_refreshing = still_refreshing;
                    state.last_error = Some(error);
                });
                RefreshOutcome::Failed(failure)
            }
        }
    }

    /// Cached entries and their write time (unknown for the bare layout).
    async fn load_cached(&self) -> Option<(Vec<FeedEntry>, Option<DateTime<Utc>>)> {
        let value = match self.profiles.get(FEED_CACHE_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read feed cache; continuing without it");
                return None;
            }
        };
        match serde_json::from_value::<FeedCacheRecord>(value) {
            Ok(FeedCacheRecord::Envelope(cached)) => Some((cached.data, Some(cached.cached_at))),
            Ok(FeedCacheRecord::Bare(entries)) => Some((entries, None)),
            Err(e) => {
                warn!(error = %e, "Feed cache is malformed; ignoring it");
                None
            }
        }
    }

    /// Returns the write time, or `None` if the write failed (logged).
    async fn store_cached(&self, entries: &[FeedEntry]) -> Option<DateTime<Utc>> {
        let record = CachedData::new(entries);
        let written = match serde_json::to_value(&record) {
            Ok(value) => self.profiles.set(FEED_CACHE_KEY, &value).await,
            Err(e) => Err(e.into()),
        };
        match written {
            Ok(()) => Some(record.cached_at),
            Err(e) => {
                warn!(error = %e, "Failed to write feed cache");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str) -> FeedEntry {
        let at = DateTime::from_timestamp(1_736_510_400, 0).unwrap_or_default();
        FeedEntry::new(id, format!("Item {}", id), "", at)
    }

    #[test]
    fn test_condition_classification() {
        let mut state = FeedCacheState {
            is_refreshing: true,
            ..Default::default()
        };
        assert_eq!(state.condition(), FeedCondition::Loading);

        state.is_refreshing = false;
        assert_eq!(state.condition(), FeedCondition::Empty);

        state.last_error = Some(FeedFailure::Network);
        assert_eq!(state.condition(), FeedCondition::EmptyWithError);

        state.entries = vec![entry("1")];
        state.is_stale = true;
        assert_eq!(state.condition(), FeedCondition::StaleWithError);

        state.last_error = None;
        assert_eq!(state.condition(), FeedCondition::Stale);

        state.is_stale = false;
        assert_eq!(state.condition(), FeedCondition::Fresh);
    }

    #[test]
    fn test_feed_cache_record_accepts_bare_array() {
        let bare = serde_json::json!([
            {"id": "1", "title": "A", "subtitle": "", "createdAt": "2025-01-10T12:00:00Z"}
        ]);
        let record: FeedCacheRecord = serde_json::from_value(bare).expect("parse bare record");
        assert!(matches!(record, FeedCacheRecord::Bare(ref e) if e.len() == 1));

        let envelope = serde_json::to_value(CachedData::new(vec![entry("1")])).expect("serialize");
        let record: FeedCacheRecord = serde_json::from_value(envelope).expect("parse envelope");
        assert!(matches!(record, FeedCacheRecord::Envelope(ref c) if c.data == vec![entry("1")]));
    }
}
