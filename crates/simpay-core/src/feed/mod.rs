//! Home feed synchronization.
//!
//! `FeedSyncEngine` implements cache-then-revalidate: the cached feed is
//! published immediately, the remote feed is fetched, and the cache is only
//! rewritten when the fetched sequence differs from it. A failed fetch with
//! cached data is a soft "showing old data" state; with no data at all it is
//! a hard empty-state error.

pub mod sync;

pub use sync::{FeedCacheState, FeedCondition, FeedSyncEngine, RefreshOutcome};
