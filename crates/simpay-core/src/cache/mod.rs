//! Local persistence for non-secret data.
//!
//! `ProfileStore` holds the cached user profile (`identity`) and the cached
//! home feed (`feedCache`) as JSON records. `FileProfileStore` keeps them as
//! files in the cache directory; `MemoryProfileStore` is the in-process
//! variant used by tests.

pub mod cached;
pub mod profile_store;

pub use cached::{age_display, CachedData};
pub use profile_store::{
    FileProfileStore, MemoryProfileStore, ProfileStore, FEED_CACHE_KEY, IDENTITY_KEY,
};
