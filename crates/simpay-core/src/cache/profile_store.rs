use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::StorageError;

/// Key of the cached user profile record
pub const IDENTITY_KEY: &str = "identity";

/// Key of the cached home feed record
pub const FEED_CACHE_KEY: &str = "feedCache";

/// Durable, non-confidential key-value store for JSON records.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Profile store keeping one JSON file per key in a cache directory.
pub struct FileProfileStore {
    cache_dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.record_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let path = self.record_path(key);
        let tmp = self.cache_dir.join(format!("{}.json.tmp", key));
        let contents = serde_json::to_string_pretty(value)?;
        // Write-then-rename; readers never see a partial record
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, "Profile record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory profile store with failure injection and write counting.
#[derive(Debug, Clone, Default)]
pub struct MemoryProfileStore {
    records: Arc<Mutex<HashMap<String, Value>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_removes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.lock().insert(key.to_string(), value);
    }

    pub fn peek(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn injected(flag: &AtomicBool, what: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Self::injected(&self.fail_reads, "read")?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        Self::injected(&self.fail_writes, "write")?;
        self.insert(key, value.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        Self::injected(&self.fail_removes, "remove")?;
        self.lock().remove(key);
        Ok(())
    }
}
