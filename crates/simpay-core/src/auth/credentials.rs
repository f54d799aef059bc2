use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keyring::Entry;

use crate::error::StorageError;

/// Keychain service name for the access token
const SERVICE_NAME: &str = "simpay";

/// Key of the one secret record the client keeps
pub const CREDENTIAL_KEY: &str = "credential";

/// Confidential, durable key-value store for the access token.
#[async_trait]
pub trait SecureTokenStore: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Token store backed by the OS keychain.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Keychain calls block on platform IPC, so they run off the async workers.
async fn run_blocking<T, F>(op: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StorageError::Unavailable(format!("keychain task failed: {}", e)))?
}

#[async_trait]
impl SecureTokenStore for KeyringTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entry = self.entry(key)?;
        run_blocking(move || match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entry = self.entry(key)?;
        let value = value.to_string();
        run_blocking(move || Ok(entry.set_password(&value)?)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let entry = self.entry(key)?;
        run_blocking(move || match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        })
        .await
    }
}

/// In-memory token store with failure injection, for tests and ephemeral runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    records: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a credential.
    pub fn with_credential(token: &str) -> Self {
        let store = Self::new();
        store.insert(CREDENTIAL_KEY, token);
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
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
impl SecureTokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Self::injected(&self.fail_reads, "read")?;
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        Self::injected(&self.fail_writes, "write")?;
        self.insert(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        Self::injected(&self.fail_deletes, "delete")?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_roundtrip_and_idempotent_delete() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(CREDENTIAL_KEY).await.unwrap(), None);

        store.set(CREDENTIAL_KEY, "fake-token-1").await.unwrap();
        assert_eq!(
            store.get(CREDENTIAL_KEY).await.unwrap().as_deref(),
            Some("fake-token-1")
        );
        assert_eq!(store.write_count(), 1);

        store.delete(CREDENTIAL_KEY).await.unwrap();
        store.delete(CREDENTIAL_KEY).await.unwrap();
        assert_eq!(store.get(CREDENTIAL_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_injected_failures() {
        let store = MemoryTokenStore::with_credential("t");
        store.set_fail_reads(true);
        assert!(store.get(CREDENTIAL_KEY).await.is_err());

        store.set_fail_writes(true);
        assert!(store.set(CREDENTIAL_KEY, "other").await.is_err());
        assert_eq!(store.peek(CREDENTIAL_KEY).as_deref(), Some("t"));

        store.set_fail_deletes(true);
        assert!(store.delete(CREDENTIAL_KEY).await.is_err());
        assert_eq!(store.peek(CREDENTIAL_KEY).as_deref(), Some("t"));
    }
}
