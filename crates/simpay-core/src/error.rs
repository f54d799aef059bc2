use thiserror::Error;

/// Failures from the durable stores.
///
/// These never reach callers of `SessionManager` or `FeedSyncEngine`; both
/// log them and degrade to "absent".
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}
