//! Remote collaborator seams.
//!
//! `SessionManager` and `FeedSyncEngine` only ever talk to the backend through
//! these traits, so the HTTP client, the in-process mock backend and scripted
//! test doubles are interchangeable. Implementations must settle (succeed or
//! fail) in bounded time; the core enforces no timeouts of its own.

use async_trait::async_trait;

use crate::models::{Credential, FeedEntry, Identity};

use super::error::{AuthFailure, FeedFailure};

/// What a successful authenticate or register call hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthGrant {
    pub credential: Credential,
    pub identity: Identity,
}

#[async_trait]
pub trait AuthGateway: Send + Sync {
    /// Exchange an existing account's credentials for a bearer token.
    async fn authenticate(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure>;

    /// Create an account and sign it in.
    async fn register(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure>;
}

#[async_trait]
pub trait FeedGateway: Send + Sync {
    /// Fetch the whole current feed in server order.
    async fn fetch_feed(&self) -> Result<Vec<FeedEntry>, FeedFailure>;
}
