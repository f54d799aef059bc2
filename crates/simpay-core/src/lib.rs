//! SimPay client core.
//!
//! The session-and-feed synchronization core of the SimPay mobile client:
//!
//! - [`auth::SessionManager`] owns the authentication lifecycle (restore on
//!   launch, sign-in, sign-up, sign-out) and publishes the one authoritative
//!   [`auth::SessionState`].
//! - [`feed::FeedSyncEngine`] refreshes the home feed cache-then-revalidate and
//!   publishes [`feed::FeedCacheState`].
//!
//! Both depend only on collaborator traits: [`auth::SecureTokenStore`],
//! [`cache::ProfileStore`], [`api::AuthGateway`] and [`api::FeedGateway`].
//! Neither returns errors to its caller; storage failures degrade to
//! "absent" and gateway failures land in `last_error`.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;

pub use error::StorageError;
