//! Data models shared by the session and feed subsystems.
//!
//! - `Identity`, `Credential`: who is signed in and the bearer token proving it
//! - `FeedEntry`: one item of the authenticated home feed

pub mod feed;
pub mod identity;

pub use feed::FeedEntry;
pub use identity::{Credential, Identity};
