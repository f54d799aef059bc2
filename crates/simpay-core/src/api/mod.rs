//! Remote collaborators: the auth and feed gateways.
//!
//! This module provides the `AuthGateway` and `FeedGateway` traits the core
//! depends on, plus two implementations of both:
//! - `ApiClient`: HTTP client for the SimPay mock API
//! - `MockBackend`: in-process backend with demo accounts and a seeded feed
//!
//! Failures are classified into `AuthFailure` / `FeedFailure` at this
//! boundary; `ApiError` only exists between the HTTP layer and classification.

pub mod client;
pub mod error;
pub mod gateway;
pub mod mock;

pub use client::{ApiClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_MS};
pub use error::{ApiError, AuthFailure, FeedFailure};
pub use gateway::{AuthGateway, AuthGrant, FeedGateway};
pub use mock::{MockBackend, DEMO_PASSWORD};
