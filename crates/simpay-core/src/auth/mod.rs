//! Authentication module for the session lifecycle and token storage.
//!
//! This module provides:
//! - `SessionManager`: restore-on-launch, sign-in, sign-up, sign-out and the
//!   single published `SessionState`
//! - `SecureTokenStore`: confidential storage for the access token, backed by
//!   the OS keychain (`KeyringTokenStore`) or memory (`MemoryTokenStore`)
//!
//! Stored tokens are trusted on launch; validity is checked lazily by the
//! first authenticated request.

pub mod credentials;
pub mod session;

pub use credentials::{KeyringTokenStore, MemoryTokenStore, SecureTokenStore, CREDENTIAL_KEY};
pub use session::{ActiveSession, AuthOutcome, SessionManager, SessionState, SessionStatus};
