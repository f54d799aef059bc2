use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{AuthFailure, AuthGateway, AuthGrant};
use crate::cache::{ProfileStore, IDENTITY_KEY};
use crate::models::{Credential, Identity};

use super::credentials::{SecureTokenStore, CREDENTIAL_KEY};

/// Where the session lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    /// Before `restore()` has run
    #[default]
    Unknown,
    Restoring,
    Authenticating,
    Authenticated,
    Unauthenticated,
}

/// Identity and credential always travel together.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub identity: Identity,
    pub credential: Credential,
}

/// The process-wide authentication state, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionState {
    status: SessionStatus,
    session: Option<ActiveSession>,
    last_error: Option<AuthFailure>,
}

impl SessionState {
    fn signed_out(last_error: Option<AuthFailure>) -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            session: None,
            last_error,
        }
    }

    fn signed_in(session: ActiveSession) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            session: Some(session),
            last_error: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.session.as_ref().map(|s| &s.identity)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.session.as_ref().map(|s| &s.credential)
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Unknown | SessionStatus::Restoring | SessionStatus::Authenticating
        )
    }

    pub fn last_error(&self) -> Option<&AuthFailure> {
        self.last_error.as_ref()
    }
}

/// Result of `sign_in` / `sign_up`.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Failed(AuthFailure),
    /// Another sign-in, sign-up or restore was already in flight; nothing changed
    Busy,
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum AuthFlow {
    SignIn,
    SignUp,
}

/// Owns the authentication lifecycle: restore, sign-in, sign-up, sign-out.
///
/// The current `SessionState` is published through a `watch` channel; screens
/// call `subscribe()` and never mutate it. Restore, sign-in and sign-up share
/// one operation guard, so a call made while another is running returns
/// immediately with `AuthOutcome::Busy` instead of queueing.
pub struct SessionManager {
    tokens: Arc<dyn SecureTokenStore>,
    profiles: Arc<dyn ProfileStore>,
    gateway: Arc<dyn AuthGateway>,
    state_tx: watch::Sender<SessionState>,
    op_guard: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        tokens: Arc<dyn SecureTokenStore>,
        profiles: Arc<dyn ProfileStore>,
        gateway: Arc<dyn AuthGateway>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::default());
        Self {
            tokens,
            profiles,
            gateway,
            state_tx,
            op_guard: Mutex::new(()),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().is_authenticated()
    }

    /// Decide the launch state from durable storage, without touching the
    /// network. A stored token is trusted until the first authenticated
    /// request says otherwise.
    ///
    /// Returns whether the session is authenticated afterwards.
    pub async fn restore(&self) -> bool {
        let Ok(_guard) = self.op_guard.try_lock() else {
            warn!("Restore requested while another session operation is in flight");
            return self.is_authenticated();
        };

        self.state_tx
            .send_modify(|state| state.status = SessionStatus::Restoring);

        let credential = self.read_credential().await;
        let identity = self.read_identity().await;

        let next = match (credential, identity) {
            (Some(credential), Some(identity)) => {
                info!(subject = %identity.subject_id, "Session restored");
                SessionState::signed_in(ActiveSession {
                    identity,
                    credential,
                })
            }
            (credential, identity) => {
                debug!(
                    has_credential = credential.is_some(),
                    has_identity = identity.is_some(),
                    "No complete stored session"
                );
                SessionState::signed_out(None)
            }
        };
        let authenticated = next.is_authenticated();
        self.state_tx.send_replace(next);
        authenticated
    }

    pub async fn sign_in(&self, subject_id: &str, secret: &str) -> AuthOutcome {
        self.run_auth_flow(AuthFlow::SignIn, subject_id, secret).await
    }

    /// Same contract as `sign_in`, but creates the account first.
    pub async fn sign_up(&self, subject_id: &str, secret: &str) -> AuthOutcome {
        self.run_auth_flow(AuthFlow::SignUp, subject_id, secret).await
    }

    /// Always ends signed out. Durable cleanup is best-effort; its failures
    /// are logged and swallowed.
    pub async fn sign_out(&self) {
        self.clear_durable().await;
        self.state_tx.send_replace(SessionState::signed_out(None));
        info!("Signed out");
    }

    async fn run_auth_flow(&self, flow: AuthFlow, subject_id: &str, secret: &str) -> AuthOutcome {
        let Ok(_guard) = self.op_guard.try_lock() else {
            warn!(?flow, "Rejected: another session operation is in flight");
            return AuthOutcome::Busy;
        };

        let was_authenticated = self.is_authenticated();
        self.state_tx.send_modify(|state| {
            state.status = SessionStatus::Authenticating;
            state.last_error = None;
        });

        let result = match flow {
            AuthFlow::SignIn => self.gateway.authenticate(subject_id, secret).await,
            AuthFlow::SignUp => self.gateway.register(subject_id, secret).await,
        };

        match result {
            Ok(grant) => {
                // Persist before publishing so no observer sees a session
                // that is not yet on disk.
                self.persist(&grant).await;
                let identity = grant.identity.clone();
                self.state_tx.send_replace(SessionState::signed_in(ActiveSession {
                    identity: grant.identity,
                    credential: grant.credential,
                }));
                info!(?flow, subject = %identity.subject_id, "Authenticated");
                AuthOutcome::Authenticated(identity)
            }
            Err(failure) => {
                warn!(?flow, kind = failure.kind(), error = %failure, "Authentication failed");
                if was_authenticated {
                    // The previous session is dropped from memory; durable
                    // storage must not bring it back on the next restore.
                    self.clear_durable().await;
                }
                self.state_tx
                    .send_replace(SessionState::signed_out(Some(failure.clone())));
                AuthOutcome::Failed(failure)
            }
        }
    }

    async fn read_credential(&self) -> Option<Credential> {
        match self.tokens.get(CREDENTIAL_KEY).await {
            Ok(Some(token)) if !token.is_empty() => Some(Credential::new(token)),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored credential; treating as signed out");
                None
            }
        }
    }

    async fn read_identity(&self) -> Option<Identity> {
        let value = match self.profiles.get(IDENTITY_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read stored profile; treating as signed out");
                return None;
            }
        };
        match serde_json::from_value::<Identity>(value) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Stored profile is malformed; treating as signed out");
                None
            }
        }
    }

    /// Write credential then identity. If either write fails the other
    /// record is removed, so durable storage never holds half a session.
    async fn persist(&self, grant: &AuthGrant) {
        if let Err(e) = self.tokens.set(CREDENTIAL_KEY, grant.credential.as_str()).await {
            warn!(error = %e, "Failed to store credential; session will not survive restart");
            self.clear_durable().await;
            return;
        }

        let written = match serde_json::to_value(&grant.identity) {
            Ok(value) => self.profiles.set(IDENTITY_KEY, &value).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            warn!(error = %e, "Failed to store profile; session will not survive restart");
            self.clear_durable().await;
        }
    }

    async fn clear_durable(&self) {
        let (token_result, profile_result) = futures::join!(
            self.tokens.delete(CREDENTIAL_KEY),
            self.profiles.remove(IDENTITY_KEY),
        );
        if let Err(e) = token_result {
            warn!(error = %e, "Failed to delete stored credential");
        }
        if let Err(e) = profile_result {
            warn!(error = %e, "Failed to delete stored profile");
        }
    }
}
