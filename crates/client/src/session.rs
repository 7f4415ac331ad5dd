//! Session manager: credential lifecycle and transparent token refresh.
//!
//! Exactly one credential is active per manager. All outgoing authenticated
//! calls go through [`SessionManager::send_authorized`], which attaches the
//! current access token at send time and handles the refresh-and-replay
//! path for calls rejected with 401/403.
//!
//! # Refresh discipline
//!
//! At most one refresh is in flight at a time. Concurrent callers queue on
//! an async mutex and reuse the winner's outcome instead of issuing a
//! second request, which would race to consume the same one-time refresh
//! token. A refresh rejected by the server is unrecoverable: the manager
//! transitions back to anonymous and purges the persisted credential. A
//! refresh that merely failed to reach the server leaves the session
//! intact.

use std::sync::{Arc, PoisonError, RwLock};

use secrecy::SecretString;
use tracing::instrument;

use velvet_core::{Credential, User};

use crate::api::{ApiClient, NewUser};
use crate::error::ApiError;
use crate::storage::{StateStore, StorageError, keys};

/// Manages the authentication credential for one client context.
///
/// Cheaply cloneable via `Arc`; all clones share the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    store: Arc<dyn StateStore>,
    credential: RwLock<Option<Credential>>,
    /// Serializes refreshes; see module docs.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Create a session manager, rehydrating any persisted credential.
    ///
    /// A credential that fails to deserialize (e.g., written by an older
    /// version) is discarded rather than surfaced as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(api: ApiClient, store: Arc<dyn StateStore>) -> Result<Self, StorageError> {
        let credential = store
            .get(keys::CREDENTIAL)?
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(credential) => Some(credential),
                Err(e) => {
                    tracing::warn!("Discarding unreadable persisted credential: {e}");
                    None
                }
            });

        Ok(Self {
            inner: Arc::new(SessionInner {
                api,
                store,
                credential: RwLock::new(credential),
                refresh_gate: tokio::sync::Mutex::new(()),
            }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Whether a credential is currently active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// The current credential, if any.
    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.read()
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.read().map(|credential| credential.user)
    }

    fn read(&self) -> Option<Credential> {
        self.inner
            .credential
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the in-memory credential and persist the change.
    fn replace(&self, credential: Option<Credential>) -> Result<(), StorageError> {
        {
            let mut slot = self
                .inner
                .credential
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            slot.clone_from(&credential);
        }

        match credential {
            Some(credential) => {
                let raw = serde_json::to_string(&credential)
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
                self.inner.store.put(keys::CREDENTIAL, &raw)
            }
            None => self.inner.store.delete(keys::CREDENTIAL),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Sign in and store the resulting credential.
    ///
    /// On failure nothing is stored or changed.
    ///
    /// # Errors
    ///
    /// [`ApiError::AuthRejected`] for bad credentials, [`ApiError::Network`]
    /// if the server is unreachable.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn sign_in(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Credential, ApiError> {
        let credential = self.inner.api.sign_in(username, password).await?;
        self.replace(Some(credential.clone()))?;
        tracing::info!(user = %credential.user.username, "Signed in");
        Ok(credential)
    }

    /// Create a new account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns an error if the account cannot be created.
    pub async fn sign_up(&self, new_user: &NewUser) -> Result<User, ApiError> {
        self.inner.api.sign_up(new_user).await
    }

    /// Sign out, clearing the stored credential.
    ///
    /// Always safe to call; needs no network round trip. Storage failures
    /// are logged, not surfaced - the in-memory state is already anonymous.
    pub fn sign_out(&self) {
        if let Err(e) = self.replace(None) {
            tracing::warn!("Failed to purge persisted credential on sign-out: {e}");
        }
        tracing::info!("Signed out");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Refresh
    // ─────────────────────────────────────────────────────────────────────

    /// Obtain a fresh access token using the stored refresh token.
    ///
    /// Concurrent callers share a single network refresh: whoever loses the
    /// race for the gate re-checks the credential and reuses the winner's
    /// result. If the server reissues a refresh token it replaces the
    /// stored one; otherwise the old one is kept.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotAuthenticated`] when anonymous. A rejected refresh
    /// returns [`ApiError::AuthRejected`] *after* forcing sign-out; a
    /// [`ApiError::Network`] failure leaves the session untouched.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<Credential, ApiError> {
        let stale = self.read().ok_or(ApiError::NotAuthenticated)?;

        let _gate = self.inner.refresh_gate.lock().await;

        // Another caller may have completed a refresh while we waited.
        let current = self.read().ok_or(ApiError::NotAuthenticated)?;
        if current.access_token != stale.access_token {
            return Ok(current);
        }

        match self.inner.api.refresh(&current.refresh_token).await {
            Ok(grant) => {
                let refreshed = Credential {
                    access_token: grant.access_token,
                    refresh_token: grant.refresh_token.unwrap_or(current.refresh_token),
                    token_type: current.token_type,
                    user: current.user,
                    issued_at: chrono::Utc::now().timestamp(),
                    expires_in: grant.expires_in.or(current.expires_in),
                };
                self.replace(Some(refreshed.clone()))?;
                tracing::debug!("Access token refreshed");
                Ok(refreshed)
            }
            Err(err @ ApiError::Network(_)) => {
                // The server never saw the refresh token; it is still valid.
                Err(err)
            }
            Err(err) => {
                // A stale refresh token is permanently invalid. Do not retry;
                // force the session back to anonymous.
                tracing::warn!("Refresh rejected, signing out: {err}");
                self.sign_out();
                Err(err)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Request decoration
    // ─────────────────────────────────────────────────────────────────────

    /// Run an authenticated call, attaching the current access token at
    /// send time.
    ///
    /// If the token is known to be expired it is refreshed proactively
    /// first. If the call comes back 401/403, one refresh-and-replay is
    /// attempted; the replay's outcome is surfaced as-is.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotAuthenticated`] when anonymous; otherwise whatever
    /// the call (or its single replay) returns.
    pub async fn send_authorized<T, F, Fut>(&self, call: F) -> Result<T, ApiError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let credential = self.read().ok_or(ApiError::NotAuthenticated)?;

        let token = if credential.is_expired(chrono::Utc::now().timestamp()) {
            self.refresh().await?.access_token
        } else {
            credential.access_token
        };

        match call(token).await {
            Err(err) if err.is_auth_rejected() => {
                tracing::debug!("Call rejected with stale token, refreshing and replaying once");
                let refreshed = self.refresh().await?;
                call(refreshed.access_token).await
            }
            other => other,
        }
    }
}
