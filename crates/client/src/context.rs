//! Client context: the explicit composition root.
//!
//! One [`ClientContext`] owns one session and one cart. "Exactly one active
//! session/cart" is an invariant of a context instance rather than ambient
//! global state, so tests construct a fresh context (with an in-memory
//! store) per case.

use std::sync::Arc;

use thiserror::Error;

use crate::api::ApiClient;
use crate::cart::CartSynchronizer;
use crate::config::Config;
use crate::session::SessionManager;
use crate::storage::{JsonFileStore, StateStore, StorageError};

/// Error building a client context.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to open local state store: {0}")]
    Storage(#[from] StorageError),
}

/// Shared state for one client instance.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ClientContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    config: Config,
    session: SessionManager,
    cart: CartSynchronizer,
}

impl ClientContext {
    /// Create a context with a file-backed store under the configured
    /// state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the state directory or HTTP client cannot be
    /// set up.
    pub fn new(config: Config) -> Result<Self, ContextError> {
        let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(&config.state_dir)?);
        Self::with_store(config, store)
    }

    /// Create a context over an explicit store. Tests pass a
    /// [`crate::storage::MemoryStore`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or persisted
    /// state cannot be read.
    pub fn with_store(config: Config, store: Arc<dyn StateStore>) -> Result<Self, ContextError> {
        let api = ApiClient::new(&config)?;
        let session = SessionManager::new(api.clone(), Arc::clone(&store))?;
        let cart = CartSynchronizer::new(api, session.clone(), store, config.debounce)?;

        Ok(Self {
            inner: Arc::new(ContextInner {
                config,
                session,
                cart,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get a reference to the session manager.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Get a reference to the cart synchronizer.
    #[must_use]
    pub fn cart(&self) -> &CartSynchronizer {
        &self.inner.cart
    }

    /// Sign out and drop user-scoped local state.
    ///
    /// The cart belongs to the departing user, so its lines are cleared
    /// along with the credential. Always safe to call; needs no network
    /// round trip.
    pub fn sign_out(&self) {
        self.inner.session.sign_out();
        self.inner.cart.reset_local();
    }
}
