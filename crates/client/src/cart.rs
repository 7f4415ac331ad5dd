//! Cart synchronizer: optimistic local mutations with debounced server
//! reconciliation.
//!
//! Local mutations are synchronous and infallible: they update the
//! in-memory [`Cart`], persist the line list, and (while signed in) arm a
//! single debounce timer that pushes the full cart snapshot after a quiet
//! period. Re-arming replaces the previous timer, so a burst of edits
//! coalesces into one network call carrying only the latest state - never
//! a log of individual operations.
//!
//! Reconciliation is last-write-wins: an in-flight fetch racing a local
//! edit resolves to whichever completes last. There is deliberately no
//! version-vector or merge logic; the one concession is a revision check so
//! a push that raced a mutation does not mark the cart clean.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::instrument;

use velvet_core::{Cart, CartLine, ProductId};

use crate::api::ApiClient;
use crate::error::ApiError;
use crate::session::SessionManager;
use crate::storage::{StateStore, StorageError, keys};

/// Keeps a local cart responsive to instant edits while converging with
/// server state.
///
/// Cheaply cloneable via `Arc`; all clones share the same cart.
#[derive(Clone)]
pub struct CartSynchronizer {
    inner: Arc<CartSyncInner>,
}

struct CartSyncInner {
    api: ApiClient,
    session: SessionManager,
    store: Arc<dyn StateStore>,
    state: Mutex<Cart>,
    /// The one pending debounced push, if any. Arming a new timer aborts
    /// the previous handle.
    debounce: Mutex<Option<JoinHandle<()>>>,
    quiet_period: Duration,
}

impl CartSynchronizer {
    /// Create a synchronizer, rehydrating persisted cart lines.
    ///
    /// Lines that fail to deserialize are discarded; the next fetch
    /// restores the authoritative state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new(
        api: ApiClient,
        session: SessionManager,
        store: Arc<dyn StateStore>,
        quiet_period: Duration,
    ) -> Result<Self, StorageError> {
        let lines: Vec<CartLine> = store
            .get(keys::CART_LINES)?
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(lines) => Some(lines),
                Err(e) => {
                    tracing::warn!("Discarding unreadable persisted cart: {e}");
                    None
                }
            })
            .unwrap_or_default();

        Ok(Self {
            inner: Arc::new(CartSyncInner {
                api,
                session,
                store,
                state: Mutex::new(Cart::from_lines(lines)),
                debounce: Mutex::new(None),
                quiet_period,
            }),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────

    /// A snapshot of the current cart for display.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.lock_state().clone()
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lock_state().item_count()
    }

    /// Whether local state has diverged from the last server-confirmed
    /// state.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.lock_state().is_dirty()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Cart> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Local mutations (synchronous, infallible)
    // ─────────────────────────────────────────────────────────────────────

    /// Add a line (merging by product ID), then arm the debounced push.
    pub fn add_line(&self, line: CartLine) {
        self.apply_local(|cart| cart.add_line(line));
        self.schedule_push();
    }

    /// Set a line's quantity (zero removes), then arm the debounced push.
    pub fn set_quantity(&self, product_id: &ProductId, quantity: u32) {
        self.apply_local(|cart| cart.set_quantity(product_id, quantity));
        self.schedule_push();
    }

    /// Remove a line (idempotent), then arm the debounced push.
    pub fn remove_line(&self, product_id: &ProductId) {
        self.apply_local(|cart| cart.remove_line(product_id));
        self.schedule_push();
    }

    /// Empty the cart. A cleared cart counts as "synced empty", so no push
    /// is scheduled and any pending one is cancelled.
    pub fn clear(&self) {
        self.cancel_pending_push();
        self.apply_local(|cart| cart.clear(chrono::Utc::now()));
    }

    /// Drop all local cart state, including the persisted lines. Used on
    /// sign-out; the cart was scoped to the departing user.
    pub fn reset_local(&self) {
        self.cancel_pending_push();
        {
            let mut cart = self.lock_state();
            *cart = Cart::new();
        }
        if let Err(e) = self.inner.store.delete(keys::CART_LINES) {
            tracing::warn!("Failed to delete persisted cart lines: {e}");
        }
    }

    /// Apply a mutation and persist the resulting lines while still holding
    /// the state lock, so persistence order matches mutation order.
    fn apply_local(&self, mutate: impl FnOnce(&mut Cart)) {
        let mut cart = self.lock_state();
        mutate(&mut cart);
        self.persist_lines(&cart.lines);
    }

    fn persist_lines(&self, lines: &[CartLine]) {
        // Local mutations never fail; a storage error costs durability
        // across restarts, not correctness of the in-memory cart.
        match serde_json::to_string(lines) {
            Ok(raw) => {
                if let Err(e) = self.inner.store.put(keys::CART_LINES, &raw) {
                    tracing::warn!("Failed to persist cart lines: {e}");
                }
            }
            Err(e) => tracing::warn!("Failed to serialize cart lines: {e}"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Debounce
    // ─────────────────────────────────────────────────────────────────────

    /// Arm (or re-arm) the debounced push. Only one timer exists at a time;
    /// each call replaces the previous one so bursts coalesce.
    fn schedule_push(&self) {
        if !self.inner.session.is_authenticated() {
            // Anonymous carts are local-only; nothing to sync.
            return;
        }

        // Local mutations must stay infallible even outside an async
        // runtime; without one there is nothing to defer onto and the next
        // explicit push or fetch reconciles.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("No async runtime; skipping debounced push");
            return;
        };

        let quiet_period = self.inner.quiet_period;
        let this = self.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if !this.is_dirty() {
                return;
            }
            if let Err(e) = this.push().await {
                tracing::warn!("Debounced cart push failed: {e}");
            }
        });

        let mut pending = self
            .inner
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    fn cancel_pending_push(&self) {
        let mut pending = self
            .inner
            .debounce
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Server reconciliation
    // ─────────────────────────────────────────────────────────────────────

    /// Fetch the authoritative cart and replace local lines wholesale.
    ///
    /// On failure the existing local lines are left untouched and the
    /// error is recorded on the cart.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotAuthenticated`] when anonymous (no network call is
    /// made); otherwise the underlying request error.
    #[instrument(skip_all)]
    pub async fn fetch(&self) -> Result<Cart, ApiError> {
        if !self.inner.session.is_authenticated() {
            return Err(ApiError::NotAuthenticated);
        }

        self.lock_state().sync_state = velvet_core::SyncState::Loading;

        let api = self.inner.api.clone();
        let result = self
            .inner
            .session
            .send_authorized(|token| {
                let api = api.clone();
                async move { api.fetch_cart(&token).await }
            })
            .await;

        match result {
            Ok(lines) => {
                let snapshot = {
                    let mut cart = self.lock_state();
                    cart.replace_lines(lines, chrono::Utc::now());
                    self.persist_lines(&cart.lines);
                    cart.clone()
                };
                Ok(snapshot)
            }
            Err(err) => {
                self.lock_state().mark_failed(err.user_message());
                Err(err)
            }
        }
    }

    /// Push the full current line list to the server's sync endpoint.
    ///
    /// On failure local lines are not rolled back; they remain the source
    /// of truth until the next successful push or fetch.
    ///
    /// # Errors
    ///
    /// [`ApiError::NotAuthenticated`] when anonymous; otherwise the
    /// underlying request error.
    #[instrument(skip_all)]
    pub async fn push(&self) -> Result<(), ApiError> {
        let (lines, revision) = {
            let mut cart = self.lock_state();
            cart.sync_state = velvet_core::SyncState::Loading;
            (cart.lines.clone(), cart.revision)
        };

        let api = self.inner.api.clone();
        let result = self
            .inner
            .session
            .send_authorized(|token| {
                let api = api.clone();
                let lines = lines.clone();
                async move { api.sync_cart(&token, &lines).await }
            })
            .await;

        match result {
            Ok(()) => {
                self.lock_state().mark_pushed(revision, chrono::Utc::now());
                Ok(())
            }
            Err(err) => {
                self.lock_state().mark_failed(err.user_message());
                Err(err)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Per-line remote mutations (bypass the debounce)
    // ─────────────────────────────────────────────────────────────────────

    /// Set a line's quantity locally and immediately on the server.
    ///
    /// Used for direct UI actions where a one-second debounce would feel
    /// laggy. If the server rejects the update, a fetch resynchronizes
    /// local state with the server's view.
    ///
    /// # Errors
    ///
    /// Returns the original request error after the self-healing fetch.
    #[instrument(skip(self))]
    pub async fn set_quantity_remote(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let (size, confirmed_revision) = {
            let mut cart = self.lock_state();
            let was_clean = !cart.is_dirty();
            let size = cart
                .lines
                .iter()
                .find(|line| &line.product_id == product_id)
                .and_then(|line| line.size.clone());
            cart.set_quantity(product_id, quantity);
            self.persist_lines(&cart.lines);
            (size, was_clean.then_some(cart.revision))
        };

        let result = if quantity == 0 {
            self.delete_remote(product_id).await
        } else {
            let api = self.inner.api.clone();
            self.inner
                .session
                .send_authorized(|token| {
                    let api = api.clone();
                    let product_id = product_id.clone();
                    let size = size.clone();
                    async move {
                        api.update_line(&token, &product_id, quantity, size.as_deref())
                            .await
                    }
                })
                .await
        };

        self.settle_remote(confirmed_revision, result).await
    }

    /// Remove a line locally and immediately on the server.
    ///
    /// # Errors
    ///
    /// Returns the original request error after the self-healing fetch.
    #[instrument(skip(self))]
    pub async fn remove_line_remote(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let confirmed_revision = {
            let mut cart = self.lock_state();
            let was_clean = !cart.is_dirty();
            cart.remove_line(product_id);
            self.persist_lines(&cart.lines);
            was_clean.then_some(cart.revision)
        };
        let result = self.delete_remote(product_id).await;
        self.settle_remote(confirmed_revision, result).await
    }

    async fn delete_remote(&self, product_id: &ProductId) -> Result<(), ApiError> {
        let api = self.inner.api.clone();
        self.inner
            .session
            .send_authorized(|token| {
                let api = api.clone();
                let product_id = product_id.clone();
                async move { api.delete_line(&token, &product_id).await }
            })
            .await
    }

    /// Record the outcome of an immediate per-line call.
    ///
    /// `confirmed_revision` is the cart revision after the local mutation,
    /// and only when the cart was clean beforehand: a single-line call
    /// confirms exactly one edit, so the cart may only be marked clean if
    /// that edit was the sole divergence and nothing else mutated while the
    /// call was in flight. In every other case the dirty flag stands and
    /// the debounced full push reconciles.
    ///
    /// A rejected optimistic update triggers a fetch so local state
    /// converges back to the server's view; the original error is still
    /// surfaced.
    async fn settle_remote(
        &self,
        confirmed_revision: Option<u64>,
        result: Result<(), ApiError>,
    ) -> Result<(), ApiError> {
        match result {
            Ok(()) => {
                {
                    let mut cart = self.lock_state();
                    match confirmed_revision {
                        Some(revision) => cart.mark_pushed(revision, chrono::Utc::now()),
                        None => {
                            cart.sync_state = velvet_core::SyncState::Succeeded;
                            cart.pending_error = None;
                        }
                    }
                }
                if self.is_dirty() {
                    self.schedule_push();
                }
                Ok(())
            }
            Err(err) => {
                tracing::warn!("Per-line cart update failed, resyncing: {err}");
                self.lock_state().mark_failed(err.user_message());
                if let Err(fetch_err) = self.fetch().await {
                    tracing::warn!("Resync fetch after failed update also failed: {fetch_err}");
                }
                Err(err)
            }
        }
    }
}
