//! Shopping cart aggregate and line items.
//!
//! [`Cart`] is a pure in-memory state machine: every mutation recomputes the
//! derived total and invalidates the `last_synced_at` marker in the same
//! call, so no caller can observe changed lines with a stale sync marker.
//! Network reconciliation lives in `velvet-client`; this module only knows
//! about state transitions.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// One product line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Opaque product identifier, unique within a cart.
    pub product_id: ProductId,
    /// Product display name.
    pub name: String,
    /// Unit price (non-negative).
    pub unit_price: Price,
    /// Quantity, always >= 1 for a stored line.
    pub quantity: u32,
    /// Optional size variant (e.g., "M", "XL").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Product image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartLine {
    /// The line total: unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.times(self.quantity)
    }
}

/// Synchronization state of the cart with respect to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No sync attempted yet.
    #[default]
    Idle,
    /// A fetch or push is in flight.
    Loading,
    /// The last sync round trip succeeded.
    Succeeded,
    /// The last sync round trip failed.
    Failed,
}

/// The cart aggregate.
///
/// `total` is derived and recomputed on every mutation. `last_synced_at`
/// doubles as the dirty flag: `None` means local state has diverged from
/// the last server-confirmed state and needs syncing.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    /// Line items in insertion order (= display order).
    pub lines: Vec<CartLine>,
    /// Sum of all line totals. Never set directly.
    pub total: Decimal,
    /// State of the last/current sync attempt.
    pub sync_state: SyncState,
    /// When the cart last matched server state; `None` marks it dirty.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Message from the most recent failed sync, if any.
    pub pending_error: Option<String>,
    /// Bumped on every local mutation. Lets an in-flight push detect that
    /// lines changed underneath it before marking the cart clean.
    pub revision: u64,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from persisted lines, recomputing the total.
    ///
    /// The rehydrated cart is considered dirty: it has not been confirmed
    /// against the server in this process lifetime.
    #[must_use]
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let mut cart = Self {
            lines,
            ..Self::default()
        };
        cart.recompute_total();
        cart
    }

    fn recompute_total(&mut self) {
        self.total = self.lines.iter().map(CartLine::line_total).sum();
    }

    fn mark_dirty(&mut self) {
        self.last_synced_at = None;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Whether local state has diverged from the last server-confirmed state.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.last_synced_at.is_none()
    }

    /// Total number of items across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Add a line. If a line with the same product ID exists, its quantity
    /// is incremented instead of appending a duplicate. A zero-quantity
    /// line is ignored.
    pub fn add_line(&mut self, line: CartLine) {
        if line.quantity == 0 {
            return;
        }

        match self
            .lines
            .iter_mut()
            .find(|existing| existing.product_id == line.product_id)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => self.lines.push(line),
        }

        self.recompute_total();
        self.mark_dirty();
    }

    /// Set a line's quantity. Zero removes the line entirely. Unknown
    /// product IDs are a no-op.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove_line(product_id);
            return;
        }

        let Some(line) = self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
        else {
            return;
        };

        line.quantity = quantity;
        self.recompute_total();
        self.mark_dirty();
    }

    /// Remove a line. Removal is idempotent: a missing product ID leaves
    /// the cart untouched.
    pub fn remove_line(&mut self, product_id: &ProductId) {
        let before = self.lines.len();
        self.lines.retain(|line| &line.product_id != product_id);

        if self.lines.len() != before {
            self.recompute_total();
            self.mark_dirty();
        }
    }

    /// Empty the cart. An explicitly cleared cart is considered "synced
    /// empty" until the next local mutation, so `last_synced_at` is set
    /// rather than cleared.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.lines.clear();
        self.total = Decimal::ZERO;
        self.sync_state = SyncState::Idle;
        self.last_synced_at = Some(now);
        self.pending_error = None;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Replace all lines wholesale with authoritative server data.
    pub fn replace_lines(&mut self, lines: Vec<CartLine>, now: DateTime<Utc>) {
        self.lines = lines;
        self.recompute_total();
        self.sync_state = SyncState::Succeeded;
        self.last_synced_at = Some(now);
        self.pending_error = None;
        self.revision = self.revision.wrapping_add(1);
    }

    /// Record a successful push of the given revision. The cart is only
    /// marked clean if no local mutation happened while the push was in
    /// flight.
    pub fn mark_pushed(&mut self, pushed_revision: u64, now: DateTime<Utc>) {
        self.sync_state = SyncState::Succeeded;
        self.pending_error = None;
        if self.revision == pushed_revision {
            self.last_synced_at = Some(now);
        }
    }

    /// Record a failed fetch or push. Local lines are left untouched.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.sync_state = SyncState::Failed;
        self.pending_error = Some(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: &str, cents: i64, quantity: u32) -> CartLine {
        CartLine {
            product_id: ProductId::new(product_id),
            name: format!("Product {product_id}"),
            unit_price: Price::from_cents(cents),
            quantity,
            size: None,
            image_url: None,
        }
    }

    fn assert_total_invariant(cart: &Cart) {
        let expected: Decimal = cart.lines.iter().map(CartLine::line_total).sum();
        assert_eq!(cart.total, expected);
    }

    #[test]
    fn test_add_line_appends_and_totals() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 10000, 2));

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total, Decimal::new(20000, 2));
        assert_total_invariant(&cart);
    }

    #[test]
    fn test_add_line_merges_by_product_id() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 10000, 2));
        cart.add_line(line("A", 10000, 1));

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.total, Decimal::new(30000, 2));
    }

    #[test]
    fn test_add_line_zero_quantity_is_noop() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 100, 0));

        assert!(cart.lines.is_empty());
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_set_quantity_zero_equals_remove() {
        let mut by_set = Cart::new();
        by_set.add_line(line("A", 500, 2));
        by_set.set_quantity(&ProductId::new("A"), 0);

        let mut by_remove = Cart::new();
        by_remove.add_line(line("A", 500, 2));
        by_remove.remove_line(&ProductId::new("A"));

        assert_eq!(by_set.lines, by_remove.lines);
        assert_eq!(by_set.total, by_remove.total);
        assert!(by_set.lines.is_empty());
        assert_eq!(by_set.total, Decimal::ZERO);
    }

    #[test]
    fn test_remove_line_is_idempotent() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 500, 1));
        let revision = cart.revision;

        cart.remove_line(&ProductId::new("missing"));

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.revision, revision, "no-op removal must not mutate");
        assert_total_invariant(&cart);
    }

    #[test]
    fn test_mutations_clear_last_synced_at() {
        let mut cart = Cart::new();
        cart.replace_lines(vec![line("A", 500, 1)], Utc::now());
        assert!(!cart.is_dirty());

        cart.set_quantity(&ProductId::new("A"), 4);
        assert!(cart.is_dirty());

        cart.replace_lines(vec![line("A", 500, 4)], Utc::now());
        assert!(!cart.is_dirty());

        cart.remove_line(&ProductId::new("A"));
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_clear_is_synced_empty() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 500, 3));

        cart.clear(Utc::now());

        assert!(cart.lines.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);
        assert!(!cart.is_dirty());

        cart.add_line(line("B", 100, 1));
        assert!(cart.is_dirty());
    }

    #[test]
    fn test_mark_pushed_respects_concurrent_mutation() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 500, 1));
        let pushed = cart.revision;

        // A mutation lands while the push is in flight.
        cart.add_line(line("B", 100, 1));

        cart.mark_pushed(pushed, Utc::now());
        assert!(cart.is_dirty(), "stale push must not mark the cart clean");
        assert_eq!(cart.sync_state, SyncState::Succeeded);
    }

    #[test]
    fn test_mark_failed_keeps_lines() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 500, 2));

        cart.mark_failed("server unreachable");

        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.sync_state, SyncState::Failed);
        assert_eq!(cart.pending_error.as_deref(), Some("server unreachable"));
    }

    #[test]
    fn test_item_count() {
        let mut cart = Cart::new();
        cart.add_line(line("A", 500, 2));
        cart.add_line(line("B", 100, 3));
        assert_eq!(cart.item_count(), 5);
    }

    // The worked example from the product brief: add, merge, then zero out.
    #[test]
    fn test_add_merge_zero_scenario() {
        let mut cart = Cart::new();

        cart.add_line(line("A", 10000, 2));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.total, Decimal::new(20000, 2));

        cart.add_line(line("A", 10000, 1));
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3);
        assert_eq!(cart.total, Decimal::new(30000, 2));

        cart.set_quantity(&ProductId::new("A"), 0);
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total, Decimal::ZERO);
    }

    #[test]
    fn test_from_lines_recomputes_and_is_dirty() {
        let cart = Cart::from_lines(vec![line("A", 2500, 2), line("B", 1000, 1)]);
        assert_eq!(cart.total, Decimal::new(6000, 2));
        assert!(cart.is_dirty());
        assert_eq!(cart.sync_state, SyncState::Idle);
    }
}
