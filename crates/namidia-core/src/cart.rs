//! # Cart Engine
//!
//! The in-progress order: line items and derived totals.
//!
//! ## Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Cart Engine                                     │
//! │                                                                         │
//! │  ┌──────────────────────────┐                                           │
//! │  │  Cart (pure reducer)     │  add_item / remove_item /                 │
//! │  │  Vec<CartItem>           │  update_quantity / calculate_total        │
//! │  └────────────┬─────────────┘                                           │
//! │               │ owned by                                                │
//! │  ┌────────────▼─────────────┐     ┌─────────────────────────────────┐   │
//! │  │  CartStore               │────►│  dyn CartStorage (injected)     │   │
//! │  │  Mutex<Cart>             │     │  MemoryCartStorage / JSON file  │   │
//! │  │  listeners               │     └─────────────────────────────────┘   │
//! │  └────────────┬─────────────┘                                           │
//! │               │ after every mutation                                    │
//! │               ▼                                                         │
//! │  CartEvent::Changed(CartTotals) ──► header badge, mini cart, ...        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - A product id appears at most once; adding it again raises its quantity
//! - Every stored quantity is >= 1; setting a quantity below 1 removes the line
//! - None of the reducer operations fail; unknown ids are no-ops
//! - Quantities and totals saturate at `i64::MAX` instead of overflowing

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::types::Product;

// =============================================================================
// Effective Price
// =============================================================================

/// The price actually charged for one unit.
///
/// The promotional price wins only when it is set, positive, and strictly
/// lower than the list price. Anything else falls back to the list price.
///
/// ```rust
/// use namidia_core::cart::get_effective_price;
/// use namidia_core::Money;
///
/// let list = Money::from_cents(500);
/// assert_eq!(get_effective_price(list, Some(Money::from_cents(300))).cents(), 300);
/// assert_eq!(get_effective_price(list, Some(Money::zero())).cents(), 500);
/// assert_eq!(get_effective_price(list, Some(Money::from_cents(500))).cents(), 500);
/// assert_eq!(get_effective_price(list, None).cents(), 500);
/// ```
pub fn get_effective_price(list_price: Money, promo_price: Option<Money>) -> Money {
    match promo_price {
        Some(promo) if promo.is_positive() && promo < list_price => promo,
        _ => list_price,
    }
}

impl Product {
    /// See [`get_effective_price`].
    pub fn effective_price(&self) -> Money {
        get_effective_price(self.price(), self.promo_price())
    }
}

// =============================================================================
// Cart Item
// =============================================================================

/// A product snapshot plus a quantity.
///
/// Prices are frozen when the product is first added, so the cart keeps
/// showing what the customer saw even if the catalog changes underneath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: String,
    pub name: String,
    pub image_url: Option<String>,
    pub unit_price_cents: i64,
    pub promo_price_cents: Option<i64>,
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Snapshots a product with quantity 1.
    pub fn from_product(product: &Product) -> Self {
        CartItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            image_url: product.image_url.clone(),
            unit_price_cents: product.price_cents,
            promo_price_cents: product.promo_price_cents,
            quantity: 1,
            added_at: Utc::now(),
        }
    }

    pub fn effective_price(&self) -> Money {
        get_effective_price(
            Money::from_cents(self.unit_price_cents),
            self.promo_price_cents.map(Money::from_cents),
        )
    }

    /// Effective price × quantity.
    pub fn line_total(&self) -> Money {
        self.effective_price().multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The shopping cart reducer. Ordered by first insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Rebuilds a cart from a stored snapshot, restoring the invariants:
    /// duplicate product ids are merged and non-positive quantities dropped.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Cart::new();
        for item in items.into_iter().filter(|i| i.quantity >= 1) {
            match cart.find_mut(&item.product_id) {
                Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
                None => cart.items.push(item),
            }
        }
        cart
    }

    /// Adds one unit of `product`.
    ///
    /// ## Behavior
    /// - Product already in cart: quantity + 1
    /// - Product not in cart: new line with quantity 1
    pub fn add_item(&mut self, product: &Product) {
        match self.find_mut(&product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(CartItem::from_product(product)),
        }
    }

    /// Removes the line for `product_id`. No-op when absent.
    pub fn remove_item(&mut self, product_id: &str) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Replaces a line's quantity.
    ///
    /// ## Behavior
    /// - `quantity < 1`: same as [`Cart::remove_item`]
    /// - Unknown product: no-op
    /// - Stock is not checked here; that belongs to the product page
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) {
        if quantity < 1 {
            self.remove_item(product_id);
            return;
        }

        if let Some(item) = self.find_mut(product_id) {
            item.quantity = quantity;
        }
    }

    /// Sum of effective price × quantity over all lines.
    pub fn calculate_total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of units across all lines (the badge number).
    pub fn total_quantity(&self) -> i64 {
        self.items
            .iter()
            .fold(0_i64, |acc, i| acc.saturating_add(i.quantity))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }

    fn find_mut(&mut self, product_id: &str) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| i.product_id == product_id)
    }
}

/// Cart totals summary sent with every change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            total: cart.calculate_total(),
        }
    }
}

// =============================================================================
// Storage Strategy
// =============================================================================

/// Where cart snapshots live between sessions.
///
/// Implementations must be cheap to call on every mutation. `load` returning
/// `Ok(None)` means nothing was stored yet.
pub trait CartStorage: Send + Sync {
    fn load(&self) -> CoreResult<Option<Vec<CartItem>>>;

    fn save(&self, items: &[CartItem]) -> CoreResult<()>;
}

/// Keeps the snapshot in memory. Used in tests and server-side rendering.
#[derive(Debug, Default)]
pub struct MemoryCartStorage {
    snapshot: Mutex<Option<String>>,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw JSON last written, if any.
    pub fn raw(&self) -> Option<String> {
        lock(&self.snapshot).clone()
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> CoreResult<Option<Vec<CartItem>>> {
        match lock(&self.snapshot).as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, items: &[CartItem]) -> CoreResult<()> {
        let json = serde_json::to_string(items)?;
        *lock(&self.snapshot) = Some(json);
        Ok(())
    }
}

// =============================================================================
// Cart Store
// =============================================================================

/// Notification fired after every mutating call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEvent {
    Changed(CartTotals),
}

type Listener = Box<dyn Fn(&CartEvent) + Send + Sync>;

/// The cart shared with UI surfaces, with persistence and change
/// notification around the pure reducer.
///
/// ## Thread Safety
/// `Mutex` because nearly every call mutates; the lock is held only for the
/// reducer step and the snapshot copy, never across storage writes or
/// listener callbacks.
///
/// ## Side Effects
/// Storage writes are fire-and-forget: a failure is logged and the
/// in-memory cart stays authoritative.
pub struct CartStore {
    cart: Mutex<Cart>,
    storage: Arc<dyn CartStorage>,
    listeners: Mutex<Vec<Listener>>,
}

impl CartStore {
    /// Creates a store and restores whatever `storage` holds.
    ///
    /// A missing or unreadable snapshot yields an empty cart.
    pub fn restore(storage: Arc<dyn CartStorage>) -> Self {
        let cart = match storage.load() {
            Ok(Some(items)) => {
                debug!(lines = items.len(), "Restored cart from storage");
                Cart::from_items(items)
            }
            Ok(None) => Cart::new(),
            Err(e) => {
                warn!(error = %e, "Could not restore cart, starting empty");
                Cart::new()
            }
        };

        CartStore {
            cart: Mutex::new(cart),
            storage,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback run after every mutation.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&CartEvent) + Send + Sync + 'static,
    {
        lock(&self.listeners).push(Box::new(listener));
    }

    /// Read access to the current cart.
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        f(&lock(&self.cart))
    }

    /// A copy of the current cart.
    pub fn snapshot(&self) -> Cart {
        lock(&self.cart).clone()
    }

    pub fn add_item(&self, product: &Product) -> CartTotals {
        self.mutate(|cart| cart.add_item(product))
    }

    pub fn remove_item(&self, product_id: &str) -> CartTotals {
        self.mutate(|cart| cart.remove_item(product_id))
    }

    pub fn update_quantity(&self, product_id: &str, quantity: i64) -> CartTotals {
        self.mutate(|cart| cart.update_quantity(product_id, quantity))
    }

    /// Empties the cart, e.g. after a successful checkout.
    pub fn clear(&self) -> CartTotals {
        self.mutate(Cart::clear)
    }

    pub fn calculate_total(&self) -> Money {
        self.with_cart(Cart::calculate_total)
    }

    fn mutate<F>(&self, f: F) -> CartTotals
    where
        F: FnOnce(&mut Cart),
    {
        let (items, totals) = {
            let mut cart = lock(&self.cart);
            f(&mut cart);
            (cart.items.clone(), cart.totals())
        };

        if let Err(e) = self.storage.save(&items) {
            warn!(error = %e, "Failed to persist cart snapshot");
        }

        let event = CartEvent::Changed(totals);
        for listener in lock(&self.listeners).iter() {
            listener(&event);
        }

        totals
    }
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("cart", &*lock(&self.cart))
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

/// Poisoning only means another thread panicked mid-update; the cart data
/// is still a valid `Vec`, so keep serving it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Unit Tests
// =============================================================================
