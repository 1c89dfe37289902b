//! # namidia-core: Pure Business Logic for the Na Mídia storefront
//!
//! This crate holds the cart reducer and the coupon rules as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Na Mídia Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                Checkout UI / Admin back office                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ namidia-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │   cart    │  │  coupon   │  │   │
//! │  │   │  Coupon   │  │   Money   │  │   Cart    │  │  tiers    │  │   │
//! │  │   │  Product  │  │ percentage│  │ CartStore │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          namidia-db (store layer + async Coupon Engine)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Coupon, CouponKind, Order, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Cart reducer, storage strategy, `CartStore`
//! - [`coupon`] - Progression tiers, code construction, redeemability
//! - [`validation`] - Admin input validation
//! - [`error`] - Domain error types and coupon rejections
//!
//! ## Example Usage
//!
//! ```rust
//! use namidia_core::cart::Cart;
//! use namidia_core::Product;
//!
//! let mut cart = Cart::new();
//! let chopp = Product {
//!     id: "chopp".into(),
//!     name: "Chopp 500ml".into(),
//!     image_url: None,
//!     price_cents: 1200,
//!     promo_price_cents: Some(900),
//! };
//!
//! cart.add_item(&chopp);
//! cart.add_item(&chopp);
//! assert_eq!(cart.calculate_total().cents(), 1800);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartStore, CartTotals};
pub use coupon::{CouponValidation, DiscountApplication};
pub use error::{CoreError, CoreResult, CouponRejection, ValidationError};
pub use money::Money;
pub use types::*;
