//! # Domain Types
//!
//! Core domain types shared by the cart and coupon engines.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────┐   │
//! │  │    Product      │   │       Coupon        │   │     Order       │   │
//! │  │  ─────────────  │   │  ─────────────────  │   │  ─────────────  │   │
//! │  │  id             │   │  code (unique)      │   │  id             │   │
//! │  │  price_cents    │   │  discount (0-100)   │   │  customer_email │   │
//! │  │  promo_price    │   │  expires_at         │   │  status         │   │
//! │  └─────────────────┘   │  kind ──┐           │   │  total_cents    │   │
//! │                        └─────────┼───────────┘   └─────────────────┘   │
//! │                                  ▼                                      │
//! │                 ┌───────────────────────────────────┐                  │
//! │                 │            CouponKind             │                  │
//! │                 │  Progressive { owner, order_no,   │                  │
//! │                 │                is_used }          │                  │
//! │                 │  Manual { owner?, min_order,      │                  │
//! │                 │           max_uses, used_count,   │                  │
//! │                 │           is_active, created_by } │                  │
//! │                 └───────────────────────────────────┘                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both coupon variants share one store table. The variant is decided once,
//! when a row is decoded, instead of being re-derived from nullable columns
//! at every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Customer Identity
// =============================================================================

/// A customer identity as issued by the auth provider: an email address,
/// trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerEmail(String);

impl CustomerEmail {
    /// Normalizes and checks an email.
    ///
    /// ```rust
    /// use namidia_core::CustomerEmail;
    ///
    /// let email = CustomerEmail::parse("  Ana@Example.COM ").unwrap();
    /// assert_eq!(email.as_str(), "ana@example.com");
    /// assert!(CustomerEmail::parse("not-an-email").is_err());
    /// ```
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let normalized = raw.trim().to_lowercase();

        let valid = match normalized.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && !normalized.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if !valid {
            return Err(CoreError::InvalidEmail(raw.to_string()));
        }

        Ok(CustomerEmail(normalized))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local part of the address (before `@`).
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for CustomerEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Coupon Code
// =============================================================================

/// A coupon code, trimmed and uppercased.
///
/// Lookups are case-insensitive because every code is normalized on the
/// way in, both when stored and when typed by a customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn normalize(raw: &str) -> Self {
        CouponCode(raw.trim().to_uppercase())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Discount Percent
// =============================================================================

/// An integer discount percentage in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// Checks the range and wraps the value.
    pub fn new(percent: i64) -> CoreResult<Self> {
        if !(0..=100).contains(&percent) {
            return Err(CoreError::InvalidDiscount(percent));
        }
        Ok(DiscountPercent(percent as u8))
    }

    /// For compile-time tier constants. Values above 100 are clamped.
    pub(crate) const fn from_const(percent: u8) -> Self {
        if percent > 100 {
            DiscountPercent(100)
        } else {
            DiscountPercent(percent)
        }
    }

    #[inline]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product as shown in the delivery storefront.
///
/// Only the fields the cart needs; stock, categories and media belong to the
/// catalog pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub image_url: Option<String>,
    /// List price in centavos.
    pub price_cents: i64,
    /// Promotional price in centavos, honoured only when `0 < promo < price`.
    pub promo_price_cents: Option<i64>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn promo_price(&self) -> Option<Money> {
        self.promo_price_cents.map(Money::from_cents)
    }
}

// =============================================================================
// Coupon
// =============================================================================

/// A discount coupon, progressive or manual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: String,
    pub code: CouponCode,
    pub discount: DiscountPercent,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub kind: CouponKind,
}

/// The two coupon families sharing the `coupons_progressive` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponKind {
    /// Loyalty coupon issued after an order, valid for one redemption by its
    /// owner.
    Progressive {
        owner: CustomerEmail,
        /// The customer's order number this coupon targets.
        order_number: i64,
        is_used: bool,
    },
    /// Administrator-issued coupon.
    Manual {
        /// `None` means anyone may redeem it.
        owner: Option<CustomerEmail>,
        min_order_value: Money,
        max_uses: i64,
        used_count: i64,
        is_active: bool,
        created_by: Option<String>,
    },
}

impl Coupon {
    pub fn is_progressive(&self) -> bool {
        matches!(self.kind, CouponKind::Progressive { .. })
    }

    /// The only customer allowed to redeem this coupon, if restricted.
    pub fn owner(&self) -> Option<&CustomerEmail> {
        match &self.kind {
            CouponKind::Progressive { owner, .. } => Some(owner),
            CouponKind::Manual { owner, .. } => owner.as_ref(),
        }
    }

    /// Total redemptions allowed (1 for progressive coupons).
    pub fn usage_limit(&self) -> i64 {
        match &self.kind {
            CouponKind::Progressive { .. } => 1,
            CouponKind::Manual { max_uses, .. } => *max_uses,
        }
    }

    /// Redemptions so far.
    pub fn times_used(&self) -> i64 {
        match &self.kind {
            CouponKind::Progressive { is_used, .. } => i64::from(*is_used),
            CouponKind::Manual { used_count, .. } => *used_count,
        }
    }

    /// True once no redemptions remain. Never flips back.
    pub fn is_exhausted(&self) -> bool {
        match &self.kind {
            CouponKind::Progressive { is_used, .. } => *is_used,
            CouponKind::Manual {
                used_count,
                max_uses,
                ..
            } => used_count >= max_uses,
        }
    }

    /// A coupon is expired from its expiry instant onward.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Progressive coupons have no admin switch and are always active.
    pub fn is_active(&self) -> bool {
        match &self.kind {
            CouponKind::Progressive { .. } => true,
            CouponKind::Manual { is_active, .. } => *is_active,
        }
    }

    /// Minimum order total (zero for progressive coupons).
    pub fn minimum_order(&self) -> Money {
        match &self.kind {
            CouponKind::Progressive { .. } => Money::zero(),
            CouponKind::Manual {
                min_order_value, ..
            } => *min_order_value,
        }
    }
}

// =============================================================================
// Order
// =============================================================================

/// Lifecycle of a delivery order. Only used here to decide which orders
/// count towards the loyalty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether an order in this state counts as a completed order.
    pub fn counts_towards_loyalty(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

/// The slice of an order this core reads.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_email: CustomerEmail,
    pub status: OrderStatus,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
