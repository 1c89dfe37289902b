//! # Coupon Rules
//!
//! The pure half of the Coupon Engine: tier policy, code construction,
//! redeemability checks and discount arithmetic. The async engine in
//! `namidia-db` feeds records from the store through these functions.
//!
//! ## Progressive Coupon Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Order #n recorded                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  progressive_discount_for(n) ── 1 → 10%, 2 → 15%, 3+ → 20%            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  draft_progressive_coupon() ── code, expires = now + 30d,              │
//! │       │                         targets order n + 1                    │
//! │       ▼                                                                 │
//! │  ┌─────────┐   redeem (conditional update)   ┌────────┐                │
//! │  │ unused  │ ──────────────────────────────► │  used  │ (terminal)     │
//! │  └─────────┘                                 └────────┘                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::CouponRejection;
use crate::money::Money;
use crate::types::{Coupon, CouponCode, CouponKind, CustomerEmail, DiscountPercent};

// =============================================================================
// Policy Constants
// =============================================================================

/// How long a progressive coupon stays valid after issuance.
pub const PROGRESSIVE_VALIDITY_DAYS: i64 = 30;

/// Prefix of generated progressive codes.
pub const PROGRESSIVE_CODE_PREFIX: &str = "NM";

/// Prefix of generated manual codes.
pub const MANUAL_CODE_PREFIX: &str = "NAMIDIA";

/// `(minimum completed orders, discount)` from the highest tier down.
const PROGRESSION_TIERS: [(i64, DiscountPercent); 3] = [
    (3, DiscountPercent::from_const(20)),
    (2, DiscountPercent::from_const(15)),
    (1, DiscountPercent::from_const(10)),
];

// =============================================================================
// Progression
// =============================================================================

/// Discount granted on the next order after `completed_orders` orders.
///
/// Returns `None` when the customer has no completed order yet.
///
/// ```rust
/// use namidia_core::coupon::progressive_discount_for;
///
/// assert_eq!(progressive_discount_for(1).map(|d| d.get()), Some(10));
/// assert_eq!(progressive_discount_for(2).map(|d| d.get()), Some(15));
/// assert_eq!(progressive_discount_for(9).map(|d| d.get()), Some(20));
/// assert_eq!(progressive_discount_for(0), None);
/// ```
pub fn progressive_discount_for(completed_orders: i64) -> Option<DiscountPercent> {
    PROGRESSION_TIERS
        .iter()
        .find(|(min_orders, _)| completed_orders >= *min_orders)
        .map(|(_, discount)| *discount)
}

/// Builds the unsaved progressive coupon for a customer who just completed
/// order number `completed_orders`.
///
/// Uniqueness of the code is left to the store's unique index; the random
/// suffix only makes collisions unlikely.
pub fn draft_progressive_coupon(
    customer: &CustomerEmail,
    completed_orders: i64,
    now: DateTime<Utc>,
) -> Option<Coupon> {
    let discount = progressive_discount_for(completed_orders)?;

    Some(Coupon {
        id: Uuid::new_v4().to_string(),
        code: progressive_code(discount, customer),
        discount,
        expires_at: now + Duration::days(PROGRESSIVE_VALIDITY_DAYS),
        created_at: now,
        kind: CouponKind::Progressive {
            owner: customer.clone(),
            order_number: completed_orders + 1,
            is_used: false,
        },
    })
}

/// `NM{discount}-{customer tag}-{random}`, e.g. `NM15-ANAS-7F3C2A`.
pub fn progressive_code(discount: DiscountPercent, customer: &CustomerEmail) -> CouponCode {
    let tag: String = customer
        .local_part()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(4)
        .collect();
    let tag = if tag.is_empty() { "CLI".to_string() } else { tag };

    CouponCode::normalize(&format!(
        "{}{}-{}-{}",
        PROGRESSIVE_CODE_PREFIX,
        discount.get(),
        tag,
        random_suffix(6)
    ))
}

/// `NAMIDIA-{random}` for admin coupons created without an explicit code.
pub fn manual_code() -> CouponCode {
    CouponCode::normalize(&format!("{}-{}", MANUAL_CODE_PREFIX, random_suffix(8)))
}

fn random_suffix(len: usize) -> String {
    Uuid::new_v4().simple().to_string()[..len].to_uppercase()
}

// =============================================================================
// Redeemability
// =============================================================================

/// Checks everything that does not depend on the order total.
///
/// ## Check Order
/// owner → active flag → usage → expiry. The first failing check wins, so
/// a customer probing someone else's code learns nothing about its state.
pub fn check_redeemable(
    coupon: &Coupon,
    customer: &CustomerEmail,
    now: DateTime<Utc>,
) -> Result<(), CouponRejection> {
    if let Some(owner) = coupon.owner() {
        if owner != customer {
            return Err(CouponRejection::NotYours);
        }
    }

    if !coupon.is_active() {
        return Err(CouponRejection::Inactive);
    }

    if coupon.is_exhausted() {
        return Err(CouponRejection::AlreadyUsed);
    }

    if coupon.is_expired_at(now) {
        return Err(CouponRejection::Expired);
    }

    Ok(())
}

/// Minimum order value check (manual coupons only carry a minimum).
pub fn check_order_minimum(coupon: &Coupon, order_total: Money) -> Result<(), CouponRejection> {
    let minimum = coupon.minimum_order();
    if order_total < minimum {
        return Err(CouponRejection::BelowMinimum { minimum });
    }
    Ok(())
}

// =============================================================================
// Validation Result
// =============================================================================

/// Outcome of validating a code for a customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CouponValidation {
    Valid {
        discount: DiscountPercent,
        coupon: Coupon,
    },
    Invalid {
        rejection: CouponRejection,
        message: String,
    },
}

impl CouponValidation {
    pub fn invalid(rejection: CouponRejection) -> Self {
        CouponValidation::Invalid {
            message: rejection.to_string(),
            rejection,
        }
    }

    pub fn from_check(coupon: Coupon, check: Result<(), CouponRejection>) -> Self {
        match check {
            Ok(()) => CouponValidation::Valid {
                discount: coupon.discount,
                coupon,
            },
            Err(rejection) => CouponValidation::invalid(rejection),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, CouponValidation::Valid { .. })
    }

    pub fn rejection(&self) -> Option<&CouponRejection> {
        match self {
            CouponValidation::Valid { .. } => None,
            CouponValidation::Invalid { rejection, .. } => Some(rejection),
        }
    }

    /// Converts into a `Result`, handy for `?` in the engine.
    pub fn into_result(self) -> Result<(DiscountPercent, Coupon), CouponRejection> {
        match self {
            CouponValidation::Valid { discount, coupon } => Ok((discount, coupon)),
            CouponValidation::Invalid { rejection, .. } => Err(rejection),
        }
    }
}

// =============================================================================
// Discount Arithmetic
// =============================================================================

/// A discount computed for an order total. The coupon is not consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiscountApplication {
    pub code: CouponCode,
    pub discount_percentage: DiscountPercent,
    pub original_total: Money,
    pub discount_applied: Money,
    pub new_total: Money,
}

/// `discount = total × pct / 100`, `new_total = total - discount`.
///
/// ```rust
/// use namidia_core::coupon::apply_discount;
/// use namidia_core::{CouponCode, DiscountPercent, Money};
///
/// let applied = apply_discount(
///     CouponCode::normalize("nm15-ana-000000"),
///     DiscountPercent::new(15).unwrap(),
///     Money::from_cents(20000),
/// );
/// assert_eq!(applied.discount_applied.cents(), 3000);
/// assert_eq!(applied.new_total.cents(), 17000);
/// ```
pub fn apply_discount(
    code: CouponCode,
    discount: DiscountPercent,
    order_total: Money,
) -> DiscountApplication {
    let discount_applied = order_total.percentage(discount.get());
    DiscountApplication {
        code,
        discount_percentage: discount,
        original_total: order_total,
        discount_applied,
        new_total: order_total - discount_applied,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
