//! # Coupon Engine
//!
//! Issues, validates and redeems coupons against the store. The rules live
//! in `namidia_core::coupon`; this module sequences store calls around them.
//!
//! ## Checkout Sequence
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. apply_coupon_to_order(code, customer, total)                       │
//! │       └── validate (owner → active → used → expired → minimum)         │
//! │       └── DiscountApplication { discount_applied, new_total }          │
//! │                                                                         │
//! │  2. Order recorded by the checkout flow (outside this crate)           │
//! │                                                                         │
//! │  3. complete_checkout(customer, total, applied_code)                   │
//! │       ├── redeem_coupon(code, customer) ── one conditional UPDATE      │
//! │       ├── count_completed(customer)                                    │
//! │       └── issue_progressive_coupon(...) ── targets the next order      │
//! │                                                                         │
//! │  Step 3 never fails the order: every error is logged and reported in   │
//! │  the CheckoutOutcome.                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CouponError, CouponResult};
use crate::repository::coupon::CouponRepository;
use crate::repository::order::OrderRepository;
use namidia_core::coupon::{
    apply_discount, check_order_minimum, check_redeemable, draft_progressive_coupon, manual_code,
};
use namidia_core::validation::{
    validate_coupon_code, validate_discount_percentage, validate_expiry, validate_max_uses,
    validate_min_order_cents,
};
use namidia_core::{
    Coupon, CouponCode, CouponKind, CouponRejection, CouponValidation, CustomerEmail,
    DiscountApplication, DiscountPercent, Money,
};

/// Attempts at inserting a freshly generated code before giving up.
const MAX_CODE_ATTEMPTS: u32 = 3;

// =============================================================================
// Inputs and Outputs
// =============================================================================

/// Admin form for a new manual coupon.
#[derive(Debug, Clone)]
pub struct NewManualCoupon {
    /// Explicit code, or `None` to generate `NAMIDIA-XXXXXXXX`.
    pub code: Option<String>,
    pub discount_percentage: i64,
    /// Restricts the coupon to one customer; `None` makes it global.
    pub owner_email: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub min_order_value_cents: i64,
    pub max_uses: i64,
    /// Identity of the administrator creating it.
    pub created_by: Option<String>,
}

/// What happened after an order was recorded.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    /// Code redeemed for this order, if one was applied and redemption won.
    pub redeemed: Option<CouponCode>,
    pub redemption_error: Option<String>,
    /// Progressive coupon issued for the customer's next order.
    pub issued: Option<Coupon>,
    pub issuance_error: Option<String>,
}

// =============================================================================
// Engine
// =============================================================================

/// Async Coupon Engine over the coupon and order repositories.
#[derive(Debug, Clone)]
pub struct CouponEngine {
    coupons: CouponRepository,
    orders: OrderRepository,
}

impl CouponEngine {
    pub fn new(coupons: CouponRepository, orders: OrderRepository) -> Self {
        CouponEngine { coupons, orders }
    }

    // -------------------------------------------------------------------------
    // Issuance
    // -------------------------------------------------------------------------

    /// Issues the progressive coupon for the order after
    /// `completed_order_number`.
    ///
    /// Uniqueness is enforced by the store: a code collision is retried with
    /// a fresh suffix, any other failure propagates.
    pub async fn issue_progressive_coupon(
        &self,
        customer: &CustomerEmail,
        completed_order_number: i64,
        order_total: Money,
    ) -> CouponResult<Coupon> {
        let now = Utc::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let coupon = draft_progressive_coupon(customer, completed_order_number, now)
                .ok_or(CouponError::NoTier(completed_order_number))?;

            match self.coupons.insert(&coupon).await {
                Ok(()) => {
                    info!(
                        customer = %customer,
                        code = %coupon.code,
                        discount = coupon.discount.get(),
                        completed_orders = completed_order_number,
                        order_total = %order_total,
                        "Progressive coupon issued"
                    );
                    return Ok(coupon);
                }
                Err(e) if e.is_unique_violation() && attempt < MAX_CODE_ATTEMPTS => {
                    warn!(code = %coupon.code, attempt, "Generated coupon code collided, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    /// Validates a code for a customer, ignoring the order total.
    ///
    /// Rejections come back as [`CouponValidation::Invalid`]; only store
    /// failures are errors.
    pub async fn validate_coupon(
        &self,
        code: &str,
        customer: &CustomerEmail,
    ) -> CouponResult<CouponValidation> {
        self.validate_coupon_at(code, customer, Utc::now()).await
    }

    /// [`validate_coupon`](Self::validate_coupon) at an explicit instant.
    pub async fn validate_coupon_at(
        &self,
        code: &str,
        customer: &CustomerEmail,
        now: DateTime<Utc>,
    ) -> CouponResult<CouponValidation> {
        let code = CouponCode::normalize(code);
        debug!(code = %code, customer = %customer, "Validating coupon");

        let Some(coupon) = self.coupons.get_by_code(&code).await? else {
            return Ok(CouponValidation::invalid(CouponRejection::NotFound));
        };

        let check = check_redeemable(&coupon, customer, now);
        Ok(CouponValidation::from_check(coupon, check))
    }

    /// Full validation for a concrete order, including the minimum order
    /// value.
    pub async fn validate_coupon_for_order(
        &self,
        code: &str,
        customer: &CustomerEmail,
        order_total: Money,
    ) -> CouponResult<CouponValidation> {
        let validation = self.validate_coupon(code, customer).await?;

        Ok(match validation {
            CouponValidation::Valid { coupon, .. } => {
                let check = check_order_minimum(&coupon, order_total);
                CouponValidation::from_check(coupon, check)
            }
            invalid => invalid,
        })
    }

    /// Validation for the manual coupon path. Progressive codes are not
    /// accepted here and read as not found.
    pub async fn validate_manual_coupon(
        &self,
        code: &str,
        customer: &CustomerEmail,
        order_total: Money,
    ) -> CouponResult<CouponValidation> {
        let validation = self
            .validate_coupon_for_order(code, customer, order_total)
            .await?;

        Ok(match validation {
            CouponValidation::Valid { ref coupon, .. } if coupon.is_progressive() => {
                CouponValidation::invalid(CouponRejection::NotFound)
            }
            other => other,
        })
    }

    /// Computes the discount for an order. Does not consume the coupon;
    /// call [`redeem_coupon`](Self::redeem_coupon) once the order is stored.
    pub async fn apply_coupon_to_order(
        &self,
        code: &str,
        customer: &CustomerEmail,
        order_total: Money,
    ) -> CouponResult<DiscountApplication> {
        let (discount, coupon) = self
            .validate_coupon_for_order(code, customer, order_total)
            .await?
            .into_result()?;

        let applied = apply_discount(coupon.code, discount, order_total);
        debug!(
            code = %applied.code,
            discount = discount.get(),
            original = %applied.original_total,
            new_total = %applied.new_total,
            "Coupon applied to order"
        );
        Ok(applied)
    }

    // -------------------------------------------------------------------------
    // Redemption
    // -------------------------------------------------------------------------

    /// Consumes a progressive coupon for `customer`.
    ///
    /// The owner, usage and expiry checks run inside one conditional update,
    /// so of two concurrent calls exactly one succeeds and a coupon can never
    /// be consumed by someone else or after it expired.
    pub async fn mark_coupon_used(&self, code: &str, customer: &CustomerEmail) -> CouponResult<()> {
        let code = CouponCode::normalize(code);
        let now = Utc::now();

        if self.coupons.mark_used(&code, customer, now).await? {
            info!(code = %code, customer = %customer, "Progressive coupon redeemed");
            return Ok(());
        }

        Err(self.redemption_failure(&code, customer, now).await?.into())
    }

    /// Consumes one use of a manual coupon with an atomic increment guarded
    /// by owner, active flag, usage limit and expiry.
    pub async fn increment_coupon_usage(
        &self,
        code: &str,
        customer: &CustomerEmail,
    ) -> CouponResult<()> {
        let code = CouponCode::normalize(code);
        let now = Utc::now();

        if self.coupons.increment_usage(&code, customer, now).await? {
            info!(code = %code, customer = %customer, "Manual coupon usage incremented");
            return Ok(());
        }

        Err(self.redemption_failure(&code, customer, now).await?.into())
    }

    /// Redeems a coupon of either kind for `customer`.
    pub async fn redeem_coupon(&self, code: &str, customer: &CustomerEmail) -> CouponResult<()> {
        let normalized = CouponCode::normalize(code);

        let coupon = self
            .coupons
            .get_by_code(&normalized)
            .await?
            .ok_or(CouponRejection::NotFound)?;

        match coupon.kind {
            CouponKind::Progressive { .. } => self.mark_coupon_used(code, customer).await,
            CouponKind::Manual { .. } => self.increment_coupon_usage(code, customer).await,
        }
    }

    /// Explains a conditional update that changed no row.
    ///
    /// Re-runs the redemption rules on the stored coupon. When they all pass,
    /// another redemption won the race.
    async fn redemption_failure(
        &self,
        code: &CouponCode,
        customer: &CustomerEmail,
        now: DateTime<Utc>,
    ) -> CouponResult<CouponRejection> {
        let rejection = match self.coupons.get_by_code(code).await? {
            None => CouponRejection::NotFound,
            Some(coupon) => check_redeemable(&coupon, customer, now)
                .err()
                .unwrap_or(CouponRejection::AlreadyUsed),
        };

        debug!(code = %code, customer = %customer, reason = rejection.code(), "Redemption refused");
        Ok(rejection)
    }

    // -------------------------------------------------------------------------
    // Manual Coupon Administration
    // -------------------------------------------------------------------------

    /// Creates an administrator coupon.
    ///
    /// The code is checked for existence first. A code inserted between the
    /// check and the insert still surfaces as `DuplicateCode` through the
    /// unique index.
    pub async fn create_manual_coupon(&self, input: NewManualCoupon) -> CouponResult<Coupon> {
        let now = Utc::now();

        validate_discount_percentage(input.discount_percentage)?;
        validate_max_uses(input.max_uses)?;
        validate_min_order_cents(input.min_order_value_cents)?;
        validate_expiry(input.expires_at, now)?;

        let code = match input.code.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                validate_coupon_code(raw)?;
                CouponCode::normalize(raw)
            }
            _ => manual_code(),
        };

        if self.coupons.code_exists(&code).await? {
            return Err(CouponError::DuplicateCode(code.to_string()));
        }

        let owner = input
            .owner_email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(CustomerEmail::parse)
            .transpose()?;

        let coupon = Coupon {
            id: Uuid::new_v4().to_string(),
            code,
            discount: DiscountPercent::new(input.discount_percentage)?,
            expires_at: input.expires_at,
            created_at: now,
            kind: CouponKind::Manual {
                owner,
                min_order_value: Money::from_cents(input.min_order_value_cents),
                max_uses: input.max_uses,
                used_count: 0,
                is_active: true,
                created_by: input.created_by,
            },
        };

        match self.coupons.insert(&coupon).await {
            Ok(()) => {}
            Err(e) if e.is_unique_violation() => {
                return Err(CouponError::DuplicateCode(coupon.code.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            code = %coupon.code,
            discount = coupon.discount.get(),
            max_uses = input.max_uses,
            global = coupon.owner().is_none(),
            "Manual coupon created"
        );
        Ok(coupon)
    }

    /// Activates or deactivates a manual coupon.
    pub async fn update_coupon_status(&self, id: &str, is_active: bool) -> CouponResult<()> {
        self.coupons.set_active(id, is_active).await?;
        info!(id, is_active, "Coupon status updated");
        Ok(())
    }

    pub async fn delete_coupon(&self, id: &str) -> CouponResult<()> {
        self.coupons.delete(id).await?;
        info!(id, "Coupon deleted");
        Ok(())
    }

    /// All manual coupons, newest first.
    pub async fn list_manual_coupons(&self) -> CouponResult<Vec<Coupon>> {
        Ok(self.coupons.list_manual().await?)
    }

    /// Coupons the customer could redeem right now.
    pub async fn customer_coupons(&self, customer: &CustomerEmail) -> CouponResult<Vec<Coupon>> {
        let now = Utc::now();
        let coupons = self.coupons.list_visible_to(customer).await?;

        Ok(coupons
            .into_iter()
            .filter(|c| check_redeemable(c, customer, now).is_ok())
            .collect())
    }

    // -------------------------------------------------------------------------
    // Post-Checkout
    // -------------------------------------------------------------------------

    /// Runs after an order has been recorded: redeems the applied coupon and
    /// issues the next progressive one.
    ///
    /// Never returns an error. Failures are logged and reported in the
    /// outcome so the order confirmation is never blocked.
    pub async fn complete_checkout(
        &self,
        customer: &CustomerEmail,
        order_total: Money,
        applied_code: Option<&str>,
    ) -> CheckoutOutcome {
        let mut outcome = CheckoutOutcome::default();

        if let Some(code) = applied_code {
            match self.redeem_coupon(code, customer).await {
                Ok(()) => outcome.redeemed = Some(CouponCode::normalize(code)),
                Err(e) => {
                    warn!(code, customer = %customer, error = %e, "Coupon redemption failed after checkout");
                    outcome.redemption_error = Some(e.to_string());
                }
            }
        }

        let completed = match self.orders.count_completed(customer).await {
            Ok(n) => n,
            Err(e) => {
                warn!(customer = %customer, error = %e, "Could not count orders, skipping coupon issuance");
                outcome.issuance_error = Some(e.to_string());
                return outcome;
            }
        };

        match self
            .issue_progressive_coupon(customer, completed, order_total)
            .await
        {
            Ok(coupon) => outcome.issued = Some(coupon),
            Err(CouponError::NoTier(_)) => {
                debug!(customer = %customer, "No completed orders, no progressive coupon");
            }
            Err(e) => {
                warn!(customer = %customer, error = %e, "Progressive coupon issuance failed");
                outcome.issuance_error = Some(e.to_string());
            }
        }

        outcome
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::Duration;
    use namidia_core::{Order, OrderStatus};

    async fn setup() -> (Database, CouponEngine) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = db.coupon_engine();
        (db, engine)
    }

    fn email(raw: &str) -> CustomerEmail {
        CustomerEmail::parse(raw).unwrap()
    }

    fn reais(amount: i64) -> Money {
        Money::from_cents(amount * 100)
    }

    fn manual_input(code: Option<&str>) -> NewManualCoupon {
        NewManualCoupon {
            code: code.map(str::to_string),
            discount_percentage: 25,
            owner_email: None,
            expires_at: Utc::now() + Duration::days(10),
            min_order_value_cents: 5000,
            max_uses: 2,
            created_by: Some("admin@namidia.com".to_string()),
        }
    }

    async fn record_order(db: &Database, customer: &CustomerEmail, status: OrderStatus) {
        db.orders()
            .insert(&Order {
                id: Uuid::new_v4().to_string(),
                customer_email: customer.clone(),
                status,
                total_cents: 8000,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_progression_tiers_on_issue() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");

        let mut discounts = Vec::new();
        for completed in [1, 2, 5] {
            let coupon = engine
                .issue_progressive_coupon(&ana, completed, reais(50))
                .await
                .unwrap();
            discounts.push(coupon.discount.get());
        }

        assert_eq!(discounts, vec![10, 15, 20]);
    }

    #[tokio::test]
    async fn test_issue_without_completed_orders_has_no_tier() {
        let (_db, engine) = setup().await;
        let err = engine
            .issue_progressive_coupon(&email("ana@x.com"), 0, reais(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::NoTier(0)));
    }

    #[tokio::test]
    async fn test_issued_coupon_is_persisted_unused() {
        let (db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine
            .issue_progressive_coupon(&ana, 1, reais(80))
            .await
            .unwrap();

        let stored = db.coupons().get_by_code(&issued.code).await.unwrap().unwrap();
        assert_eq!(stored.id, issued.id);
        assert!(!stored.is_exhausted());
        assert_eq!(stored.owner(), Some(&ana));
    }

    #[tokio::test]
    async fn test_validate_is_case_insensitive() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();

        let typed = format!("  {} ", issued.code.as_str().to_lowercase());
        let validation = engine.validate_coupon(&typed, &ana).await.unwrap();
        assert!(validation.is_valid());
    }

    #[tokio::test]
    async fn test_unknown_code_is_not_found() {
        let (_db, engine) = setup().await;
        let validation = engine
            .validate_coupon("NOPE-123", &email("ana@x.com"))
            .await
            .unwrap();
        assert_eq!(validation.rejection(), Some(&CouponRejection::NotFound));
    }

    #[tokio::test]
    async fn test_used_coupon_is_always_already_used() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 2, reais(80)).await.unwrap();

        engine.mark_coupon_used(issued.code.as_str(), &ana).await.unwrap();

        // far from expiry
        let validation = engine
            .validate_coupon_at(issued.code.as_str(), &ana, Utc::now())
            .await
            .unwrap();
        assert_eq!(validation.rejection(), Some(&CouponRejection::AlreadyUsed));

        let again = engine.mark_coupon_used(issued.code.as_str(), &ana).await.unwrap_err();
        assert_eq!(again.rejection(), Some(&CouponRejection::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_ownership_enforced() {
        let (_db, engine) = setup().await;
        let issued = engine
            .issue_progressive_coupon(&email("a@x.com"), 1, reais(80))
            .await
            .unwrap();

        let other = engine
            .validate_coupon(issued.code.as_str(), &email("b@x.com"))
            .await
            .unwrap();
        assert_eq!(other.rejection(), Some(&CouponRejection::NotYours));

        let owner = engine
            .validate_coupon(issued.code.as_str(), &email("a@x.com"))
            .await
            .unwrap();
        assert!(owner.is_valid());
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();
        let code = issued.code.as_str();
        let expiry = issued.expires_at;

        let before = engine
            .validate_coupon_at(code, &ana, expiry - Duration::seconds(1))
            .await
            .unwrap();
        let exact = engine.validate_coupon_at(code, &ana, expiry).await.unwrap();
        let after = engine
            .validate_coupon_at(code, &ana, expiry + Duration::seconds(1))
            .await
            .unwrap();

        assert!(before.is_valid());
        assert_eq!(exact.rejection(), Some(&CouponRejection::Expired));
        assert_eq!(after.rejection(), Some(&CouponRejection::Expired));
    }

    #[tokio::test]
    async fn test_apply_fifteen_percent_of_200() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 2, reais(80)).await.unwrap();

        let applied = engine
            .apply_coupon_to_order(issued.code.as_str(), &ana, reais(200))
            .await
            .unwrap();

        assert_eq!(applied.discount_percentage.get(), 15);
        assert_eq!(applied.discount_applied, reais(30));
        assert_eq!(applied.new_total, reais(170));

        // applying does not consume
        assert!(engine
            .validate_coupon(issued.code.as_str(), &ana)
            .await
            .unwrap()
            .is_valid());
    }

    #[tokio::test]
    async fn test_apply_propagates_rejection() {
        let (_db, engine) = setup().await;
        let err = engine
            .apply_coupon_to_order("MISSING", &email("ana@x.com"), reais(100))
            .await
            .unwrap_err();
        assert_eq!(err.rejection(), Some(&CouponRejection::NotFound));
        assert_eq!(err.to_string(), "Coupon not found");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redemption_has_one_winner() {
        // File-backed so the attempts run on separate pooled connections.
        let dir = std::env::temp_dir().join(format!("namidia-race-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::new(DbConfig::new(dir.join("namidia.db")).max_connections(4))
            .await
            .unwrap();
        let engine = db.coupon_engine();

        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();

        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                let ana = ana.clone();
                let code = issued.code.as_str().to_string();
                tokio::spawn(async move { engine.redeem_coupon(&code, &ana).await })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(()) => winners += 1,
                Err(e) => assert_eq!(e.rejection(), Some(&CouponRejection::AlreadyUsed)),
            }
        }
        assert_eq!(winners, 1);

        let stored = db.coupons().get_by_code(&issued.code).await.unwrap().unwrap();
        assert_eq!(stored.times_used(), 1);

        db.close().await;
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_redeem_refuses_another_customers_coupon() {
        let (_db, engine) = setup().await;
        let (a, b) = (email("a@x.com"), email("b@x.com"));
        let issued = engine.issue_progressive_coupon(&a, 1, reais(80)).await.unwrap();
        let code = issued.code.as_str();

        let err = engine.redeem_coupon(code, &b).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&CouponRejection::NotYours));

        let outcome = engine.complete_checkout(&b, reais(80), Some(code)).await;
        assert!(outcome.redeemed.is_none());
        assert_eq!(
            outcome.redemption_error.as_deref(),
            Some("This coupon belongs to another customer")
        );

        // the owner still has it
        assert!(engine.validate_coupon(code, &a).await.unwrap().is_valid());
        engine.redeem_coupon(code, &a).await.unwrap();
    }

    #[tokio::test]
    async fn test_redeem_refuses_expired_coupon() {
        let (db, engine) = setup().await;
        let ana = email("ana@x.com");
        let stale = draft_progressive_coupon(&ana, 1, Utc::now() - Duration::days(31)).unwrap();
        db.coupons().insert(&stale).await.unwrap();

        let err = engine.redeem_coupon(stale.code.as_str(), &ana).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&CouponRejection::Expired));

        let stored = db.coupons().get_by_code(&stale.code).await.unwrap().unwrap();
        assert!(!stored.is_exhausted());
    }

    #[tokio::test]
    async fn test_manual_coupon_lifecycle() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let created = engine
            .create_manual_coupon(manual_input(Some("festa-junina")))
            .await
            .unwrap();
        assert_eq!(created.code.as_str(), "FESTA-JUNINA");

        let below = engine
            .validate_manual_coupon("festa-junina", &ana, reais(49))
            .await
            .unwrap();
        assert_eq!(
            below.rejection(),
            Some(&CouponRejection::BelowMinimum { minimum: reais(50) })
        );
        assert!(engine
            .validate_manual_coupon("festa-junina", &ana, reais(50))
            .await
            .unwrap()
            .is_valid());

        engine.increment_coupon_usage("FESTA-JUNINA", &ana).await.unwrap();
        engine.redeem_coupon("festa-junina", &email("bia@x.com")).await.unwrap();

        let exhausted = engine
            .validate_coupon_for_order("FESTA-JUNINA", &ana, reais(100))
            .await
            .unwrap();
        assert_eq!(exhausted.rejection(), Some(&CouponRejection::AlreadyUsed));

        let err = engine.increment_coupon_usage("FESTA-JUNINA", &ana).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&CouponRejection::AlreadyUsed));
    }

    #[tokio::test]
    async fn test_manual_coupon_duplicate_code() {
        let (_db, engine) = setup().await;
        engine
            .create_manual_coupon(manual_input(Some("PROMO10")))
            .await
            .unwrap();

        let err = engine
            .create_manual_coupon(manual_input(Some("promo10")))
            .await
            .unwrap_err();
        assert!(matches!(err, CouponError::DuplicateCode(ref code) if code == "PROMO10"));
    }

    #[tokio::test]
    async fn test_manual_coupon_generated_code_and_bad_input() {
        let (_db, engine) = setup().await;
        let created = engine.create_manual_coupon(manual_input(None)).await.unwrap();
        assert!(created.code.as_str().starts_with("NAMIDIA-"));

        let mut bad = manual_input(Some("OK-CODE"));
        bad.max_uses = 0;
        assert!(matches!(
            engine.create_manual_coupon(bad).await,
            Err(CouponError::Invalid(_))
        ));

        let mut past = manual_input(Some("OLD-CODE"));
        past.expires_at = Utc::now() - Duration::days(1);
        assert!(matches!(
            engine.create_manual_coupon(past).await,
            Err(CouponError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_inactive_manual_coupon() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let created = engine
            .create_manual_coupon(manual_input(Some("SWITCH")))
            .await
            .unwrap();

        engine.update_coupon_status(&created.id, false).await.unwrap();
        let validation = engine.validate_coupon("SWITCH", &ana).await.unwrap();
        assert_eq!(validation.rejection(), Some(&CouponRejection::Inactive));

        let err = engine.redeem_coupon("SWITCH", &ana).await.unwrap_err();
        assert_eq!(err.rejection(), Some(&CouponRejection::Inactive));

        engine.update_coupon_status(&created.id, true).await.unwrap();
        assert!(engine.validate_coupon("SWITCH", &ana).await.unwrap().is_valid());
    }

    #[tokio::test]
    async fn test_manual_path_rejects_progressive_code() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let issued = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();

        let validation = engine
            .validate_manual_coupon(issued.code.as_str(), &ana, reais(100))
            .await
            .unwrap();
        assert_eq!(validation.rejection(), Some(&CouponRejection::NotFound));
    }

    #[tokio::test]
    async fn test_delete_and_list_manual() {
        let (_db, engine) = setup().await;
        let first = engine.create_manual_coupon(manual_input(Some("FIRST"))).await.unwrap();
        engine.create_manual_coupon(manual_input(Some("SECOND"))).await.unwrap();
        assert_eq!(engine.list_manual_coupons().await.unwrap().len(), 2);

        engine.delete_coupon(&first.id).await.unwrap();
        let remaining = engine.list_manual_coupons().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].code.as_str(), "SECOND");
    }

    #[tokio::test]
    async fn test_customer_coupons_only_usable() {
        let (_db, engine) = setup().await;
        let ana = email("ana@x.com");
        let own = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();
        let used = engine.issue_progressive_coupon(&ana, 2, reais(80)).await.unwrap();
        engine.mark_coupon_used(used.code.as_str(), &ana).await.unwrap();
        engine
            .issue_progressive_coupon(&email("bia@x.com"), 1, reais(80))
            .await
            .unwrap();
        let global = engine.create_manual_coupon(manual_input(Some("TODOS"))).await.unwrap();

        let coupons = engine.customer_coupons(&ana).await.unwrap();
        let mut codes: Vec<&str> = coupons.iter().map(|c| c.code.as_str()).collect();
        codes.sort_unstable();

        let mut expected = vec![own.code.as_str(), global.code.as_str()];
        expected.sort_unstable();
        assert_eq!(codes, expected);
    }

    #[tokio::test]
    async fn test_complete_checkout_redeems_and_issues() {
        let (db, engine) = setup().await;
        let ana = email("ana@x.com");
        let first = engine.issue_progressive_coupon(&ana, 1, reais(80)).await.unwrap();

        record_order(&db, &ana, OrderStatus::Delivered).await;
        record_order(&db, &ana, OrderStatus::Cancelled).await;
        record_order(&db, &ana, OrderStatus::Confirmed).await;

        let outcome = engine
            .complete_checkout(&ana, reais(120), Some(first.code.as_str()))
            .await;

        assert_eq!(outcome.redeemed.as_ref(), Some(&first.code));
        assert!(outcome.redemption_error.is_none());
        assert!(outcome.issuance_error.is_none());
        assert_eq!(outcome.issued.map(|c| c.discount.get()), Some(15));
    }

    #[tokio::test]
    async fn test_complete_checkout_never_fails() {
        let (db, engine) = setup().await;
        let ana = email("ana@x.com");
        record_order(&db, &ana, OrderStatus::Delivered).await;

        let outcome = engine
            .complete_checkout(&ana, reais(40), Some("DOES-NOT-EXIST"))
            .await;
        assert_eq!(outcome.redemption_error.as_deref(), Some("Coupon not found"));
        assert!(outcome.issued.is_some());

        db.close().await;
        let outcome = engine.complete_checkout(&ana, reais(40), None).await;
        assert!(outcome.issued.is_none());
        assert!(outcome.issuance_error.is_some());
    }
}
