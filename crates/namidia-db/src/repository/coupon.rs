//! # Coupon Repository
//!
//! Store operations for `coupons_progressive`, which holds both coupon
//! families.
//!
//! ## Row Decoding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SELECT ... FROM coupons_progressive                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CouponRow (FromRow: raw columns, nullable as stored)                  │
//! │       │                                                                 │
//! │       ▼  TryFrom                                                        │
//! │  ┌───────────────────────────┐     ┌─────────────────────────────────┐ │
//! │  │ manual_created = 0        │     │ manual_created = 1              │ │
//! │  │ owner + order_number set  │     │ max_uses >= 1, used_count >= 0  │ │
//! │  │ → CouponKind::Progressive │     │ → CouponKind::Manual            │ │
//! │  └───────────────────────────┘     └─────────────────────────────────┘ │
//! │       │ anything else                                                   │
//! │       ▼                                                                 │
//! │  DbError::MalformedRecord                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Redemption
//! Both redemption paths are one conditional `UPDATE`. The guard in the
//! `WHERE` clause makes the check and the write a single step, so two
//! concurrent redemptions of a single-use coupon cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use namidia_core::{Coupon, CouponCode, CouponKind, CustomerEmail, DiscountPercent, Money};

const TABLE: &str = "coupons_progressive";

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, code, discount_percentage, user_email, order_number,
        expires_at, is_used, used_count, max_uses, is_active,
        manual_created, min_order_value_cents, created_by, created_at
    FROM coupons_progressive
"#;

// =============================================================================
// Row Type
// =============================================================================

/// A `coupons_progressive` row exactly as stored.
#[derive(Debug, Clone, FromRow)]
pub struct CouponRow {
    pub id: String,
    pub code: String,
    pub discount_percentage: i64,
    pub user_email: Option<String>,
    pub order_number: Option<i64>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_count: i64,
    pub max_uses: i64,
    pub is_active: bool,
    pub manual_created: bool,
    pub min_order_value_cents: i64,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = DbError;

    fn try_from(row: CouponRow) -> DbResult<Self> {
        let id = row.id;
        let malformed = |reason: String| DbError::malformed(TABLE, id.clone(), reason);

        let code = CouponCode::normalize(&row.code);
        if code.is_empty() {
            return Err(malformed("empty code".to_string()));
        }

        let discount =
            DiscountPercent::new(row.discount_percentage).map_err(|e| malformed(e.to_string()))?;

        let owner = row
            .user_email
            .as_deref()
            .map(CustomerEmail::parse)
            .transpose()
            .map_err(|e| malformed(e.to_string()))?;

        let kind = if row.manual_created {
            if row.max_uses < 1 {
                return Err(malformed(format!("max_uses {} below 1", row.max_uses)));
            }
            if row.used_count < 0 {
                return Err(malformed(format!("negative used_count {}", row.used_count)));
            }
            if row.min_order_value_cents < 0 {
                return Err(malformed("negative minimum order value".to_string()));
            }

            CouponKind::Manual {
                owner,
                min_order_value: Money::from_cents(row.min_order_value_cents),
                max_uses: row.max_uses,
                used_count: row.used_count,
                is_active: row.is_active,
                created_by: row.created_by,
            }
        } else {
            let owner = owner.ok_or_else(|| malformed("progressive coupon without owner".to_string()))?;
            let order_number = row
                .order_number
                .filter(|n| *n >= 1)
                .ok_or_else(|| malformed("progressive coupon without order number".to_string()))?;

            CouponKind::Progressive {
                owner,
                order_number,
                is_used: row.is_used,
            }
        };

        Ok(Coupon {
            id,
            code,
            discount,
            expires_at: row.expires_at,
            created_at: row.created_at,
            kind,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for coupon store operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Looks up a coupon by (normalized) code.
    pub async fn get_by_code(&self, code: &CouponCode) -> DbResult<Option<Coupon>> {
        debug!(code = %code, "Fetching coupon by code");

        let row: Option<CouponRow> =
            sqlx::query_as(&format!("{} WHERE code = ?1", SELECT_COLUMNS))
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Coupon::try_from).transpose()
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Coupon::try_from).transpose()
    }

    /// Whether any coupon already uses `code`.
    pub async fn code_exists(&self, code: &CouponCode) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupons_progressive WHERE code = ?1")
                .bind(code.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Inserts a coupon. A duplicate code surfaces as
    /// [`DbError::UniqueViolation`].
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<()> {
        debug!(
            id = %coupon.id,
            code = %coupon.code,
            discount = coupon.discount.get(),
            "Inserting coupon"
        );

        let (user_email, order_number, is_used, used_count, max_uses, is_active, manual, min_order, created_by) =
            match &coupon.kind {
                CouponKind::Progressive {
                    owner,
                    order_number,
                    is_used,
                } => (
                    Some(owner.as_str().to_string()),
                    Some(*order_number),
                    *is_used,
                    i64::from(*is_used),
                    1_i64,
                    true,
                    false,
                    0_i64,
                    None,
                ),
                CouponKind::Manual {
                    owner,
                    min_order_value,
                    max_uses,
                    used_count,
                    is_active,
                    created_by,
                } => (
                    owner.as_ref().map(|o| o.as_str().to_string()),
                    None,
                    used_count >= max_uses,
                    *used_count,
                    *max_uses,
                    *is_active,
                    true,
                    min_order_value.cents(),
                    created_by.clone(),
                ),
            };

        let result = sqlx::query(
            r#"
            INSERT INTO coupons_progressive (
                id, code, discount_percentage, user_email, order_number,
                expires_at, is_used, used_count, max_uses, is_active,
                manual_created, min_order_value_cents, created_by, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14
            )
            "#,
        )
        .bind(&coupon.id)
        .bind(coupon.code.as_str())
        .bind(i64::from(coupon.discount.get()))
        .bind(user_email)
        .bind(order_number)
        .bind(coupon.expires_at)
        .bind(is_used)
        .bind(used_count)
        .bind(max_uses)
        .bind(is_active)
        .bind(manual)
        .bind(min_order)
        .bind(created_by)
        .bind(coupon.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match DbError::from(e) {
                DbError::UniqueViolation { field, .. } if field.ends_with(".code") => {
                    Err(DbError::duplicate("code", coupon.code.as_str()))
                }
                other => Err(other),
            },
        }
    }

    /// Marks a progressive coupon used by `customer`.
    ///
    /// One conditional `UPDATE`: the owner, usage and expiry checks happen in
    /// the same statement as the write. Returns `false` when no row changed:
    /// unknown code, a manual coupon, someone else's coupon, already used, or
    /// expired at `now`.
    ///
    /// `expires_at > ?` compares the RFC 3339 text sqlx writes for every
    /// `DateTime<Utc>` (always `+00:00`), which orders like the instants.
    pub async fn mark_used(
        &self,
        code: &CouponCode,
        customer: &CustomerEmail,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons_progressive SET
                is_used = 1,
                used_count = used_count + 1
            WHERE code = ?1
              AND manual_created = 0
              AND is_used = 0
              AND (user_email IS NULL OR user_email = ?2)
              AND expires_at > ?3
            "#,
        )
        .bind(code.as_str())
        .bind(customer.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() == 1;
        debug!(code = %code, changed, "Mark progressive coupon used");
        Ok(changed)
    }

    /// Consumes one use of a manual coupon on behalf of `customer`.
    ///
    /// Atomic increment guarded by owner (global or `customer`), `is_active`,
    /// `used_count < max_uses` and `expires_at > now`. `is_used` flips once
    /// the last use is taken. Returns `false` when no row changed.
    pub async fn increment_usage(
        &self,
        code: &CouponCode,
        customer: &CustomerEmail,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE coupons_progressive SET
                used_count = used_count + 1,
                is_used = CASE WHEN used_count + 1 >= max_uses THEN 1 ELSE 0 END
            WHERE code = ?1
              AND manual_created = 1
              AND is_active = 1
              AND used_count < max_uses
              AND (user_email IS NULL OR user_email = ?2)
              AND expires_at > ?3
            "#,
        )
        .bind(code.as_str())
        .bind(customer.as_str())
        .bind(now)
        .execute(&self.pool)
        .await?;

        let changed = result.rows_affected() == 1;
        debug!(code = %code, changed, "Increment manual coupon usage");
        Ok(changed)
    }

    /// Toggles a manual coupon's active flag.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE coupons_progressive SET is_active = ?2
            WHERE id = ?1 AND manual_created = 1
            "#,
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Manual coupon", id));
        }

        Ok(())
    }

    /// Deletes a coupon by id.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM coupons_progressive WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }

        Ok(())
    }

    /// All manual coupons, newest first.
    pub async fn list_manual(&self) -> DbResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(&format!(
            "{} WHERE manual_created = 1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Coupon::try_from).collect()
    }

    /// Coupons a customer could see: their own plus global manual ones.
    /// No filtering by state; that is a domain decision made by the engine.
    pub async fn list_visible_to(&self, customer: &CustomerEmail) -> DbResult<Vec<Coupon>> {
        let rows: Vec<CouponRow> = sqlx::query_as(&format!(
            "{} WHERE user_email = ?1 OR (manual_created = 1 AND user_email IS NULL) ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(customer.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Coupon::try_from).collect()
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
    use namidia_core::coupon::draft_progressive_coupon;

    async fn repo() -> CouponRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().coupons()
    }

    fn email(raw: &str) -> CustomerEmail {
        CustomerEmail::parse(raw).unwrap()
    }

    fn manual(code: &str, max_uses: i64) -> Coupon {
        Coupon {
            id: uuid::Uuid::new_v4().to_string(),
            code: CouponCode::normalize(code),
            discount: DiscountPercent::new(20).unwrap(),
            expires_at: Utc::now() + Duration::days(7),
            created_at: Utc::now(),
            kind: CouponKind::Manual {
                owner: None,
                min_order_value: Money::from_cents(3000),
                max_uses,
                used_count: 0,
                is_active: true,
                created_by: Some("admin@namidia.com".to_string()),
            },
        }
    }

    fn base_row() -> CouponRow {
        CouponRow {
            id: "row-1".to_string(),
            code: "nm10-ana-abc123".to_string(),
            discount_percentage: 10,
            user_email: Some("ana@x.com".to_string()),
            order_number: Some(2),
            expires_at: Utc::now(),
            is_used: false,
            used_count: 0,
            max_uses: 1,
            is_active: true,
            manual_created: false,
            min_order_value_cents: 0,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_decodes_progressive() {
        let coupon = Coupon::try_from(base_row()).unwrap();
        assert!(coupon.is_progressive());
        assert_eq!(coupon.code.as_str(), "NM10-ANA-ABC123");
    }

    #[test]
    fn test_row_rejects_progressive_without_owner() {
        let mut row = base_row();
        row.user_email = None;
        assert!(matches!(
            Coupon::try_from(row),
            Err(DbError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_row_rejects_progressive_without_order_number() {
        let mut row = base_row();
        row.order_number = None;
        assert!(Coupon::try_from(row).is_err());
    }

    #[test]
    fn test_row_rejects_bad_discount() {
        let mut row = base_row();
        row.discount_percentage = 150;
        assert!(Coupon::try_from(row).is_err());
    }

    #[test]
    fn test_row_rejects_manual_with_zero_max_uses() {
        let mut row = base_row();
        row.manual_created = true;
        row.max_uses = 0;
        assert!(Coupon::try_from(row).is_err());
    }

    #[tokio::test]
    async fn test_insert_and_fetch_roundtrip_case_insensitive() {
        let repo = repo().await;
        let coupon = manual("festa", 5);
        repo.insert(&coupon).await.unwrap();

        let fetched = repo
            .get_by_code(&CouponCode::normalize(" FeStA "))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.id, coupon.id);
        assert_eq!(fetched.minimum_order().cents(), 3000);
        assert_eq!(fetched.usage_limit(), 5);
    }

    #[tokio::test]
    async fn test_duplicate_code_is_unique_violation() {
        let repo = repo().await;
        repo.insert(&manual("dup", 1)).await.unwrap();

        let err = repo.insert(&manual("DUP", 1)).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_mark_used_only_once() {
        let repo = repo().await;
        let ana = email("ana@x.com");
        let coupon = draft_progressive_coupon(&ana, 1, Utc::now()).unwrap();
        repo.insert(&coupon).await.unwrap();

        assert!(repo.mark_used(&coupon.code, &ana, Utc::now()).await.unwrap());
        assert!(!repo.mark_used(&coupon.code, &ana, Utc::now()).await.unwrap());

        let stored = repo.get_by_code(&coupon.code).await.unwrap().unwrap();
        assert!(stored.is_exhausted());
    }

    #[tokio::test]
    async fn test_increment_usage_stops_at_limit() {
        let repo = repo().await;
        let coupon = manual("twice", 2);
        repo.insert(&coupon).await.unwrap();
        let (ana, bia) = (email("ana@x.com"), email("bia@x.com"));

        assert!(repo.increment_usage(&coupon.code, &ana, Utc::now()).await.unwrap());
        assert!(repo.increment_usage(&coupon.code, &bia, Utc::now()).await.unwrap());
        assert!(!repo.increment_usage(&coupon.code, &ana, Utc::now()).await.unwrap());

        let stored = repo.get_by_code(&coupon.code).await.unwrap().unwrap();
        assert_eq!(stored.times_used(), 2);
        assert!(stored.is_exhausted());
    }

    #[tokio::test]
    async fn test_mark_used_ignores_manual_coupons() {
        let repo = repo().await;
        let coupon = manual("manualonly", 3);
        repo.insert(&coupon).await.unwrap();

        assert!(!repo.mark_used(&coupon.code, &email("ana@x.com"), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_used_requires_owner() {
        let repo = repo().await;
        let ana = email("ana@x.com");
        let coupon = draft_progressive_coupon(&ana, 1, Utc::now()).unwrap();
        repo.insert(&coupon).await.unwrap();

        let bia = email("bia@x.com");
        assert!(!repo.mark_used(&coupon.code, &bia, Utc::now()).await.unwrap());

        let stored = repo.get_by_code(&coupon.code).await.unwrap().unwrap();
        assert!(!stored.is_exhausted());
        assert!(repo.mark_used(&coupon.code, &ana, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_redemption_refused_once_expired() {
        let repo = repo().await;
        let ana = email("ana@x.com");
        let progressive = draft_progressive_coupon(&ana, 1, Utc::now()).unwrap();
        let global = manual("shortlived", 5);
        repo.insert(&progressive).await.unwrap();
        repo.insert(&global).await.unwrap();

        let after_expiry = Utc::now() + Duration::days(31);
        assert!(!repo.mark_used(&progressive.code, &ana, after_expiry).await.unwrap());
        assert!(!repo.increment_usage(&global.code, &ana, after_expiry).await.unwrap());

        // the exact expiry instant already counts as expired
        let at_expiry = global.expires_at;
        assert!(!repo.increment_usage(&global.code, &ana, at_expiry).await.unwrap());

        let stored = repo.get_by_code(&global.code).await.unwrap().unwrap();
        assert_eq!(stored.times_used(), 0);
    }

    #[tokio::test]
    async fn test_owned_manual_coupon_rejects_other_customers() {
        let repo = repo().await;
        let mut coupon = manual("vip-ana", 3);
        if let CouponKind::Manual { owner, .. } = &mut coupon.kind {
            *owner = Some(email("ana@x.com"));
        }
        repo.insert(&coupon).await.unwrap();

        assert!(!repo.increment_usage(&coupon.code, &email("bia@x.com"), Utc::now()).await.unwrap());
        assert!(repo.increment_usage(&coupon.code, &email("ana@x.com"), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_set_active_and_delete() {
        let repo = repo().await;
        let coupon = manual("toggle", 1);
        repo.insert(&coupon).await.unwrap();

        repo.set_active(&coupon.id, false).await.unwrap();
        assert!(!repo.get_by_id(&coupon.id).await.unwrap().unwrap().is_active());

        repo.delete(&coupon.id).await.unwrap();
        assert!(repo.get_by_id(&coupon.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete(&coupon.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_visible_to_customer() {
        let repo = repo().await;
        let ana = email("ana@x.com");
        let own = draft_progressive_coupon(&ana, 1, Utc::now()).unwrap();
        let other = draft_progressive_coupon(&email("bia@x.com"), 1, Utc::now()).unwrap();
        let global = manual("everyone", 10);

        repo.insert(&own).await.unwrap();
        repo.insert(&other).await.unwrap();
        repo.insert(&global).await.unwrap();

        let visible = repo.list_visible_to(&ana).await.unwrap();
        let ids: Vec<&str> = visible.iter().map(|c| c.id.as_str()).collect();

        assert_eq!(visible.len(), 2);
        assert!(ids.contains(&own.id.as_str()));
        assert!(ids.contains(&global.id.as_str()));
        assert_eq!(repo.list_manual().await.unwrap().len(), 1);
    }
}
