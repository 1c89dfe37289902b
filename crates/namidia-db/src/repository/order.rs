//! # Order Repository
//!
//! The coupon engine only needs two things from orders: recording them (for
//! seeding and tests) and counting a customer's completed ones to pick the
//! progressive tier.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use namidia_core::{CustomerEmail, Order, OrderStatus};

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: String,
    customer_email: String,
    status: OrderStatus,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = DbError;

    fn try_from(row: OrderRow) -> DbResult<Self> {
        let customer_email = CustomerEmail::parse(&row.customer_email)
            .map_err(|e| DbError::malformed("orders", row.id.clone(), e.to_string()))?;

        Ok(Order {
            id: row.id,
            customer_email,
            status: row.status,
            total_cents: row.total_cents,
            created_at: row.created_at,
        })
    }
}

/// Repository for order store operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(
            id = %order.id,
            customer = %order.customer_email,
            status = ?order.status,
            "Inserting order"
        );

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_email, status, total_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&order.id)
        .bind(order.customer_email.as_str())
        .bind(order.status)
        .bind(order.total_cents)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, customer_email, status, total_cents, created_at FROM orders WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    /// Number of orders that count towards the loyalty tier: every order
    /// that was not cancelled.
    pub async fn count_completed(&self, customer: &CustomerEmail) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE customer_email = ?1 AND status != 'cancelled'",
        )
        .bind(customer.as_str())
        .fetch_one(&self.pool)
        .await?;

        debug!(customer = %customer, count, "Counted completed orders");
        Ok(count)
    }
}
