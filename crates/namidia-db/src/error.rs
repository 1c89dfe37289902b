//! # Store Error Types
//!
//! Error types for store operations and the Coupon Engine.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CouponError ← Adds typed rejections and duplicate-code failures       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Checkout UI: rejection → inline message, Db → toast or ignore         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use namidia_core::{CoreError, CouponRejection, ValidationError};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// Store operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in the store.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Two coupons generated with the same code
    /// - Admin picks a code that was inserted between pre-check and insert
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A row that decodes but breaks a domain invariant.
    ///
    /// ## When This Occurs
    /// - Progressive coupon row without an owner or order number
    /// - Discount outside 0-100, usage limit below 1
    /// - Unparseable email in an owner column
    #[error("Malformed {table} record {id}: {reason}")]
    MalformedRecord {
        table: &'static str,
        id: String,
        reason: String,
    },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a MalformedRecord error.
    pub fn malformed(table: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::MalformedRecord {
            table,
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// CouponError
// =============================================================================

/// Failures returned by the Coupon Engine.
///
/// Validation itself never fails with this type; `validate_*` returns a
/// `CouponValidation`. Operations that *act* on a coupon (apply, redeem,
/// create) surface a rejection through [`CouponError::Rejected`].
#[derive(Debug, Error)]
pub enum CouponError {
    /// The coupon cannot be used; the message is meant for the customer.
    #[error("{0}")]
    Rejected(#[from] CouponRejection),

    /// Admin tried to create a coupon with a code that already exists.
    #[error("Coupon code '{0}' already exists")]
    DuplicateCode(String),

    /// Admin input failed validation.
    #[error("Invalid coupon input: {0}")]
    Invalid(#[from] ValidationError),

    /// Customer identity or other domain input was unusable.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// No progressive tier applies (customer has no completed order).
    #[error("No progressive tier for {0} completed orders")]
    NoTier(i64),

    /// The store failed. Callers decide whether to surface or ignore it.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl CouponError {
    /// The typed rejection, if this error is one.
    pub fn rejection(&self) -> Option<&CouponRejection> {
        match self {
            CouponError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for CouponError {
    fn from(err: sqlx::Error) -> Self {
        CouponError::Db(err.into())
    }
}

/// Result type for Coupon Engine operations.
pub type CouponResult<T> = Result<T, CouponError>;

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration load/save failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_passes_through() {
        let err: CouponError = CouponRejection::NotYours.into();
        assert_eq!(err.to_string(), "This coupon belongs to another customer");
        assert_eq!(err.rejection(), Some(&CouponRejection::NotYours));
    }

    #[test]
    fn test_db_error_is_not_a_rejection() {
        let err: CouponError = DbError::PoolExhausted.into();
        assert!(err.rejection().is_none());
        assert_eq!(err.to_string(), "Connection pool exhausted");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[test]
    fn test_malformed_message() {
        let err = DbError::malformed("coupons_progressive", "abc", "missing owner");
        assert_eq!(
            err.to_string(),
            "Malformed coupons_progressive record abc: missing owner"
        );
    }
}
