//! # Error Types
//!
//! Domain-specific error types for namidia-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  namidia-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── ValidationError  - Admin input validation failures                │
//! │  └── CouponRejection  - Why a coupon cannot be used (shown to user)    │
//! │                                                                         │
//! │  namidia-db errors (separate crate)                                    │
//! │  ├── DbError          - Store operation failures                       │
//! │  └── CouponError      - Coupon Engine failures (wraps the above)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, field, amount)
//! 3. Errors are enum variants, never String
//! 4. Each variant maps to a specific user-facing message

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Discount percentage outside 0-100.
    #[error("Discount percentage must be between 0 and 100, got {0}")]
    InvalidDiscount(i64),

    /// Customer identity is not a usable email address.
    #[error("Invalid customer email: '{0}'")]
    InvalidEmail(String),

    /// A cart snapshot could not be encoded or decoded.
    #[error("Cart snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// The cart storage adapter failed.
    #[error("Cart storage failed: {0}")]
    Storage(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors for the admin coupon forms.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., bad code characters, malformed email).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A timestamp that must lie in the future does not.
    #[error("{field} must be in the future")]
    NotInFuture { field: String },
}

// =============================================================================
// Coupon Rejection
// =============================================================================

/// Why a coupon cannot be applied.
///
/// These are *results*, not failures of the system: validation returns them
/// as the `Invalid` arm and the checkout UI shows the message verbatim.
///
/// ## User Workflow
/// ```text
/// Customer types "NM15-ANA-7F3C2A" at checkout
///      │
///      ▼
/// validate_coupon(code, customer)
///      │
///      ├── no such code          → NotFound     "Coupon not found"
///      ├── owned by someone else → NotYours     "This coupon belongs to another customer"
///      ├── is_used / count = max → AlreadyUsed  "This coupon has already been used"
///      ├── now >= expires_at     → Expired      "This coupon has expired"
///      └── total < minimum       → BelowMinimum "Minimum order for this coupon is R$ 50,00"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Coupon not found")]
    NotFound,

    #[error("This coupon belongs to another customer")]
    NotYours,

    #[error("This coupon has already been used")]
    AlreadyUsed,

    #[error("This coupon has expired")]
    Expired,

    /// Manual coupon switched off by an administrator.
    #[error("This coupon is no longer active")]
    Inactive,

    #[error("Minimum order for this coupon is {minimum}")]
    BelowMinimum { minimum: Money },
}

impl CouponRejection {
    /// Stable machine-readable code for the UI.
    pub fn code(&self) -> &'static str {
        match self {
            CouponRejection::NotFound => "not_found",
            CouponRejection::NotYours => "not_yours",
            CouponRejection::AlreadyUsed => "already_used",
            CouponRejection::Expired => "expired",
            CouponRejection::Inactive => "inactive",
            CouponRejection::BelowMinimum { .. } => "below_minimum",
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
