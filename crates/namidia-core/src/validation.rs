//! # Validation Module
//!
//! Input validation for the admin coupon forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Admin UI                                                     │
//! │  └── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Coupon Engine (Rust)                                         │
//! │  └── THIS MODULE: range and format rules                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database                                                     │
//! │  ├── UNIQUE(code)                                                      │
//! │  └── CHECK(discount_percentage BETWEEN 0 AND 100)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Shortest code an administrator may pick.
pub const MIN_CODE_LEN: usize = 3;

/// Longest code an administrator may pick.
pub const MAX_CODE_LEN: usize = 30;

// =============================================================================
// String Validators
// =============================================================================

/// Validates an administrator-chosen coupon code.
///
/// ## Rules
/// - 3 to 30 characters after trimming
/// - Letters, digits, hyphens and underscores only
///
/// ```rust
/// use namidia_core::validation::validate_coupon_code;
///
/// assert!(validate_coupon_code("FESTA-JUNINA").is_ok());
/// assert!(validate_coupon_code("ab").is_err());
/// assert!(validate_coupon_code("has space").is_err());
/// ```
pub fn validate_coupon_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() < MIN_CODE_LEN {
        return Err(ValidationError::TooShort {
            field: "code".to_string(),
            min: MIN_CODE_LEN,
        });
    }

    if code.chars().count() > MAX_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LEN,
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// A manual coupon must discount something: 1..=100.
pub fn validate_discount_percentage(percent: i64) -> ValidationResult<()> {
    if !(1..=100).contains(&percent) {
        return Err(ValidationError::OutOfRange {
            field: "discount_percentage".to_string(),
            min: 1,
            max: 100,
        });
    }
    Ok(())
}

/// Usage limit must allow at least one redemption.
pub fn validate_max_uses(max_uses: i64) -> ValidationResult<()> {
    if max_uses < 1 {
        return Err(ValidationError::MustBePositive {
            field: "max_uses".to_string(),
        });
    }
    Ok(())
}

/// Minimum order value may be zero (no minimum) but not negative.
pub fn validate_min_order_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_order_value".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

// =============================================================================
// Time Validators
// =============================================================================

/// Rejects coupons that would be born expired.
pub fn validate_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> ValidationResult<()> {
    if expires_at <= now {
        return Err(ValidationError::NotInFuture {
            field: "expires_at".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_coupon_code() {
        assert!(validate_coupon_code("FESTA10").is_ok());
        assert!(validate_coupon_code("black_friday-2026").is_ok());
        assert!(validate_coupon_code("  ABC  ").is_ok());

        assert!(validate_coupon_code("").is_err());
        assert!(validate_coupon_code("   ").is_err());
        assert!(validate_coupon_code("AB").is_err());
        assert!(validate_coupon_code("CUPOM GRÁTIS").is_err());
        assert!(validate_coupon_code(&"A".repeat(31)).is_err());
    }

    #[test]
    fn test_validate_discount_percentage() {
        assert!(validate_discount_percentage(1).is_ok());
        assert!(validate_discount_percentage(100).is_ok());
        assert!(validate_discount_percentage(0).is_err());
        assert!(validate_discount_percentage(101).is_err());
    }

    #[test]
    fn test_validate_max_uses() {
        assert!(validate_max_uses(1).is_ok());
        assert!(validate_max_uses(500).is_ok());
        assert!(validate_max_uses(0).is_err());
        assert!(validate_max_uses(-2).is_err());
    }

    #[test]
    fn test_validate_min_order_cents() {
        assert!(validate_min_order_cents(0).is_ok());
        assert!(validate_min_order_cents(5000).is_ok());
        assert!(validate_min_order_cents(-1).is_err());
    }

    #[test]
    fn test_validate_expiry() {
        let now = Utc::now();
        assert!(validate_expiry(now + Duration::hours(1), now).is_ok());
        assert!(validate_expiry(now, now).is_err());
        assert!(validate_expiry(now - Duration::hours(1), now).is_err());
    }
}
