//! # namidia-db: Store Layer and Coupon Engine for Na Mídia
//!
//! SQLite persistence through sqlx, plus the async Coupon Engine that
//! drives `namidia_core::coupon` rules against it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Na Mídia Data Flow                               │
//! │                                                                         │
//! │  Checkout UI / Admin back office                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   namidia-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ CouponEngine  │───►│  Repositories │───►│   Database   │  │   │
//! │  │   │ (engine.rs)   │    │ CouponRepo    │    │  (pool.rs)   │  │   │
//! │  │   │               │    │ OrderRepo     │    │  SqlitePool  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ JsonFileCart  │    │ EngineConfig  │    │  Migrations  │  │   │
//! │  │   │ Storage       │    │ (toml + env)  │    │  (embedded)  │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: coupons_progressive, orders                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`repository`] - Coupon and order repositories
//! - [`engine`] - Issue, validate, redeem and administer coupons
//! - [`storage`] - File-backed cart snapshots
//! - [`config`] - TOML and environment configuration
//! - [`error`] - Store, coupon and config error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use namidia_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("namidia.db")).await?;
//! let engine = db.coupon_engine();
//!
//! let applied = engine.apply_coupon_to_order("NM10-ANA-7F3C2A", &customer, total).await?;
//! // ... record the order ...
//! let outcome = engine.complete_checkout(&customer, total, Some("NM10-ANA-7F3C2A")).await;
//! ```

use tracing_subscriber::EnvFilter;

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{CheckoutOutcome, CouponEngine, NewManualCoupon};
pub use error::{ConfigError, CouponError, CouponResult, DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use storage::JsonFileCartStorage;

// Repository re-exports for convenience
pub use repository::coupon::CouponRepository;
pub use repository::order::OrderRepository;

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (usually
/// [`EngineConfig::log_filter`]). Calling it twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
