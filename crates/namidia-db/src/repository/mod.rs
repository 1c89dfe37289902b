//! # Repository Module
//!
//! One repository per table. Each takes a cloned `SqlitePool`, maps rows
//! through `TryFrom` into domain types, and returns `DbResult`.

pub mod coupon;
pub mod order;

pub use coupon::{CouponRepository, CouponRow};
pub use order::OrderRepository;
