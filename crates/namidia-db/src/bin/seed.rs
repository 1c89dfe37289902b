//! # Seed Data Generator
//!
//! Populates the database with orders and coupons for development.
//!
//! ## Usage
//! ```bash
//! # Seed the database from namidia.toml / NAMIDIA_DB_PATH
//! cargo run -p namidia-db --bin seed
//!
//! # Explicit database and config
//! cargo run -p namidia-db --bin seed -- --db ./data/namidia.db --config ./namidia.toml
//! ```
//!
//! ## Generated Data
//! - Customers with 1 to 4 delivered orders each, so every progressive tier
//!   is represented, each holding the coupon for their next order
//! - One cancelled order (does not count towards the tier)
//! - Global and customer-specific manual coupons

use chrono::{Duration, Utc};
use std::env;
use std::path::PathBuf;

use namidia_core::{CustomerEmail, Money, Order, OrderStatus};
use namidia_db::{init_tracing, Database, EngineConfig, NewManualCoupon};
use uuid::Uuid;

/// `(customer, delivered orders)`
const CUSTOMERS: &[(&str, i64)] = &[
    ("ana@namidia.dev", 1),
    ("bruno@namidia.dev", 2),
    ("carla@namidia.dev", 3),
    ("diego@namidia.dev", 4),
];

/// `(code, discount %, owner, min order cents, max uses)`
const MANUAL_COUPONS: &[(&str, i64, Option<&str>, i64, i64)] = &[
    ("BEMVINDO", 10, None, 0, 500),
    ("FESTA-JUNINA", 25, None, 8000, 50),
    ("VIP-CARLA", 30, Some("carla@namidia.dev"), 0, 1),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Na Mídia Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>        Database file path (overrides config)");
                println!("  -c, --config <PATH>    Config file (default: platform config dir)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = EngineConfig::load_or_default(config_path);
    if let Some(path) = db_path {
        config.database.path = PathBuf::from(path);
    }
    init_tracing(&config.log_filter);

    println!("🌱 Na Mídia Seed Data Generator");
    println!("================================");
    println!("Database: {}", config.database.path.display());
    println!();

    let db = Database::new(config.to_db_config()).await?;
    let engine = db.coupon_engine();

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    if !engine.list_manual_coupons().await?.is_empty() {
        println!("⚠ Database already has coupons");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Placing orders...");

    for (raw_email, delivered) in CUSTOMERS {
        let customer = CustomerEmail::parse(raw_email)?;
        let mut last_total = Money::zero();

        for n in 0..*delivered {
            last_total = Money::from_cents(4500 + n * 1250);
            db.orders()
                .insert(&order(&customer, OrderStatus::Delivered, last_total))
                .await?;
        }

        // Only the last checkout matters: it issues the coupon for the next order.
        let outcome = engine.complete_checkout(&customer, last_total, None).await;
        match outcome.issued {
            Some(coupon) => println!(
                "  {} ({} orders) → {} ({})",
                customer, delivered, coupon.code, coupon.discount
            ),
            None => println!("  {} ({} orders) → no coupon", customer, delivered),
        }
    }

    let ana = CustomerEmail::parse(CUSTOMERS[0].0)?;
    db.orders()
        .insert(&order(&ana, OrderStatus::Cancelled, Money::from_cents(9900)))
        .await?;
    println!("  {} → 1 cancelled order", ana);

    println!();
    println!("Creating manual coupons...");

    let expires_at = Utc::now() + Duration::days(60);
    for (code, discount, owner, min_order, max_uses) in MANUAL_COUPONS {
        let created = engine
            .create_manual_coupon(NewManualCoupon {
                code: Some(code.to_string()),
                discount_percentage: *discount,
                owner_email: owner.map(str::to_string),
                expires_at,
                min_order_value_cents: *min_order,
                max_uses: *max_uses,
                created_by: Some("seed@namidia.dev".to_string()),
            })
            .await;

        match created {
            Ok(coupon) => println!(
                "  {} {} min {} uses {}",
                coupon.code,
                coupon.discount,
                coupon.minimum_order(),
                coupon.usage_limit()
            ),
            Err(e) => eprintln!("Failed to create {}: {}", code, e),
        }
    }

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

fn order(customer: &CustomerEmail, status: OrderStatus, total: Money) -> Order {
    Order {
        id: Uuid::new_v4().to_string(),
        customer_email: customer.clone(),
        status,
        total_cents: total.cents(),
        created_at: Utc::now(),
    }
}
