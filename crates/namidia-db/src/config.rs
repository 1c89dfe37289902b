//! # Engine Configuration
//!
//! Where the store lives, where the cart snapshot is written, and how noisy
//! the logs are.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     NAMIDIA_DB_PATH=/var/lib/namidia/namidia.db                        │
//! │     NAMIDIA_DB_MAX_CONNECTIONS=8                                       │
//! │     NAMIDIA_CART_PATH=/tmp/cart.json                                   │
//! │     NAMIDIA_LOG=debug                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/namidia/namidia.toml (Linux)                             │
//! │     ~/Library/Application Support/com.namidia.app/namidia.toml (macOS) │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! log_filter = "info,namidia_db=debug"
//!
//! [database]
//! path = "namidia.db"
//! max_connections = 5
//!
//! [cart]
//! storage_path = "cart.json"
//! ```
//!
//! Discount tiers and coupon validity are business rules, not settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::pool::DbConfig;

const CONFIG_FILE_NAME: &str = "namidia.toml";

// =============================================================================
// Sections
// =============================================================================

/// Store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size. Default: 5
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("namidia.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Cart snapshot settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSettings {
    #[serde(default = "default_cart_path")]
    pub storage_path: PathBuf,
}

fn default_cart_path() -> PathBuf {
    PathBuf::from("cart.json")
}

impl Default for CartSettings {
    fn default() -> Self {
        CartSettings {
            storage_path: default_cart_path(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

// =============================================================================
// EngineConfig
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info,sqlx=warn`.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cart: CartSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            log_filter: default_log_filter(),
            database: DatabaseSettings::default(),
            cart: CartSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (namidia.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.cart.storage_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("cart.storage_path must not be empty".into()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("NAMIDIA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("NAMIDIA_DB_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid NAMIDIA_DB_MAX_CONNECTIONS"),
            }
        }

        if let Ok(path) = std::env::var("NAMIDIA_CART_PATH") {
            self.cart.storage_path = PathBuf::from(path);
        }

        if let Ok(filter) = std::env::var("NAMIDIA_LOG") {
            self.log_filter = filter;
        }
    }

    /// `namidia.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "namidia", "app")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Pool settings for [`Database::new`](crate::pool::Database::new).
    pub fn to_db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path).max_connections(self.database.max_connections)
    }
}
