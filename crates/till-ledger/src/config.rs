//! # Ledger Configuration
//!
//! Configuration for the ledger service and the `till` tool.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TILL_DB_PATH=/srv/clinic/till.db                                   │
//! │     TILL_DISCREPANCY_THRESHOLD_CENTS=2000                              │
//! │     TILL_REQUIRE_AUTHORIZER=true                                       │
//! │     TILL_CURRENCY_SYMBOL=S/                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/till/till.toml (Linux)                                   │
//! │     ~/Library/Application Support/com.clinic.till/till.toml (macOS)    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     threshold 10.00, no authorizer required, COP formatting            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # till.toml
//! [database]
//! path = "/srv/clinic/till.db"
//! max_connections = 5
//! busy_timeout_secs = 5
//!
//! [cash]
//! discrepancy_threshold_cents = 1000
//! require_authorizer_above_threshold = false
//! history_limit = 20
//!
//! [currency]
//! code = "COP"
//! symbol = "$"
//! thousands_separator = "."
//! decimal_separator = ","
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use till_core::currency::CurrencyFormat;
use till_core::reconcile::ClosePolicy;
use till_core::{Money, DEFAULT_DISCREPANCY_THRESHOLD_CENTS};
use till_db::DbConfig;

use crate::error::{LedgerError, LedgerResult};

// =============================================================================
// Database Settings
// =============================================================================

/// Where and how the ledger database is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Pool size. Concurrent terminals share one writer lock regardless.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a write waits for another terminal's transaction (seconds).
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("com", "clinic", "till")
        .map(|dirs| dirs.data_dir().join("till.db"))
        .unwrap_or_else(|| PathBuf::from("till.db"))
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout() -> u64 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout(),
        }
    }
}

// =============================================================================
// Cash Settings
// =============================================================================

/// Cash-handling policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashSettings {
    /// A closing difference above this (absolute, in cents) is material.
    #[serde(default = "default_threshold")]
    pub discrepancy_threshold_cents: i64,

    /// Material differences also need an authorizing user.
    #[serde(default)]
    pub require_authorizer_above_threshold: bool,

    /// Sessions returned by history queries when no limit is given.
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
}

fn default_threshold() -> i64 {
    DEFAULT_DISCREPANCY_THRESHOLD_CENTS
}

fn default_history_limit() -> i64 {
    20
}

impl Default for CashSettings {
    fn default() -> Self {
        CashSettings {
            discrepancy_threshold_cents: default_threshold(),
            require_authorizer_above_threshold: false,
            history_limit: default_history_limit(),
        }
    }
}

impl CashSettings {
    pub fn threshold(&self) -> Money {
        Money::from_cents(self.discrepancy_threshold_cents)
    }

    pub fn close_policy(&self) -> ClosePolicy {
        ClosePolicy {
            threshold: self.threshold(),
            require_authorizer: self.require_authorizer_above_threshold,
        }
    }
}

// =============================================================================
// Main Ledger Configuration
// =============================================================================

/// Complete ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cash: CashSettings,

    /// Display formatting for amounts.
    #[serde(default)]
    pub currency: CurrencyFormat,
}

impl LedgerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (till.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> LedgerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading ledger config from file");
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
            warn!("Failed to load ledger config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> LedgerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| LedgerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Ledger config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(LedgerError::InvalidConfig(
                "database.path must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(LedgerError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.cash.discrepancy_threshold_cents < 0 {
            return Err(LedgerError::InvalidConfig(
                "cash.discrepancy_threshold_cents must not be negative".into(),
            ));
        }

        if self.cash.history_limit <= 0 {
            return Err(LedgerError::InvalidConfig(
                "cash.history_limit must be greater than 0".into(),
            ));
        }

        if self.currency.decimals > 2 {
            return Err(LedgerError::InvalidConfig(
                "currency.decimals must be 0, 1 or 2".into(),
            ));
        }

        if self.currency.thousands_separator == self.currency.decimal_separator {
            return Err(LedgerError::InvalidConfig(
                "currency separators must differ".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup (environment in production).
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TILL_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(threshold) = lookup("TILL_DISCREPANCY_THRESHOLD_CENTS") {
            match threshold.parse::<i64>() {
                Ok(cents) => self.cash.discrepancy_threshold_cents = cents,
                Err(_) => warn!(value = %threshold, "Ignoring non-numeric discrepancy threshold"),
            }
        }

        if let Some(flag) = lookup("TILL_REQUIRE_AUTHORIZER") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.cash.require_authorizer_above_threshold = true,
                "0" | "false" | "no" => self.cash.require_authorizer_above_threshold = false,
                _ => warn!(value = %flag, "Unknown TILL_REQUIRE_AUTHORIZER value"),
            }
        }

        if let Some(symbol) = lookup("TILL_CURRENCY_SYMBOL") {
            self.currency.symbol = symbol;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "clinic", "till")
            .map(|dirs| dirs.config_dir().join("till.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Connection settings for [`till_db::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        let path = self.database.path.clone();
        let base = if path.as_os_str() == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(path).max_connections(self.database.max_connections)
        };
        base.busy_timeout(Duration::from_secs(self.database.busy_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert_eq!(config.cash.discrepancy_threshold_cents, 1_000);
        assert!(!config.cash.require_authorizer_above_threshold);
        assert_eq!(config.cash.history_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: LedgerConfig = toml::from_str(
            r#"
            [cash]
            discrepancy_threshold_cents = 2500
            "#,
        )
        .unwrap();
        assert_eq!(config.cash.threshold().cents(), 2_500);
        assert_eq!(config.cash.history_limit, 20);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.currency.code, "COP");
    }

    #[test]
    fn test_config_validation() {
        let mut config = LedgerConfig::default();
        config.cash.discrepancy_threshold_cents = -1;
        assert!(config.validate().is_err());

        config.cash.discrepancy_threshold_cents = 0;
        config.cash.history_limit = 0;
        assert!(config.validate().is_err());

        config.cash.history_limit = 5;
        config.currency.thousands_separator = ',';
        config.currency.decimal_separator = ',';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TILL_DB_PATH", "/tmp/clinic.db"),
            ("TILL_DISCREPANCY_THRESHOLD_CENTS", "500"),
            ("TILL_REQUIRE_AUTHORIZER", "yes"),
            ("TILL_CURRENCY_SYMBOL", "S/"),
        ]
        .into_iter()
        .collect();

        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(config.cash.discrepancy_threshold_cents, 500);
        assert!(config.cash.require_authorizer_above_threshold);
        assert_eq!(config.currency.symbol, "S/");

        let policy = config.cash.close_policy();
        assert_eq!(policy.threshold.cents(), 500);
        assert!(policy.require_authorizer);
    }

    #[test]
    fn test_bad_override_ignored() {
        let mut config = LedgerConfig::default();
        config.apply_overrides(|key| {
            (key == "TILL_DISCREPANCY_THRESHOLD_CENTS").then(|| "ten".to_string())
        });
        assert_eq!(config.cash.discrepancy_threshold_cents, 1_000);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("till.toml");

        let mut config = LedgerConfig::default();
        config.cash.history_limit = 7;
        config.database.path = dir.path().join("till.db");
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[cash]"));

        let loaded: LedgerConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.cash.history_limit, 7);
        assert_eq!(loaded.database.path, config.database.path);
    }

    #[test]
    fn test_db_config() {
        let mut config = LedgerConfig::default();
        config.database.path = PathBuf::from(":memory:");
        assert!(config.db_config().is_in_memory());

        config.database.path = PathBuf::from("/tmp/till.db");
        config.database.busy_timeout_secs = 9;
        let db = config.db_config();
        assert!(!db.is_in_memory());
        assert_eq!(db.busy_timeout, Duration::from_secs(9));
    }
}
