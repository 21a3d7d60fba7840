// ⚙️ Configuration - Layered settings for the ledger and rate feed
//
// Sources (highest priority wins):
// 1. Environment variables (`POCKET_LEDGER_*`, `__` separates sections)
// 2. `./pocket-ledger.toml` (project-local)
// 3. `<config dir>/pocket-ledger/config.toml` (user-global)
// 4. Built-in defaults
//
// Example: `POCKET_LEDGER_RATES__TIMEOUT_SECS=5` -> `rates.timeout_secs`

use crate::error::ConfigError;
use crate::transaction::normalize_currency;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "POCKET_LEDGER_";
pub const LOCAL_CONFIG_FILE: &str = "pocket-ledger.toml";

// ============================================================================
// RATE SERVICE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateServiceConfig {
    /// Endpoint prefix; the base currency code is appended as a path segment
    pub base_url: String,

    /// Base of the initial (empty) table and of fetches that name none
    pub base_currency: String,

    pub timeout_secs: u64,

    pub max_redirects: usize,
}

impl Default for RateServiceConfig {
    fn default() -> Self {
        RateServiceConfig {
            base_url: "https://api.exchangerate-api.com/v4/latest".to_string(),
            base_currency: "INR".to_string(),
            timeout_secs: 10,
            max_redirects: 10,
        }
    }
}

// ============================================================================
// LEDGER CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LedgerConfig {
    /// Flat file holding one transaction per line
    pub data_file: PathBuf,

    /// Currency for new transactions that name none, and for nominal totals
    pub default_currency: String,

    pub max_transactions: usize,

    #[serde(default)]
    pub rates: RateServiceConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            data_file: PathBuf::from("transactions.txt"),
            default_currency: "INR".to_string(),
            max_transactions: 100,
            rates: RateServiceConfig::default(),
        }
    }
}

impl LedgerConfig {
    /// Load from every source and validate
    pub fn load() -> Result<Self, ConfigError> {
        let config: LedgerConfig = Self::figment().extract()?;
        config.validate()
    }

    /// Load with an explicit TOML file layered above the default locations
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: LedgerConfig = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()
    }

    /// Provider chain, exposed so callers can layer more providers on top
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("pocket-ledger").join("config.toml"))
    }

    /// Normalize currency codes and reject values the ledger cannot run with
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.default_currency = currency_field("default_currency", &self.default_currency)?;
        self.rates.base_currency = currency_field("rates.base_currency", &self.rates.base_currency)?;

        if self.max_transactions == 0 {
            return Err(invalid("max_transactions", "must be at least 1"));
        }
        if self.rates.timeout_secs == 0 {
            return Err(invalid("rates.timeout_secs", "must be at least 1 second"));
        }
        if self.rates.base_url.trim().is_empty() {
            return Err(invalid("rates.base_url", "must not be empty"));
        }

        Ok(self)
    }
}

fn currency_field(field: &str, value: &str) -> Result<String, ConfigError> {
    normalize_currency(value).map_err(|e| invalid(field, &e.to_string()))
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
