// Pocket Ledger - Core Library
// Transaction store with flat-file persistence and multi-currency conversion

pub mod config;
pub mod error;
pub mod ledger;
pub mod rates;
pub mod store;
pub mod transaction;

// Re-export commonly used types
pub use config::{LedgerConfig, RateServiceConfig};
pub use error::{ConfigError, LedgerError, RateError};
pub use ledger::{
    AidTotals, CategorySpend, Conversion, ConvertedTransaction, Ledger, Totals, DEFAULT_CAPACITY,
};
pub use rates::{parse_rates, ExchangeRateProvider, HttpRateSource, RateSource, RateTable};
pub use store::{load_records, save_records, LoadReport};
pub use transaction::{normalize_currency, Transaction, TransactionType};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
