// ⚠️ Error Taxonomy
// Every failure in the core is recoverable at the operation boundary

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// RATE ERRORS (transport, parse, unsupported currency)
// ============================================================================

#[derive(Debug, Error)]
pub enum RateError {
    /// Connection, timeout or TLS failure talking to the rate service
    #[error("failed to fetch rates for {base}: {message}")]
    Transport { base: String, message: String },

    /// Rate service answered with a non-2xx status
    #[error("rate service returned HTTP {status} for {base}")]
    Status { base: String, status: u16 },

    /// Requested base is not a three-letter code; nothing was fetched
    #[error("invalid base currency '{0}': expected three letters")]
    InvalidBase(String),

    /// Body is not JSON, or has no object-valued `rates` field
    #[error("malformed rate response: {0}")]
    Parse(String),

    /// `rates` was present but no entry survived validation
    #[error("rate response for {0} contained no valid rates")]
    NoValidRates(String),

    /// Currency is not in the current rate table
    #[error("unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

// ============================================================================
// LEDGER ERRORS (validation + persistence)
// ============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger is full: maximum of {0} transactions reached")]
    CapacityExceeded(usize),

    /// Index is 1-based, as shown to the user
    #[error("transaction index {index} is out of range (ledger holds {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid currency code '{0}': expected three letters")]
    InvalidCurrency(String),

    #[error("invalid amount {0}: amounts must be finite and non-negative")]
    InvalidAmount(f64),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error("could not access ledger store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write ledger store {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

// ============================================================================
// CONFIG ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Figment(Box::new(err))
    }
}
