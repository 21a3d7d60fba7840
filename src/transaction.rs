// 💸 Transaction - The single record kept by the ledger
// Direction lives in TransactionType; amounts are plain non-negative f64

use crate::error::LedgerError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Categories recognised by the aid/dues aggregates (exact, case-sensitive)
pub const SCHOLARSHIP: &str = "scholarship";
pub const LOAN: &str = "loan";
pub const DUES: &str = "dues";

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in
    Credit,
    /// Money going out
    Debit,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Credit => "credit",
            TransactionType::Debit => "debit",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" => Ok(TransactionType::Credit),
            "debit" => Ok(TransactionType::Debit),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

// ============================================================================
// CURRENCY CODES
// ============================================================================

/// Trim and uppercase a currency code, rejecting anything that is not three ASCII letters
pub fn normalize_currency(code: &str) -> Result<String, LedgerError> {
    let trimmed = code.trim();
    if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(trimmed.to_ascii_uppercase())
    } else {
        Err(LedgerError::InvalidCurrency(trimmed.to_string()))
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// Immutable once appended to the ledger
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub description: String,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: String,
    /// Always a normalized three-letter code
    pub currency: String,
}

impl Transaction {
    pub fn new(
        description: impl Into<String>,
        amount: f64,
        kind: TransactionType,
        category: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Transaction {
            description: description.into(),
            amount,
            kind,
            category: category.into(),
            currency: currency.into(),
        }
    }

    pub fn is_debit(&self) -> bool {
        self.kind == TransactionType::Debit
    }

    pub fn in_category(&self, category: &str) -> bool {
        self.category == category
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2} {} ({}) - {}",
            self.description, self.amount, self.currency, self.kind, self.category
        )
    }
}
