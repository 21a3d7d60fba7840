// 📒 Ledger - Ordered transaction store with aggregates and conversions
//
// Every mutation is persisted immediately (full rewrite of the store), so
// there is no dirty/clean state. Nominal aggregates sum amounts as stored;
// the `convert_*` family routes every amount through the rate provider and
// is the currency-correct counterpart.

use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::rates::{ExchangeRateProvider, HttpRateSource, RateSource};
use crate::store::{load_records, save_records};
use crate::transaction::{normalize_currency, Transaction, TransactionType, DUES, LOAN, SCHOLARSHIP};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CAPACITY: usize = 100;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Credit and debit sums in one currency
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Totals {
    pub credit: f64,
    pub debit: f64,
}

impl Totals {
    pub fn net(&self) -> f64 {
        self.credit - self.debit
    }

    fn add(&mut self, kind: TransactionType, amount: f64) {
        match kind {
            TransactionType::Credit => self.credit += amount,
            TransactionType::Debit => self.debit += amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct AidTotals {
    pub scholarship: f64,
    pub loan: f64,
}

/// A single display-only conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub converted: f64,
    pub to: String,
}

/// A transaction paired with its amount in another currency
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTransaction<'a> {
    /// 1-based position in the ledger
    pub index: usize,
    pub transaction: &'a Transaction,
    pub converted: f64,
}

// ============================================================================
// LEDGER
// ============================================================================

pub struct Ledger<S = HttpRateSource> {
    path: PathBuf,
    transactions: Vec<Transaction>,
    default_currency: String,
    capacity: usize,
    rates: ExchangeRateProvider<S>,
}

impl Ledger<HttpRateSource> {
    /// Build the HTTP rate provider from config and open the configured store
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let rates = ExchangeRateProvider::from_config(&config.rates)?;
        Ok(Ledger::open(
            &config.data_file,
            &config.default_currency,
            config.max_transactions,
            rates,
        ))
    }
}

impl<S: RateSource> Ledger<S> {
    /// Open the store at `path` and load it
    ///
    /// An unreadable store is logged and the ledger starts empty.
    pub fn open(
        path: impl AsRef<Path>,
        default_currency: &str,
        capacity: usize,
        rates: ExchangeRateProvider<S>,
    ) -> Self {
        let mut ledger = Ledger {
            path: path.as_ref().to_path_buf(),
            transactions: Vec::new(),
            default_currency: default_currency.to_string(),
            capacity,
            rates,
        };

        if let Err(e) = ledger.load() {
            warn!(error = %e, "could not load ledger store; starting empty");
        }
        ledger
    }

    /// Replace the in-memory sequence with the store's contents
    pub fn load(&mut self) -> Result<usize, LedgerError> {
        let report = load_records(&self.path, &self.default_currency, self.capacity)?;
        self.transactions = report.transactions;
        info!(
            count = self.transactions.len(),
            skipped = report.skipped,
            truncated = report.truncated,
            "ledger loaded"
        );
        Ok(self.transactions.len())
    }

    /// Rewrite the store from the in-memory sequence
    pub fn save(&self) -> Result<(), LedgerError> {
        save_records(&self.path, &self.transactions)
    }

    /// Append a transaction and persist
    ///
    /// `currency` falls back to the default currency. Codes missing from the
    /// current rate table are accepted with a warning. The amount is rounded
    /// to cents, matching what the store keeps. A failed save is logged; the
    /// transaction stays in memory.
    pub fn add(
        &mut self,
        description: &str,
        amount: f64,
        kind: TransactionType,
        category: &str,
        currency: Option<&str>,
    ) -> Result<&Transaction, LedgerError> {
        if self.transactions.len() >= self.capacity {
            return Err(LedgerError::CapacityExceeded(self.capacity));
        }
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let amount = round_to_cents(amount);

        let currency = match currency.map(str::trim).filter(|c| !c.is_empty()) {
            Some(code) => {
                let code = normalize_currency(code)?;
                if !self.rates.is_supported(&code) && code != self.rates.base_currency() {
                    warn!(currency = %code, "currency not in current rate table; using anyway");
                }
                code
            }
            None => self.default_currency.clone(),
        };

        self.transactions.push(Transaction::new(
            description,
            amount,
            kind,
            category,
            currency,
        ));

        if let Err(e) = self.save() {
            warn!(error = %e, "transaction added but ledger store was not saved");
        }

        let index = self.transactions.len() - 1;
        debug!(index = index + 1, "transaction added");
        Ok(&self.transactions[index])
    }

    // ========================================================================
    // NOMINAL AGGREGATES (amounts summed as stored)
    // ========================================================================

    pub fn totals_by_type(&self) -> Totals {
        let mut totals = Totals::default();
        for tx in &self.transactions {
            totals.add(tx.kind, tx.amount);
        }
        totals
    }

    /// Category with the largest debit sum; ties go to the category seen first
    pub fn most_spent_category(&self) -> Option<CategorySpend> {
        // Insertion-ordered grouping so tie-breaks follow first occurrence
        let mut sums: Vec<(&str, f64)> = Vec::new();
        for tx in self.transactions.iter().filter(|tx| tx.is_debit()) {
            match sums.iter().position(|(cat, _)| *cat == tx.category) {
                Some(i) => sums[i].1 += tx.amount,
                None => sums.push((tx.category.as_str(), tx.amount)),
            }
        }

        let mut best: Option<(&str, f64)> = None;
        for (category, total) in sums {
            if best.map_or(true, |(_, max)| total > max) {
                best = Some((category, total));
            }
        }

        best.map(|(category, total)| CategorySpend {
            category: category.to_string(),
            total,
        })
    }

    /// Sum of amounts whose category matches exactly (case-sensitive)
    pub fn category_total(&self, category: &str) -> f64 {
        self.transactions
            .iter()
            .filter(|tx| tx.in_category(category))
            .map(|tx| tx.amount)
            .sum()
    }

    pub fn scholarship_and_loan_totals(&self) -> AidTotals {
        AidTotals {
            scholarship: self.category_total(SCHOLARSHIP),
            loan: self.category_total(LOAN),
        }
    }

    pub fn dues_total(&self) -> f64 {
        self.category_total(DUES)
    }

    /// Transactions with `amount > limit`, in ledger order
    pub fn transactions_exceeding_limit(&self, limit: f64) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|tx| tx.amount > limit)
            .collect()
    }

    // ========================================================================
    // CONVERSIONS (display-only, nothing stored changes)
    // ========================================================================

    /// Convert the transaction at 1-based `index` into `target`
    pub fn convert_one(&self, index: usize, target: &str) -> Result<Conversion, LedgerError> {
        let tx = self.get(index)?;
        let to = normalize_currency(target)?;
        let converted = self.rates.convert(tx.amount, &tx.currency, &to)?;

        Ok(Conversion {
            amount: tx.amount,
            from: tx.currency.clone(),
            converted,
            to,
        })
    }

    /// Credit/debit totals with every amount converted into `target`
    ///
    /// Fails on the first transaction whose currency cannot be converted.
    pub fn convert_all_to(&self, target: &str) -> Result<Totals, LedgerError> {
        let to = normalize_currency(target)?;
        let mut totals = Totals::default();
        for tx in &self.transactions {
            totals.add(tx.kind, self.rates.convert(tx.amount, &tx.currency, &to)?);
        }
        Ok(totals)
    }

    /// Every transaction alongside its amount in `target`
    pub fn transactions_in_currency(
        &self,
        target: &str,
    ) -> Result<Vec<ConvertedTransaction<'_>>, LedgerError> {
        let to = normalize_currency(target)?;
        self.transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                Ok(ConvertedTransaction {
                    index: i + 1,
                    transaction: tx,
                    converted: self.rates.convert(tx.amount, &tx.currency, &to)?,
                })
            })
            .collect()
    }

    // ========================================================================
    // SETTINGS & ACCESSORS
    // ========================================================================

    /// Change the default for new transactions and nominal totals
    ///
    /// Existing transactions keep their stored currency.
    pub fn set_default_currency(&mut self, code: &str) -> Result<(), LedgerError> {
        self.default_currency = normalize_currency(code)?;
        Ok(())
    }

    pub fn default_currency(&self) -> &str {
        &self.default_currency
    }

    /// Transaction at 1-based `index`
    pub fn get(&self, index: usize) -> Result<&Transaction, LedgerError> {
        index
            .checked_sub(1)
            .and_then(|i| self.transactions.get(i))
            .ok_or(LedgerError::IndexOutOfRange {
                index,
                len: self.transactions.len(),
            })
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rates(&self) -> &ExchangeRateProvider<S> {
        &self.rates
    }

    pub fn rates_mut(&mut self) -> &mut ExchangeRateProvider<S> {
        &mut self.rates
    }
}

/// The store writes two decimals, so memory keeps the same value
fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

// ============================================================================
// TESTS
// ============================================================================
