// 🗄️ Ledger Store - Flat file persistence
// One record per line: description,amount,type,category[,currency]
//
// The trailing currency field is optional. Records written before multi-currency
// support have four fields and take the ledger's default currency on load.

use crate::error::LedgerError;
use crate::transaction::{normalize_currency, Transaction, TransactionType};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::path::Path;
use tracing::{debug, warn};

const LEGACY_FIELDS: usize = 4;
const CURRENT_FIELDS: usize = 5;

// ============================================================================
// LOAD
// ============================================================================

/// Outcome of reading the store
#[derive(Debug, Default)]
pub struct LoadReport {
    pub transactions: Vec<Transaction>,
    /// Lines that could not be parsed
    pub skipped: usize,
    /// True when valid records remained after the cap was reached
    pub truncated: bool,
}

/// Read at most `max` transactions from `path`, in file order
///
/// A missing file is an empty ledger. Malformed lines are skipped and counted.
pub fn load_records(
    path: &Path,
    default_currency: &str,
    max: usize,
) -> Result<LoadReport, LedgerError> {
    let mut report = LoadReport::default();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no ledger store yet, starting empty");
            return Ok(report);
        }
        Err(source) => {
            return Err(LedgerError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);

    for (line, result) in rdr.records().enumerate() {
        let parsed = result
            .map_err(|e| e.to_string())
            .and_then(|record| parse_record(&record, default_currency));

        match parsed {
            Ok(tx) => {
                if report.transactions.len() >= max {
                    report.truncated = true;
                    break;
                }
                report.transactions.push(tx);
            }
            Err(reason) => {
                warn!(line = line + 1, %reason, "skipping malformed ledger record");
                report.skipped += 1;
            }
        }
    }

    if report.truncated {
        warn!(max, "ledger store holds more records than the cap; extra records ignored");
    }

    Ok(report)
}

/// Parse one stored record, substituting `default_currency` for legacy records
fn parse_record(record: &StringRecord, default_currency: &str) -> Result<Transaction, String> {
    if record.len() < LEGACY_FIELDS || record.len() > CURRENT_FIELDS {
        return Err(format!(
            "expected {} or {} fields, found {}",
            LEGACY_FIELDS,
            CURRENT_FIELDS,
            record.len()
        ));
    }

    let amount: f64 = record[1]
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount '{}'", &record[1]))?;
    if !amount.is_finite() {
        return Err(format!("non-finite amount '{}'", &record[1]));
    }

    let kind: TransactionType = record[2].parse()?;

    let currency = match record.get(4).map(str::trim) {
        Some(code) if !code.is_empty() => normalize_currency(code).map_err(|e| e.to_string())?,
        _ => default_currency.to_string(),
    };

    Ok(Transaction::new(
        &record[0],
        amount,
        kind,
        &record[3],
        currency,
    ))
}

// ============================================================================
// SAVE
// ============================================================================

/// Rewrite the whole store from `transactions`
///
/// Not an append: anything edited in the file since load is overwritten.
pub fn save_records(path: &Path, transactions: &[Transaction]) -> Result<(), LedgerError> {
    let csv_err = |source: csv::Error| LedgerError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(csv_err)?;

    for tx in transactions {
        let amount = format!("{:.2}", tx.amount);
        wtr.write_record([
            tx.description.as_str(),
            amount.as_str(),
            tx.kind.as_str(),
            tx.category.as_str(),
            tx.currency.as_str(),
        ])
        .map_err(csv_err)?;
    }

    wtr.flush().map_err(|source| LedgerError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), count = transactions.len(), "ledger store saved");
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
