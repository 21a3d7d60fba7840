use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pocket_ledger::{normalize_currency, Ledger, LedgerConfig, TransactionType};

/// Personal finance ledger with currency conversion
#[derive(Debug, Parser)]
#[command(name = "pocket-ledger", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file layered above the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a transaction
    Add {
        description: String,
        amount: f64,
        /// credit or debit
        #[arg(value_parser = parse_type)]
        kind: TransactionType,
        category: String,
        /// Three-letter code (defaults to the configured currency)
        #[arg(long)]
        currency: Option<String>,
    },
    /// List all transactions
    List,
    /// Credit/debit totals as stored
    Totals,
    /// Category with the most debit spending
    TopCategory,
    /// Scholarship and loan totals
    Aid,
    /// Dues total
    Dues,
    /// Transactions above a limit
    OverLimit { limit: f64 },
    /// Fetch and list exchange rates
    Rates {
        /// Base currency (defaults to the configured base)
        base: Option<String>,
    },
    /// Convert one transaction (1-based index)
    Convert { index: usize, target: String },
    /// Credit/debit totals converted into one currency
    ConvertAll { target: String },
    /// List transactions with amounts in one currency
    ShowIn { target: String },
    /// Use another default currency for this run's totals
    SetCurrency { code: String },
}

fn parse_type(s: &str) -> std::result::Result<TransactionType, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => LedgerConfig::load_from(path),
        None => LedgerConfig::load(),
    }
    .context("Failed to load configuration")?;

    let mut ledger = Ledger::from_config(&config).context("Failed to open ledger")?;
    run(&mut ledger, &config, cli.command)
}

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("POCKET_LEDGER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}

/// Fetch rates relative to the configured base before a conversion
fn ensure_rates(ledger: &mut Ledger, config: &LedgerConfig) -> Result<()> {
    let count = ledger
        .rates_mut()
        .fetch_rates(&config.rates.base_currency)
        .context("Could not fetch exchange rates")?;
    println!(
        "✓ Fetched {} exchange rates (base {})",
        count, config.rates.base_currency
    );
    Ok(())
}

fn run(ledger: &mut Ledger, config: &LedgerConfig, command: Command) -> Result<()> {
    let currency = ledger.default_currency().to_string();

    match command {
        Command::Add {
            description,
            amount,
            kind,
            category,
            currency,
        } => {
            let tx = ledger.add(&description, amount, kind, &category, currency.as_deref())?;
            println!("✅ Added: {}", tx);
        }
        Command::List => {
            if ledger.is_empty() {
                println!("No transactions to display.");
            }
            for (i, tx) in ledger.transactions().iter().enumerate() {
                println!("{:>3}. {}", i + 1, tx);
            }
        }
        Command::Totals => {
            let totals = ledger.totals_by_type();
            println!("💰 Total Credit: {:.2} {}", totals.credit, currency);
            println!("💸 Total Debit:  {:.2} {}", totals.debit, currency);
            println!("⚖️  Net Balance:  {:.2} {}", totals.net(), currency);
        }
        Command::TopCategory => match ledger.most_spent_category() {
            Some(top) => println!(
                "🏷️  Most spent category: {} ({:.2} {})",
                top.category, top.total, currency
            ),
            None => println!("🏷️  Most spent category: none"),
        },
        Command::Aid => {
            let aid = ledger.scholarship_and_loan_totals();
            println!("🎓 Total Scholarships: {:.2} {}", aid.scholarship, currency);
            println!("🏦 Total Loans:        {:.2} {}", aid.loan, currency);
        }
        Command::Dues => {
            println!("📌 Total Dues: {:.2} {}", ledger.dues_total(), currency);
        }
        Command::OverLimit { limit } => {
            let over = ledger.transactions_exceeding_limit(limit);
            if over.is_empty() {
                println!("No transactions exceed the limit of {:.2}", limit);
            }
            for tx in over {
                println!(
                    "⚠️  '{}' exceeds the limit: {:.2} {}",
                    tx.description, tx.amount, tx.currency
                );
            }
        }
        Command::Rates { base } => {
            let base = base.unwrap_or_else(|| config.rates.base_currency.clone());
            ledger
                .rates_mut()
                .fetch_rates(&base)
                .context("Could not fetch exchange rates")?;
            let rates = ledger.rates();
            println!("Available currencies (1 {} =):", rates.base_currency());
            for (code, rate) in rates.list_currencies() {
                println!("  {:<6}: {:.4}", code, rate);
            }
        }
        Command::Convert { index, target } => {
            ensure_rates(ledger, config)?;
            let c = ledger.convert_one(index, &target)?;
            println!("{:.2} {} = {:.2} {}", c.amount, c.from, c.converted, c.to);
        }
        Command::ConvertAll { target } => {
            let target = normalize_currency(&target)?;
            ensure_rates(ledger, config)?;
            let totals = ledger.convert_all_to(&target)?;
            println!("💰 Total Credit: {:.2} {}", totals.credit, target);
            println!("💸 Total Debit:  {:.2} {}", totals.debit, target);
            println!("⚖️  Net Balance:  {:.2} {}", totals.net(), target);
        }
        Command::ShowIn { target } => {
            let target = normalize_currency(&target)?;
            ensure_rates(ledger, config)?;
            for row in ledger.transactions_in_currency(&target)? {
                let tx = row.transaction;
                println!(
                    "{:>3}. {}: {:.2} {} ({}) - {}",
                    row.index, tx.description, row.converted, target, tx.kind, tx.category
                );
            }
        }
        Command::SetCurrency { code } => {
            ledger.set_default_currency(&code)?;
            let totals = ledger.totals_by_type();
            let currency = ledger.default_currency();
            println!("✓ Default currency for this session: {}", currency);
            println!("💰 Total Credit: {:.2} {}", totals.credit, currency);
            println!("💸 Total Debit:  {:.2} {}", totals.debit, currency);
        }
    }

    Ok(())
}
