// 💱 Exchange Rates - Latest snapshot from a remote JSON feed
//
// A RateTable says "1 unit of base = rate units of code". Cross pairs are
// converted in two hops through the base currency:
//
//   amount / rate(from) * rate(to)
//
// Only the latest successful fetch is kept. A failed fetch never touches
// the current table or its base currency.

use crate::config::RateServiceConfig;
use crate::error::RateError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================================================
// RATE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    base: String,
    /// BTreeMap keeps listing order deterministic
    rates: BTreeMap<String, f64>,
    fetched_at: Option<DateTime<Utc>>,
}

impl RateTable {
    /// Empty table relative to `base`
    pub fn empty(base: impl Into<String>) -> Self {
        RateTable {
            base: base.into(),
            rates: BTreeMap::new(),
            fetched_at: None,
        }
    }

    /// Set the base currency (builder style, used with `collect`)
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn get(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rates.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    /// Entries in code order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }

    fn rate_or_unsupported(&self, code: &str) -> Result<f64, RateError> {
        self.get(code)
            .ok_or_else(|| RateError::UnsupportedCurrency(code.to_string()))
    }

    /// Convert `amount` from one currency to another, routing through the base
    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, RateError> {
        if from == to {
            return Ok(amount);
        }

        if from == self.base {
            Ok(amount * self.rate_or_unsupported(to)?)
        } else if to == self.base {
            Ok(amount / self.rate_or_unsupported(from)?)
        } else {
            let from_rate = self.rate_or_unsupported(from)?;
            let to_rate = self.rate_or_unsupported(to)?;
            Ok(amount / from_rate * to_rate)
        }
    }
}

/// Build a table from explicit entries (invalid ones are dropped)
impl<S: Into<String>> FromIterator<(S, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut table = RateTable::empty(String::new());
        for (code, rate) in iter {
            let code = code.into();
            if let (Some(code), Some(rate)) = (valid_code(&code), valid_rate(rate)) {
                table.rates.insert(code, rate);
            }
        }
        table
    }
}

// ============================================================================
// PARSING
// ============================================================================

fn valid_code(key: &str) -> Option<String> {
    if key.len() == 3 && key.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(key.to_ascii_uppercase())
    } else {
        None
    }
}

fn valid_rate(rate: f64) -> Option<f64> {
    if rate.is_finite() && rate > 0.0 {
        Some(rate)
    } else {
        None
    }
}

/// Numbers, or strings that parse as numbers
fn rate_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .and_then(valid_rate)
}

/// Project the body's `rates` object into a code -> rate map
///
/// Malformed entries are dropped silently; an empty result is returned as-is
/// so the caller decides what "no valid rates" means.
pub fn parse_rates(body: &str) -> Result<BTreeMap<String, f64>, RateError> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| RateError::Parse(format!("invalid JSON: {}", e)))?;

    let rates = root
        .get("rates")
        .ok_or_else(|| RateError::Parse("missing 'rates' field".to_string()))?
        .as_object()
        .ok_or_else(|| RateError::Parse("'rates' is not an object".to_string()))?;

    let mut parsed = BTreeMap::new();
    for (key, value) in rates {
        match (valid_code(key), rate_value(value)) {
            (Some(code), Some(rate)) => {
                parsed.insert(code, rate);
            }
            _ => debug!(key = %key, value = %value, "discarding malformed rate entry"),
        }
    }

    Ok(parsed)
}

// ============================================================================
// RATE SOURCES
// ============================================================================

/// Where raw rate documents come from
///
/// The provider only needs the response body for a base currency; the
/// HTTP details stay behind this trait so tests can feed canned bodies.
pub trait RateSource {
    fn fetch(&self, base: &str) -> Result<String, RateError>;
}

/// Blocking HTTP source: GET `<base_url>/<BASE>`
pub struct HttpRateSource {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpRateSource {
    /// Client with bounded timeout, limited redirects and TLS verification on
    pub fn new(config: &RateServiceConfig) -> Result<Self, RateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| RateError::Transport {
                base: config.base_currency.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(HttpRateSource {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, base: &str) -> String {
        format!("{}/{}", self.base_url, base)
    }
}

impl RateSource for HttpRateSource {
    fn fetch(&self, base: &str) -> Result<String, RateError> {
        let url = self.url_for(base);
        debug!(%url, "fetching exchange rates");

        let transport = |e: reqwest::Error| RateError::Transport {
            base: base.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(&url).send().map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RateError::Status {
                base: base.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(transport)
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

/// Holds the current RateTable and answers rate/conversion queries
pub struct ExchangeRateProvider<S = HttpRateSource> {
    source: S,
    table: RateTable,
}

impl ExchangeRateProvider<HttpRateSource> {
    /// HTTP-backed provider with an empty table relative to the configured base
    pub fn from_config(config: &RateServiceConfig) -> Result<Self, RateError> {
        Ok(ExchangeRateProvider::new(
            HttpRateSource::new(config)?,
            config.base_currency.clone(),
        ))
    }
}

impl<S: RateSource> ExchangeRateProvider<S> {
    pub fn new(source: S, base: impl Into<String>) -> Self {
        ExchangeRateProvider {
            source,
            table: RateTable::empty(base),
        }
    }

    /// Fetch and install a fresh table relative to `base`
    ///
    /// Returns the number of rates loaded. On any error the previous table
    /// and base currency are left exactly as they were. A base that is not
    /// three letters is rejected before the source is asked.
    pub fn fetch_rates(&mut self, base: &str) -> Result<usize, RateError> {
        let base = valid_code(base.trim())
            .ok_or_else(|| RateError::InvalidBase(base.trim().to_string()))?;

        let result = self
            .source
            .fetch(&base)
            .and_then(|body| parse_rates(&body));

        let rates = match result {
            Ok(rates) if rates.is_empty() => {
                warn!(%base, "rate response contained no valid rates; keeping previous table");
                return Err(RateError::NoValidRates(base));
            }
            Ok(rates) => rates,
            Err(e) => {
                warn!(%base, error = %e, "rate fetch failed; keeping previous table");
                return Err(e);
            }
        };

        let count = rates.len();
        self.table = RateTable {
            base: base.clone(),
            rates,
            fetched_at: Some(Utc::now()),
        };
        info!(%base, count, "exchange rates updated");
        Ok(count)
    }

    pub fn base_currency(&self) -> &str {
        self.table.base()
    }

    pub fn table(&self) -> &RateTable {
        &self.table
    }

    /// Rate of `code` relative to the current base, if known
    pub fn get_rate(&self, code: &str) -> Option<f64> {
        self.table.get(code)
    }

    pub fn convert(&self, amount: f64, from: &str, to: &str) -> Result<f64, RateError> {
        self.table.convert(amount, from, to)
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.table.contains(code)
    }

    /// Current entries, sorted by code
    pub fn list_currencies(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.table.iter()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Canned responses keyed by base currency; unknown bases fail as transport errors
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub bodies: HashMap<String, Result<String, u16>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl StubSource {
        pub fn with_body(mut self, base: &str, body: &str) -> Self {
            self.bodies.insert(base.to_string(), Ok(body.to_string()));
            self
        }

        pub fn with_status(mut self, base: &str, status: u16) -> Self {
            self.bodies.insert(base.to_string(), Err(status));
            self
        }
    }

    impl RateSource for StubSource {
        fn fetch(&self, base: &str) -> Result<String, RateError> {
            self.calls.borrow_mut().push(base.to_string());
            match self.bodies.get(base) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(RateError::Status {
                    base: base.to_string(),
                    status: *status,
                }),
                None => Err(RateError::Transport {
                    base: base.to_string(),
                    message: "connection refused".to_string(),
                }),
            }
        }
    }

    pub(crate) const USD_BODY: &str = r#"{
        "base": "USD",
        "date": "2024-05-01",
        "rates": { "USD": 1, "EUR": 0.8, "INR": 80.0, "GBP": 0.5 }
    }"#;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn loaded_provider() -> ExchangeRateProvider<StubSource> {
        let mut provider =
            ExchangeRateProvider::new(StubSource::default().with_body("USD", USD_BODY), "INR");
        provider.fetch_rates("USD").unwrap();
        provider
    }

    #[test]
    fn test_parse_rates_skips_malformed_entries() {
        let body = r#"{"rates": {
            "EUR": 0.9,
            "JPY": "151.5",
            "EURO": 1.0,
            "XAU": -3,
            "ZZZ": 0,
            "BAD": "abc",
            "NUL": null,
            "usd": 1
        }}"#;

        let rates = parse_rates(body).unwrap();

        assert_eq!(rates.len(), 3);
        assert_eq!(rates.get("EUR"), Some(&0.9));
        assert_eq!(rates.get("JPY"), Some(&151.5));
        assert_eq!(rates.get("USD"), Some(&1.0));
    }

    #[test]
    fn test_parse_rates_rejects_bad_documents() {
        assert!(matches!(parse_rates("not json"), Err(RateError::Parse(_))));
        assert!(matches!(parse_rates(r#"{"base": "USD"}"#), Err(RateError::Parse(_))));
        assert!(matches!(parse_rates(r#"{"rates": [1, 2]}"#), Err(RateError::Parse(_))));
    }

    #[test]
    fn test_fetch_installs_table_and_base() {
        let provider = loaded_provider();

        assert_eq!(provider.base_currency(), "USD");
        assert_eq!(provider.table().len(), 4);
        assert!(provider.table().fetched_at().is_some());
        assert_eq!(provider.get_rate("INR"), Some(80.0));
        assert_eq!(provider.get_rate("XYZ"), None);
        assert!(provider.is_supported("EUR"));
        assert!(!provider.is_supported("JPY"));
        assert_eq!(*provider.source.calls.borrow(), vec!["USD".to_string()]);
    }

    #[test]
    fn test_fetch_normalizes_requested_base() {
        let mut provider =
            ExchangeRateProvider::new(StubSource::default().with_body("USD", USD_BODY), "INR");
        assert_eq!(provider.fetch_rates(" usd ").unwrap(), 4);
        assert_eq!(provider.base_currency(), "USD");
    }

    #[test]
    fn test_invalid_base_is_rejected_before_fetching() {
        let mut provider = ExchangeRateProvider::new(
            StubSource::default()
                .with_body("USD", USD_BODY)
                .with_body("US", USD_BODY),
            "INR",
        );
        provider.fetch_rates("USD").unwrap();
        let before = provider.table().clone();
        provider.source.calls.borrow_mut().clear();

        for base in ["us", "USDX", "U5D", "  "] {
            assert!(matches!(
                provider.fetch_rates(base),
                Err(RateError::InvalidBase(ref b)) if b == base.trim()
            ));
        }

        assert!(provider.source.calls.borrow().is_empty());
        assert_eq!(provider.table(), &before);
        assert_eq!(provider.base_currency(), "USD");
    }

    #[test]
    fn test_failed_fetch_keeps_previous_state() {
        let mut provider = ExchangeRateProvider::new(
            StubSource::default()
                .with_body("USD", USD_BODY)
                .with_status("EUR", 503)
                .with_body("GBP", r#"{"result": "error"}"#)
                .with_body("JPY", r#"{"rates": {"EURO": 1, "ABC": -1}}"#),
            "INR",
        );
        provider.fetch_rates("USD").unwrap();
        let before = provider.table().clone();

        assert!(matches!(
            provider.fetch_rates("EUR"),
            Err(RateError::Status { status: 503, .. })
        ));
        assert!(matches!(provider.fetch_rates("GBP"), Err(RateError::Parse(_))));
        assert!(matches!(
            provider.fetch_rates("JPY"),
            Err(RateError::NoValidRates(ref b)) if b == "JPY"
        ));
        assert!(matches!(
            provider.fetch_rates("CHF"),
            Err(RateError::Transport { .. })
        ));

        assert_eq!(provider.table(), &before);
        assert_eq!(provider.base_currency(), "USD");
    }

    #[test]
    fn test_convert_from_and_to_base() {
        let provider = loaded_provider();

        assert_close(provider.convert(10.0, "USD", "INR").unwrap(), 800.0);
        assert_close(provider.convert(800.0, "INR", "USD").unwrap(), 10.0);
        assert_close(provider.convert(2.5, "USD", "EUR").unwrap(), 2.5 * 0.8);
        assert_close(provider.convert(2.5, "EUR", "USD").unwrap(), 2.5 / 0.8);
    }

    #[test]
    fn test_convert_cross_pair_goes_through_base() {
        let provider = loaded_provider();

        let direct = provider.convert(40.0, "EUR", "INR").unwrap();
        let via_base =
            provider.convert(40.0, "EUR", "USD").unwrap() * provider.get_rate("INR").unwrap();

        assert_close(direct, 40.0 / 0.8 * 80.0);
        assert_close(direct, via_base);
        assert_close(provider.convert(10.0, "GBP", "EUR").unwrap(), 16.0);
    }

    #[test]
    fn test_convert_identity_needs_no_rates() {
        let provider = ExchangeRateProvider::new(StubSource::default(), "INR");

        assert_eq!(provider.convert(12.34, "XYZ", "XYZ").unwrap(), 12.34);
        assert_eq!(provider.convert(0.0, "INR", "INR").unwrap(), 0.0);
    }

    #[test]
    fn test_unsupported_currency_is_distinct_from_zero() {
        let provider = loaded_provider();

        let zero = provider.convert(0.0, "USD", "EUR").unwrap();
        assert_eq!(zero, 0.0);

        assert!(matches!(
            provider.convert(10.0, "USD", "XYZ"),
            Err(RateError::UnsupportedCurrency(ref c)) if c == "XYZ"
        ));
        assert!(matches!(
            provider.convert(10.0, "XYZ", "USD"),
            Err(RateError::UnsupportedCurrency(ref c)) if c == "XYZ"
        ));
        assert!(matches!(
            provider.convert(10.0, "EUR", "JPY"),
            Err(RateError::UnsupportedCurrency(ref c)) if c == "JPY"
        ));
    }

    #[test]
    fn test_empty_table_rejects_conversions() {
        let provider = ExchangeRateProvider::new(StubSource::default(), "INR");

        assert!(provider.table().is_empty());
        assert!(provider.convert(1.0, "INR", "USD").is_err());
        assert_eq!(provider.list_currencies().count(), 0);
    }

    #[test]
    fn test_list_currencies_is_sorted() {
        let provider = loaded_provider();
        let codes: Vec<&str> = provider.list_currencies().map(|(code, _)| code).collect();

        assert_eq!(codes, vec!["EUR", "GBP", "INR", "USD"]);
    }

    #[test]
    fn test_table_from_entries() {
        let table: RateTable = vec![("eur", 0.9), ("JPY", -1.0), ("TOOLONG", 2.0)]
            .into_iter()
            .collect::<RateTable>()
            .with_base("USD");

        assert_eq!(table.base(), "USD");
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("EUR"), Some(0.9));
    }

    #[test]
    fn test_http_source_url() {
        let config = RateServiceConfig {
            base_url: "https://rates.example.com/v4/latest/".to_string(),
            ..RateServiceConfig::default()
        };
        let source = HttpRateSource::new(&config).unwrap();

        assert_eq!(source.url_for("EUR"), "https://rates.example.com/v4/latest/EUR");
    }
}
