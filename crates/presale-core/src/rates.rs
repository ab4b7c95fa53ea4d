//! Exchange rates for one valuation.
//!
//! A [`RateProvider`] is built per valuation call around a shared
//! [`RateSource`]. The first lookup fetches the whole table; every later
//! lookup in the same call reads the cached copy, so conversions inside one
//! valuation never see two different tables.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::{Principal, Ticker, ValidationError, ValuationError};

/// Uppercase currency code to rate, as published by the reference service.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExchangeRateTable {
    rates: BTreeMap<Ticker, f64>,
}

impl ExchangeRateTable {
    /// Build a table from `(code, rate)` pairs.
    ///
    /// Entries with an unusable code or a rate that is not finite and positive
    /// are skipped, so looking them up later is `UnknownCurrency`. A code that
    /// appears twice fails the whole table.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut rates = BTreeMap::new();
        for (raw, rate) in entries {
            let raw = raw.as_ref();
            let code = match Ticker::parse(raw) {
                Ok(code) => code,
                Err(error) => {
                    warn!(currency = raw, %error, "skipping rate with unusable code");
                    continue;
                }
            };
            if !rate.is_finite() || rate <= 0.0 {
                warn!(currency = %code, rate, "skipping non-positive rate");
                continue;
            }
            if rates.insert(code.clone(), rate).is_some() {
                return Err(ValidationError::DuplicateCurrency {
                    code: code.to_string(),
                });
            }
        }
        Ok(Self { rates })
    }

    /// Parse the `{ "data": [ { "currency", "rate" } ] }` payload.
    pub fn from_payload(body: &str) -> Result<Self, ValuationError> {
        let payload: RatesPayload = serde_json::from_str(body).map_err(|e| {
            ValuationError::upstream(None, Some(format!("malformed rate payload: {e}")))
        })?;
        Self::from_entries(
            payload
                .data
                .into_iter()
                .map(|entry| (entry.currency, entry.rate)),
        )
        .map_err(|e| ValuationError::upstream(None, Some(format!("malformed rate payload: {e}"))))
    }

    /// Rate for `code`, case-insensitive.
    pub fn rate(&self, code: &str) -> Result<f64, ValuationError> {
        let unknown = || ValuationError::UnknownCurrency {
            code: code.trim().to_ascii_uppercase(),
        };
        let ticker = Ticker::parse(code).map_err(|_| unknown())?;
        self.rates.get(&ticker).copied().ok_or_else(unknown)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rate(code).is_ok()
    }

    /// `rate(from) / rate(to)`.
    pub fn convert(&self, from: &str, to: &str) -> Result<f64, ValuationError> {
        Ok(self.rate(from)? / self.rate(to)?)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RatesPayload {
    data: Vec<RateEntry>,
}

#[derive(Debug, Deserialize)]
struct RateEntry {
    currency: String,
    rate: f64,
}

/// Upstream that publishes the full rate table for a principal.
pub trait RateSource: Send + Sync {
    fn fetch_rates<'a>(
        &'a self,
        principal: &'a Principal,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeRateTable, ValuationError>> + Send + 'a>>;
}

/// Request-scoped view over a [`RateSource`].
pub struct RateProvider {
    source: Arc<dyn RateSource>,
    principal: Principal,
    table: OnceCell<ExchangeRateTable>,
}

impl RateProvider {
    pub fn new(source: Arc<dyn RateSource>, principal: Principal) -> Self {
        Self {
            source,
            principal,
            table: OnceCell::new(),
        }
    }

    /// The table for this valuation, fetched on first use.
    pub async fn rates(&self) -> Result<&ExchangeRateTable, ValuationError> {
        self.table
            .get_or_try_init(|| {
                debug!(principal = %self.principal, "fetching reference rates");
                self.source.fetch_rates(&self.principal)
            })
            .await
    }

    pub async fn convert(&self, from: &str, to: &str) -> Result<f64, ValuationError> {
        self.rates().await?.convert(from, to)
    }
}

/// Fixed table served to every principal. Used offline and by the CLI's
/// `--rates-file`.
#[derive(Debug, Default)]
pub struct StaticRateSource {
    table: ExchangeRateTable,
    fetches: AtomicUsize,
}

impl StaticRateSource {
    pub fn new(table: ExchangeRateTable) -> Self {
        Self {
            table,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        ExchangeRateTable::from_entries(entries).map(Self::new)
    }

    /// Number of times the table has been handed out.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RateSource for StaticRateSource {
    fn fetch_rates<'a>(
        &'a self,
        _principal: &'a Principal,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeRateTable, ValuationError>> + Send + 'a>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.table.clone())
        })
    }
}
