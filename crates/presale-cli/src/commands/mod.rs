mod prices;
mod products;
mod purchase;
mod rewards;
mod worth;

use std::fs;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use presale_core::{
    Envelope, EnvelopeError, ExchangeRateTable, Principal, PurchaseRequest, RateSource,
    ReferenceRateClient, StaticRateSource, Store, StoreConfig, ValuationConfig, ValuationEngine,
    ValuationError,
};
use presale_store::ProductRecord;
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command, PurchasesCommand, ValuationArgs};
use crate::error::CliError;
use crate::metadata::Metadata;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// A valuation that failed; the envelope carries the error and no data.
    pub fn failed(error: &ValuationError) -> Self {
        Self {
            data: Value::Null,
            warnings: Vec::new(),
            errors: vec![EnvelopeError::from(error)],
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let store = open_store(cli)?;

    let command_result = match &cli.command {
        Command::Worth(args) => worth::run(args, &engine(cli, &store)?).await?,
        Command::Purchase(args) => purchase::run(args, &engine(cli, &store)?, &store).await?,
        Command::Purchases(args) => match &args.command {
            PurchasesCommand::List(list) => purchase::list(list, &store)?,
        },
        Command::Products(args) => products::run(args, &store)?,
        Command::Prices(args) => prices::run(args, &store)?,
        Command::Rewards(args) => rewards::run(args, &store)?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut metadata = Metadata::new(latency_ms);
    for warning in warnings {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta()?;
    Envelope::with_errors(meta, data, errors).map_err(CliError::from)
}

fn open_store(cli: &Cli) -> Result<Arc<Store>, CliError> {
    let config = match &cli.db {
        Some(path) => {
            let home = path
                .parent()
                .map(|parent| parent.to_path_buf())
                .unwrap_or_default();
            StoreConfig {
                db_path: path.clone(),
                ..StoreConfig::at_home(home)
            }
        }
        None => StoreConfig::default(),
    };
    Ok(Arc::new(Store::open(config)?))
}

/// CLI flags on top of `config`.
fn apply_flags(cli: &Cli, mut config: ValuationConfig) -> ValuationConfig {
    if let Some(stage) = cli.stage {
        config.stage = stage;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.rate_timeout = Duration::from_millis(timeout_ms);
    }
    config
}

fn engine(cli: &Cli, store: &Arc<Store>) -> Result<ValuationEngine, CliError> {
    let config = apply_flags(cli, ValuationConfig::from_env()?);
    let rate_source: Arc<dyn RateSource> = match (&cli.rates_file, &config.reference_books_url) {
        (Some(path), _) => {
            let body = fs::read_to_string(path)?;
            let table = ExchangeRateTable::from_payload(&body).map_err(|error| {
                CliError::Command(format!("rates file {}: {error}", path.display()))
            })?;
            debug!(path = %path.display(), currencies = table.len(), "using rates file");
            Arc::new(StaticRateSource::new(table))
        }
        (None, Some(url)) => {
            Arc::new(ReferenceRateClient::new(url.clone()).with_timeout(config.rate_timeout))
        }
        (None, None) => Arc::new(UnconfiguredRates),
    };

    Ok(ValuationEngine::new(rate_source, store.clone(), store.clone()).with_config(config)?)
}

/// Rate source used when neither a service URL nor a rates file is given.
/// Fiat valuations never ask for rates, so they still succeed.
struct UnconfiguredRates;

impl RateSource for UnconfiguredRates {
    fn fetch_rates<'a>(
        &'a self,
        _principal: &'a Principal,
    ) -> Pin<Box<dyn Future<Output = Result<ExchangeRateTable, ValuationError>> + Send + 'a>> {
        Box::pin(async {
            Err(ValuationError::upstream(
                None,
                Some(String::from(
                    "API_REFERENCE_BOOKS_URL is not set and no --rates-file was given",
                )),
            ))
        })
    }
}

fn purchase_request(args: &ValuationArgs) -> PurchaseRequest {
    PurchaseRequest {
        product_id: Some(Value::from(args.product.as_str())),
        currency_ticker: Some(Value::from(args.currency.as_str())),
        payment_amount: Some(Value::from(args.amount.as_str())),
    }
}

/// Product by id, falling back to ticker.
fn resolve_product(store: &Store, key: &str) -> Result<ProductRecord, CliError> {
    let key = key.trim();
    match store.product(key)? {
        Some(product) => Ok(product),
        None => store
            .product_by_ticker(key)?
            .ok_or_else(|| CliError::Command(format!("product '{key}' not found"))),
    }
}
