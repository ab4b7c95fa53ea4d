//! Behavior-driven tests for token purchase valuation
//!
//! These tests verify HOW the engine values crypto and fiat payments, which
//! bonus band it picks, and that failures stop before the catalog is read.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use presale_core::{
    BonusTier, BonusTierRepository, BonusTierTable, CurrencyKind, HttpClient, HttpError,
    HttpRequest, HttpResponse, InMemoryPricing, PricingRepository, Principal, Product,
    PurchaseRequest, ReferenceRateClient, StaticRateSource, Ticker, TokenPrice, ValuationEngine,
    ValuationError,
};

// =============================================================================
// Fixtures
// =============================================================================

fn ticker(value: &str) -> Ticker {
    Ticker::parse(value).expect("valid ticker")
}

fn principal() -> Principal {
    Principal::new("user-42").expect("valid principal")
}

/// `usd -> sol` converts at 2.0 and `sol -> usd` at 0.5.
fn rates() -> StaticRateSource {
    StaticRateSource::from_entries([("USD", 1.0), ("SOL", 0.5), ("BTC", 0.00002), ("ETH", 0.0005)])
        .expect("valid rates")
}

fn tiers() -> BonusTierTable {
    BonusTierTable::new(vec![
        BonusTier::new(1, 0, Some(10), 5.0).expect("tier"),
        BonusTier::new(2, 11, Some(50), 10.0).expect("tier"),
        BonusTier::new(3, 51, None, 20.0).expect("tier"),
    ])
}

fn pricing(price: f64) -> InMemoryPricing {
    InMemoryPricing::new()
        .with_product("dvt-1", ticker("DVT"))
        .with_price(ticker("DVT"), 5, price)
}

struct CountingPricing {
    inner: InMemoryPricing,
    calls: AtomicUsize,
}

impl CountingPricing {
    fn new(inner: InMemoryPricing) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PricingRepository for CountingPricing {
    fn find_product(&self, product: &str) -> Result<Option<Product>, ValuationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_product(product)
    }

    fn price_at(&self, ticker: &Ticker, stage: u32) -> Result<Option<TokenPrice>, ValuationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.price_at(ticker, stage)
    }
}

/// Records every gross amount the engine asks a bonus for.
struct RecordingTiers {
    table: BonusTierTable,
    seen: Mutex<Vec<f64>>,
}

impl RecordingTiers {
    fn new(table: BonusTierTable) -> Self {
        Self {
            table,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<f64> {
        self.seen.lock().expect("lock").clone()
    }
}

impl BonusTierRepository for RecordingTiers {
    fn tier_table(&self) -> Result<BonusTierTable, ValuationError> {
        Ok(self.table.clone())
    }

    fn resolve(&self, gross: f64) -> Result<f64, ValuationError> {
        self.seen.lock().expect("lock").push(gross);
        Ok(self.table.resolve(gross))
    }
}

struct UnavailableRates;

impl HttpClient for UnavailableRates {
    fn execute<'a>(
        &'a self,
        _request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async { Ok(HttpResponse::with_status(503, None)) })
    }
}

fn engine(price: f64) -> ValuationEngine {
    ValuationEngine::new(Arc::new(rates()), Arc::new(pricing(price)), Arc::new(tiers()))
}

// =============================================================================
// Crypto payments
// =============================================================================

#[tokio::test]
async fn when_paying_in_crypto_system_devalues_and_adds_gross_bonus() {
    // Given: usd->sol at 2.0, stage price 0.3 and a 10% band for 11..=50
    let engine = engine(0.3);

    // When: 10 units are paid in BTC
    let valuation = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "BTC", 10.0))
        .await
        .expect("valuation succeeds");

    // Then: gross 20, net 6.8, 3.4 USD buys 11.33 tokens plus a 10% bonus
    assert_eq!(valuation.currency_type, CurrencyKind::Crypto);
    assert_eq!(valuation.rate, 2.0);
    assert!((valuation.payment_amount - 3.4).abs() < 1e-9);
    assert_eq!(valuation.token.amount, 12);
    assert_eq!(valuation.token.bonus, 2);
    assert_eq!(valuation.token.total, 13);
}

#[tokio::test]
async fn when_each_quantity_is_rounded_system_does_not_sum_the_rounded_parts() {
    // Given: the 12 + 2 allocation from 11.33 tokens and a 1.13 bonus
    let valuation = engine(0.3)
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "eth", 10.0))
        .await
        .expect("valuation succeeds");

    // Then: the total is ceil(12.47), one less than the sum of the parts
    assert_eq!(valuation.token.amount + valuation.token.bonus, 14);
    assert_eq!(valuation.token.total, 13);
}

#[tokio::test]
async fn when_stage_price_changes_system_keeps_the_same_bonus_band() {
    // Given: two catalogs that differ only in stage price
    let cheap_tiers = Arc::new(RecordingTiers::new(tiers()));
    let dear_tiers = Arc::new(RecordingTiers::new(tiers()));
    let cheap = ValuationEngine::new(Arc::new(rates()), Arc::new(pricing(0.01)), cheap_tiers.clone());
    let dear = ValuationEngine::new(Arc::new(rates()), Arc::new(pricing(0.3)), dear_tiers.clone());
    let request = PurchaseRequest::new("dvt-1", "sol", 10.0);

    // When: the same payment is valued against both
    let cheap_valuation = cheap
        .purchase_valuation(&principal(), &request)
        .await
        .expect("cheap valuation");
    let dear_valuation = dear
        .purchase_valuation(&principal(), &request)
        .await
        .expect("dear valuation");

    // Then: both ask for the bonus of the gross amount (20), never the net (6.8)
    assert_eq!(cheap_tiers.seen(), vec![20.0]);
    assert_eq!(dear_tiers.seen(), vec![20.0]);
    assert!(cheap_valuation.token.amount > dear_valuation.token.amount);
    assert_eq!(
        tiers().tier_for(20.0).map(|tier| tier.purchase_band),
        Some(2)
    );
}

#[tokio::test]
async fn when_gross_exceeds_every_bounded_band_system_uses_the_top_band() {
    // Given: bands that stop at 50, with no open-ended band
    let bounded = BonusTierTable::new(vec![
        BonusTier::new(1, 0, Some(10), 5.0).expect("tier"),
        BonusTier::new(2, 11, Some(50), 10.0).expect("tier"),
    ]);
    let engine = ValuationEngine::new(Arc::new(rates()), Arc::new(pricing(0.3)), Arc::new(bounded));

    // When: the gross settlement amount is 200
    let valuation = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "btc", 100.0))
        .await
        .expect("valuation succeeds");

    // Then: the highest band's 10% applies to 113.33 tokens
    assert_eq!(valuation.token.amount, 114);
    assert_eq!(valuation.token.bonus, 12);
    assert_eq!(valuation.token.total, 125);
}

#[tokio::test]
async fn when_the_rate_table_is_narrated_per_usd_system_follows_the_ratio_formula() {
    // Given: one USD buys twenty SOL, so usd->sol is 20 and sol->usd is 0.05
    let rates = StaticRateSource::from_entries([("USD", 20.0), ("SOL", 1.0), ("BTC", 0.001)])
        .expect("rates");
    let tiers = BonusTierTable::new(vec![BonusTier::new(1, 101, Some(500), 10.0).expect("tier")]);
    let engine = ValuationEngine::new(Arc::new(rates), Arc::new(pricing(0.03)), Arc::new(tiers));

    // When: 10 units are paid
    let valuation = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("DVT", "btc", 10.0))
        .await
        .expect("valuation succeeds");

    // Then: gross 200, net 68, 3.4 USD at 0.03 is 113.33 tokens with a 10% bonus
    assert_eq!(valuation.rate, 20.0);
    assert!((valuation.payment_amount - 3.4).abs() < 1e-9);
    assert_eq!(valuation.token.amount, 114);
    assert_eq!(valuation.token.bonus, 12);
    assert_eq!(valuation.token.total, 125);
}

#[tokio::test]
async fn when_valued_twice_system_returns_identical_results() {
    let engine = engine(0.3);
    let request = PurchaseRequest::new("dvt-1", "btc", 7.5);

    let first = engine
        .purchase_valuation(&principal(), &request)
        .await
        .expect("first");
    let second = engine
        .purchase_valuation(&principal(), &request)
        .await
        .expect("second");

    assert_eq!(first, second);
}

#[tokio::test]
async fn when_crypto_amount_buys_more_tokens_than_can_be_held_system_rejects_it() {
    let engine = engine(0.3);

    for amount in [1e30, 1e308] {
        // When: the amount values to more tokens than the catalog can record
        let err = engine
            .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "btc", amount))
            .await
            .expect_err("too many tokens");

        // Then: the request is refused instead of saturating the counts
        assert!(
            matches!(err, ValuationError::TokenQuantityOutOfRange { .. }),
            "amount {amount} gave {err:?}"
        );
        assert!(err.is_client_error());
    }
}

// =============================================================================
// Fiat payments
// =============================================================================

#[tokio::test]
async fn when_paying_in_fiat_system_never_adds_a_bonus() {
    let rates = Arc::new(rates());
    let engine = ValuationEngine::new(rates.clone(), Arc::new(pricing(0.3)), Arc::new(tiers()));

    for currency in ["usd", "EUR", "Gbp"] {
        let valuation = engine
            .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", currency, 500.0))
            .await
            .expect("fiat valuation");

        assert_eq!(valuation.currency_type, CurrencyKind::Fiat);
        assert_eq!(valuation.rate, 1.0);
        assert_eq!(valuation.payment_amount, 500.0);
        assert_eq!(valuation.token.bonus, 0);
        assert_eq!(valuation.token.amount, 1_667);
        assert_eq!(valuation.token.total, 1_667);
    }

    // Fiat never needs the rate table.
    assert_eq!(rates.fetch_count(), 0);
}

#[tokio::test]
async fn when_fiat_amount_is_on_a_bound_system_accepts_it() {
    let engine = engine(0.25);

    for (amount, tokens) in [(250.0, 1_000), (1_000.0, 4_000)] {
        let valuation = engine
            .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "usd", amount))
            .await
            .expect("bound accepted");
        assert_eq!(valuation.token.total, tokens);
    }
}

#[tokio::test]
async fn when_fiat_amount_is_outside_the_bounds_system_rejects_it() {
    let engine = engine(0.25);

    for amount in [249.99, 1_000.01] {
        let err = engine
            .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "usd", amount))
            .await
            .expect_err("out of bounds");
        match err {
            ValuationError::Validation(report) => assert!(report.has_field("payment_amount")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

// =============================================================================
// Fail-fast ordering
// =============================================================================

#[tokio::test]
async fn when_currency_is_not_in_the_rate_table_system_stops_before_the_catalog() {
    // Given: a catalog that counts every read
    let pricing = Arc::new(CountingPricing::new(pricing(0.3)));
    let tiers = Arc::new(RecordingTiers::new(tiers()));
    let engine = ValuationEngine::new(Arc::new(rates()), pricing.clone(), tiers.clone());

    // When: the payment currency is unknown to the rate service
    let err = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "xyz", 10.0))
        .await
        .expect_err("unknown currency");

    // Then: UnknownCurrency is raised and no repository was read
    assert!(matches!(err, ValuationError::UnknownCurrency { ref code } if code == "XYZ"));
    assert!(err.is_client_error());
    assert_eq!(pricing.calls(), 0);
    assert!(tiers.seen().is_empty());
}

#[tokio::test]
async fn when_rate_service_returns_503_system_stops_before_the_catalog() {
    // Given: a reference-rate service that is down
    let rates = ReferenceRateClient::with_http_client(Arc::new(UnavailableRates), "https://books.test");
    let pricing = Arc::new(CountingPricing::new(pricing(0.3)));
    let tiers = Arc::new(RecordingTiers::new(tiers()));
    let engine = ValuationEngine::new(Arc::new(rates), pricing.clone(), tiers.clone());

    // When: a crypto purchase is valued
    let err = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "btc", 10.0))
        .await
        .expect_err("upstream down");

    // Then: the failure carries the status and nothing else ran
    assert!(matches!(
        err,
        ValuationError::UpstreamUnavailable {
            status: Some(503),
            ..
        }
    ));
    assert_eq!(err.code(), "valuation.upstream_unavailable");
    assert_eq!(pricing.calls(), 0);
    assert!(tiers.seen().is_empty());
}

#[tokio::test]
async fn when_settlement_currency_is_missing_system_stops_before_the_catalog() {
    // Given: a rate table that knows the payment currency but not SOL
    let rates = StaticRateSource::from_entries([("USD", 1.0), ("BTC", 0.00002)]).expect("rates");
    let pricing = Arc::new(CountingPricing::new(pricing(0.3)));
    let engine = ValuationEngine::new(Arc::new(rates), pricing.clone(), Arc::new(tiers()));

    // When: a btc purchase is valued
    let err = engine
        .purchase_valuation(&principal(), &PurchaseRequest::new("dvt-1", "btc", 10.0))
        .await
        .expect_err("no settlement rate");

    // Then: the missing settlement currency is reported without a catalog read
    assert!(matches!(err, ValuationError::UnknownCurrency { ref code } if code == "SOL"));
    assert_eq!(pricing.calls(), 0);
}

#[tokio::test]
async fn when_request_is_invalid_system_fetches_no_rates() {
    let rates = Arc::new(rates());
    let engine = ValuationEngine::new(rates.clone(), Arc::new(pricing(0.3)), Arc::new(tiers()));

    let err = engine
        .purchase_valuation(&principal(), &PurchaseRequest::default())
        .await
        .expect_err("invalid");

    match err {
        ValuationError::Validation(report) => assert_eq!(report.violations().len(), 3),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(rates.fetch_count(), 0);
}
