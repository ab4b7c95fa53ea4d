//! # Presale Core
//!
//! Token purchase valuation for the presale platform.
//!
//! A purchase request names a product, a payment currency and an amount.
//! The engine validates it, fetches the reference rate table once, prices
//! the product at the configured sale stage and resolves a bonus band,
//! producing a [`PurchaseValuation`]. Nothing here writes state; callers
//! persist purchases themselves.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Reference-rate service client |
//! | [`bonus`] | Bonus band resolution |
//! | [`config`] | Engine configuration and environment overrides |
//! | [`domain`] | Validated value types |
//! | [`envelope`] | Output envelope |
//! | [`error`] | Error taxonomy |
//! | [`http_client`] | HTTP transport seam |
//! | [`rates`] | Rate tables, sources and the per-valuation provider |
//! | [`repository`] | Pricing and bonus tier repositories |
//! | [`validation`] | Purchase request validation |
//! | [`valuation`] | The valuation engine |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use presale_core::{
//!     BonusTierTable, InMemoryPricing, Principal, PurchaseRequest, StaticRateSource,
//!     Ticker, ValuationEngine,
//! };
//!
//! let rates = StaticRateSource::from_entries([("USD", 1.0), ("SOL", 0.05)])?;
//! let dvt = Ticker::parse("DVT")?;
//! let pricing = InMemoryPricing::new()
//!     .with_product("dvt-id", dvt.clone())
//!     .with_price(dvt, 5, 0.05);
//! let engine = ValuationEngine::new(
//!     Arc::new(rates),
//!     Arc::new(pricing),
//!     Arc::new(BonusTierTable::default()),
//! );
//!
//! let valuation = engine
//!     .purchase_valuation(&Principal::new("user-1")?, &PurchaseRequest::new("DVT", "usd", 500.0))
//!     .await?;
//! assert_eq!(valuation.token.total, 10_000);
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`ValuationError`] with a stable [`ValuationError::code`]:
//!
//! ```rust
//! use presale_core::ValuationError;
//!
//! fn describe(error: &ValuationError) -> &'static str {
//!     match error {
//!         ValuationError::UpstreamUnavailable { .. } => "rates unavailable, try later",
//!         error if error.is_client_error() => "fix the request",
//!         _ => "internal failure",
//!     }
//! }
//! ```

pub mod adapters;
pub mod bonus;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod rates;
pub mod repository;
pub mod validation;
pub mod valuation;

pub use adapters::ReferenceRateClient;
pub use bonus::BonusTierTable;
pub use config::ValuationConfig;
pub use domain::{
    BonusTier, CurrencyKind, Principal, Product, PurchaseValuation, Ticker, TokenAllocation,
    TokenPrice,
};
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{FieldViolation, ValidationError, ValidationReport, ValuationError};
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use rates::{ExchangeRateTable, RateProvider, RateSource, StaticRateSource};
pub use repository::{BonusTierRepository, InMemoryPricing, PricingRepository};
pub use validation::{PurchaseRequest, PurchaseRequestValidator, ValidatedPurchase};
pub use valuation::{PricedPurchase, ValuationEngine};

pub use presale_store::{Store, StoreConfig, StoreError};
