//! Read-side seams the valuation engine depends on.
//!
//! Both traits are implemented for [`presale_store::Store`] and for small
//! in-memory types used offline and in tests.

use std::collections::BTreeMap;

use presale_store::Store;
use tracing::debug;

use crate::bonus::BonusTierTable;
use crate::{BonusTier, Product, Ticker, TokenPrice, ValuationError};

/// Products and their stage prices.
pub trait PricingRepository: Send + Sync {
    /// Product by id, falling back to ticker.
    fn find_product(&self, product: &str) -> Result<Option<Product>, ValuationError>;

    fn price_at(&self, ticker: &Ticker, stage: u32) -> Result<Option<TokenPrice>, ValuationError>;
}

/// Bonus bands keyed by gross settlement amount.
pub trait BonusTierRepository: Send + Sync {
    fn tier_table(&self) -> Result<BonusTierTable, ValuationError>;

    fn resolve(&self, gross: f64) -> Result<f64, ValuationError> {
        Ok(self.tier_table()?.resolve(gross))
    }
}

impl BonusTierRepository for BonusTierTable {
    fn tier_table(&self) -> Result<BonusTierTable, ValuationError> {
        Ok(self.clone())
    }

    fn resolve(&self, gross: f64) -> Result<f64, ValuationError> {
        Ok(BonusTierTable::resolve(self, gross))
    }
}

/// Fixed product catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPricing {
    products: Vec<Product>,
    prices: BTreeMap<(Ticker, u32), f64>,
}

impl InMemoryPricing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, id: impl Into<String>, ticker: Ticker) -> Self {
        self.products.push(Product {
            id: id.into(),
            ticker,
        });
        self
    }

    pub fn with_price(mut self, ticker: Ticker, stage: u32, price_per_token: f64) -> Self {
        self.prices.insert((ticker, stage), price_per_token);
        self
    }
}

impl PricingRepository for InMemoryPricing {
    fn find_product(&self, product: &str) -> Result<Option<Product>, ValuationError> {
        let key = product.trim();
        let by_id = self.products.iter().find(|candidate| candidate.id == key);
        let found = by_id.or_else(|| {
            self.products
                .iter()
                .find(|candidate| candidate.ticker.as_str().eq_ignore_ascii_case(key))
        });
        Ok(found.cloned())
    }

    fn price_at(&self, ticker: &Ticker, stage: u32) -> Result<Option<TokenPrice>, ValuationError> {
        self.prices
            .get(&(ticker.clone(), stage))
            .map(|price| TokenPrice::new(ticker.clone(), stage, *price))
            .transpose()
            .map_err(ValuationError::from)
    }
}

impl PricingRepository for Store {
    fn find_product(&self, product: &str) -> Result<Option<Product>, ValuationError> {
        let key = product.trim();
        let record = match self.product(key)? {
            Some(record) => Some(record),
            None => self.product_by_ticker(key)?,
        };
        debug!(product = key, found = record.is_some(), "product lookup");

        record
            .map(|record| {
                Ok(Product {
                    ticker: Ticker::parse(&record.ticker)?,
                    id: record.id,
                })
            })
            .transpose()
    }

    fn price_at(&self, ticker: &Ticker, stage: u32) -> Result<Option<TokenPrice>, ValuationError> {
        self.stage_price(ticker.as_str(), stage)?
            .map(|record| TokenPrice::new(ticker.clone(), record.stage, record.price))
            .transpose()
            .map_err(ValuationError::from)
    }
}

impl BonusTierRepository for Store {
    fn tier_table(&self) -> Result<BonusTierTable, ValuationError> {
        let tiers = self
            .token_rewards()?
            .into_iter()
            .map(|reward| {
                BonusTier::new(
                    reward.purchase_band,
                    reward.swap,
                    reward.deposit_amount,
                    reward.reward_bonus,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(tiers = tiers.len(), "loaded bonus tiers");
        Ok(BonusTierTable::new(tiers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(value: &str) -> Ticker {
        Ticker::parse(value).expect("ticker")
    }

    #[test]
    fn in_memory_finds_by_id_then_ticker() {
        let pricing = InMemoryPricing::new()
            .with_product("p-1", ticker("DVT"))
            .with_price(ticker("DVT"), 5, 0.25);

        assert_eq!(
            pricing.find_product("p-1").expect("lookup").map(|p| p.id),
            Some(String::from("p-1"))
        );
        assert_eq!(
            pricing.find_product("dvt").expect("lookup").map(|p| p.id),
            Some(String::from("p-1"))
        );
        assert!(pricing.find_product("nope").expect("lookup").is_none());
    }

    #[test]
    fn in_memory_price_is_per_stage() {
        let pricing = InMemoryPricing::new().with_price(ticker("DVT"), 5, 0.25);

        let price = pricing.price_at(&ticker("DVT"), 5).expect("lookup");
        assert_eq!(price.map(|p| p.price_per_token), Some(0.25));
        assert!(pricing.price_at(&ticker("DVT"), 4).expect("lookup").is_none());
    }

    #[test]
    fn in_memory_rejects_stored_non_positive_price() {
        let pricing = InMemoryPricing::new().with_price(ticker("DVT"), 5, -1.0);
        let err = pricing.price_at(&ticker("DVT"), 5).expect_err("must fail");
        assert!(matches!(err, ValuationError::InvalidData(_)));
    }
}
