use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ValuationConfig;
use crate::rates::{RateProvider, RateSource};
use crate::repository::{BonusTierRepository, PricingRepository};
use crate::validation::{PurchaseRequest, PurchaseRequestValidator};
use crate::{
    CurrencyKind, Principal, Product, PurchaseValuation, Ticker, TokenAllocation, ValidationError,
    ValuationError,
};

/// A valuation together with the product and currency it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedPurchase {
    pub product: Product,
    /// Payment currency as requested, lowercase.
    pub currency_ticker: String,
    pub valuation: PurchaseValuation,
}

/// Turns a payment into a token allocation.
///
/// Crypto payments go through the settlement currency: the gross settlement
/// amount is devalued, re-expressed in the quote currency and divided by the
/// stage price. The bonus band is picked from the gross amount. Fiat
/// payments are divided by the stage price directly and earn no bonus.
pub struct ValuationEngine {
    rate_source: Arc<dyn RateSource>,
    pricing: Arc<dyn PricingRepository>,
    bonus_tiers: Arc<dyn BonusTierRepository>,
    validator: PurchaseRequestValidator,
    config: ValuationConfig,
}

impl ValuationEngine {
    pub fn new(
        rate_source: Arc<dyn RateSource>,
        pricing: Arc<dyn PricingRepository>,
        bonus_tiers: Arc<dyn BonusTierRepository>,
    ) -> Self {
        let config = ValuationConfig::default();
        Self {
            rate_source,
            pricing,
            bonus_tiers,
            validator: PurchaseRequestValidator::from_config(&config),
            config,
        }
    }

    /// Replace the default configuration after checking it.
    ///
    /// # Errors
    /// Returns the first invalid setting, such as a devaluation factor
    /// outside `[0, 1)`.
    pub fn with_config(mut self, config: ValuationConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        self.validator = PurchaseRequestValidator::from_config(&config);
        self.config = config;
        Ok(self)
    }

    /// Fresh rate cache for one valuation.
    pub fn rate_provider(&self, principal: Principal) -> RateProvider {
        RateProvider::new(Arc::clone(&self.rate_source), principal)
    }

    /// Validate, value and return the allocation for `request`.
    pub async fn purchase_valuation(
        &self,
        principal: &Principal,
        request: &PurchaseRequest,
    ) -> Result<PurchaseValuation, ValuationError> {
        self.quote(principal, request)
            .await
            .map(|priced| priced.valuation)
    }

    /// Same as [`Self::purchase_valuation`], keeping the resolved product.
    pub async fn quote(
        &self,
        principal: &Principal,
        request: &PurchaseRequest,
    ) -> Result<PricedPurchase, ValuationError> {
        let purchase = self
            .validator
            .validate(request)
            .map_err(ValuationError::Validation)?;
        let rates = self.rate_provider(principal.clone());

        // Every currency a crypto valuation needs must be in the rate table
        // before the catalog is touched.
        if purchase.currency_kind == CurrencyKind::Crypto {
            let table = rates.rates().await?;
            table.rate(&purchase.currency)?;
            table.rate(&self.config.settlement_currency)?;
            table.rate(&self.config.quote_currency)?;
        }

        let product = self
            .pricing
            .find_product(&purchase.product)?
            .ok_or_else(|| ValuationError::ProductNotFound {
                product: purchase.product.clone(),
            })?;

        debug!(
            principal = %principal,
            product = %product.ticker,
            currency = %purchase.currency,
            kind = %purchase.currency_kind,
            "valuing purchase"
        );

        let valuation = match purchase.currency_kind {
            CurrencyKind::Fiat => self.valuate_fiat(purchase.payment_amount, &product.ticker)?,
            CurrencyKind::Crypto => {
                self.valuate_crypto(&rates, purchase.payment_amount, &product.ticker)
                    .await?
            }
        };

        info!(
            product = %product.ticker,
            currency = %purchase.currency,
            amount = valuation.token.amount,
            bonus = valuation.token.bonus,
            total = valuation.token.total,
            "purchase valued"
        );

        Ok(PricedPurchase {
            product,
            currency_ticker: purchase.currency,
            valuation,
        })
    }

    /// Value `amount` of a crypto payment in `ticker` tokens.
    pub async fn valuate_crypto(
        &self,
        rates: &RateProvider,
        amount: f64,
        ticker: &Ticker,
    ) -> Result<PurchaseValuation, ValuationError> {
        let settlement = self.config.settlement_currency.as_str();
        let quote = self.config.quote_currency.as_str();

        let settlement_rate = rates.convert(quote, settlement).await?;
        let gross = settlement_rate * amount;
        let net = gross - self.config.devaluation_factor * gross;

        let quote_rate = rates.convert(settlement, quote).await?;
        let payment_amount = quote_rate * net;

        let price = self.stage_price(ticker)?;
        let tokens = payment_amount / price;

        let bonus_percent = self.bonus_tiers.resolve(gross)?;
        let bonus = bonus_percent / 100.0 * tokens;

        debug!(
            gross,
            net,
            payment_amount,
            price,
            bonus_percent,
            "crypto valuation"
        );

        Ok(PurchaseValuation {
            currency_type: CurrencyKind::Crypto,
            rate: settlement_rate,
            payment_amount,
            token: TokenAllocation::from_fractional(tokens, bonus)?,
        })
    }

    /// Value `amount` in the quote currency; no conversion and no bonus.
    pub fn valuate_fiat(
        &self,
        amount: f64,
        ticker: &Ticker,
    ) -> Result<PurchaseValuation, ValuationError> {
        let price = self.stage_price(ticker)?;
        let tokens = amount / price;

        Ok(PurchaseValuation {
            currency_type: CurrencyKind::Fiat,
            rate: 1.0,
            payment_amount: amount,
            token: TokenAllocation::from_fractional(tokens, 0.0)?,
        })
    }

    fn stage_price(&self, ticker: &Ticker) -> Result<f64, ValuationError> {
        let stage = self.config.stage;
        self.pricing
            .price_at(ticker, stage)?
            .map(|price| price.price_per_token)
            .ok_or_else(|| ValuationError::NoPricingForStage {
                ticker: ticker.to_string(),
                stage,
            })
    }
}
