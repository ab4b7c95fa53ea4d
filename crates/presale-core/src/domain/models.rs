use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{Ticker, ValidationError, ValuationError};

/// How a payment currency is valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyKind {
    /// Taken at face value as USD; never earns a bonus.
    Fiat,
    /// Converted through the settlement currency with devaluation.
    Crypto,
}

impl CurrencyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fiat => "fiat",
            Self::Crypto => "crypto",
        }
    }
}

impl Display for CurrencyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The user on whose behalf a valuation runs. The reference-rate service is
/// principal-aware, so every rate fetch carries this id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyPrincipal);
        }
        Ok(Self(id.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Principal {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal view of a sale product needed by valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub ticker: Ticker,
}

/// Price per token of one product at one sale stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub ticker: Ticker,
    pub stage: u32,
    pub price_per_token: f64,
}

impl TokenPrice {
    pub fn new(ticker: Ticker, stage: u32, price_per_token: f64) -> Result<Self, ValidationError> {
        if !price_per_token.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "price_per_token",
            });
        }
        if price_per_token <= 0.0 {
            return Err(ValidationError::NonPositiveValue {
                field: "price_per_token",
            });
        }
        Ok(Self {
            ticker,
            stage,
            price_per_token,
        })
    }
}

/// One band of the bonus table, bounds in whole settlement-currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusTier {
    pub purchase_band: u32,
    pub lower: u64,
    /// `None` marks the open-ended top band.
    pub upper: Option<u64>,
    pub bonus_percent: f64,
}

impl BonusTier {
    pub fn new(
        purchase_band: u32,
        lower: u64,
        upper: Option<u64>,
        bonus_percent: f64,
    ) -> Result<Self, ValidationError> {
        if !bonus_percent.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "bonus_percent",
            });
        }
        if bonus_percent < 0.0 {
            return Err(ValidationError::NegativeValue {
                field: "bonus_percent",
            });
        }
        if let Some(upper) = upper {
            if upper < lower {
                return Err(ValidationError::InvertedTier { lower, upper });
            }
        }
        Ok(Self {
            purchase_band,
            lower,
            upper,
            bonus_percent,
        })
    }

    /// Bounded band that contains `whole`.
    pub fn contains(&self, whole: u64) -> bool {
        self.lower <= whole && self.upper.map_or(true, |upper| whole <= upper)
    }
}

/// Token quantities of a purchase. Each field is rounded up on its own, so
/// `total` can be one less than `amount + bonus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    pub amount: u64,
    pub bonus: u64,
    pub total: u64,
}

impl TokenAllocation {
    /// Round each quantity up. Quantities that are not finite, negative or
    /// beyond what the catalog can store are rejected.
    pub fn from_fractional(tokens: f64, bonus: f64) -> Result<Self, ValuationError> {
        Ok(Self {
            amount: ceil_tokens("token_amount", tokens)?,
            bonus: ceil_tokens("bonus", bonus)?,
            total: ceil_tokens("total_token", tokens + bonus)?,
        })
    }
}

// `i64::MAX as f64` rounds up to 2^63, so the bound is exclusive.
const MAX_TOKENS: f64 = i64::MAX as f64;

fn ceil_tokens(field: &'static str, value: f64) -> Result<u64, ValuationError> {
    let rounded = value.ceil();
    if !rounded.is_finite() || rounded < 0.0 || rounded >= MAX_TOKENS {
        return Err(ValuationError::TokenQuantityOutOfRange { field, value });
    }
    Ok(rounded as u64)
}

/// Result of valuing one payment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PurchaseValuation {
    pub currency_type: CurrencyKind,
    /// USD→settlement rate for crypto payments, `1.0` for fiat.
    pub rate: f64,
    /// USD value the token amount was computed from.
    pub payment_amount: f64,
    pub token: TokenAllocation,
}
