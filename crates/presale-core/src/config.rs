use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::ValidationError;

pub const STAGE_ENV: &str = "PRESALE_STAGE";
pub const DEVALUATION_ENV: &str = "PRESALE_DEVALUATION_FACTOR";
pub const RATE_TIMEOUT_ENV: &str = "PRESALE_RATE_TIMEOUT_MS";
pub const REFERENCE_BOOKS_URL_ENV: &str = "API_REFERENCE_BOOKS_URL";

/// Knobs of the valuation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    /// Sale stage whose price is used.
    pub stage: u32,
    /// Share of the gross settlement amount removed before pricing.
    pub devaluation_factor: f64,
    pub settlement_currency: String,
    pub quote_currency: String,
    /// Currencies valued at face value, lowercase.
    pub fiat_currencies: Vec<String>,
    pub fiat_min: f64,
    pub fiat_max: f64,
    pub rate_timeout: Duration,
    pub reference_books_url: Option<String>,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            stage: 5,
            devaluation_factor: 0.66,
            settlement_currency: String::from("sol"),
            quote_currency: String::from("usd"),
            fiat_currencies: vec![
                String::from("usd"),
                String::from("eur"),
                String::from("gbp"),
            ],
            fiat_min: 250.0,
            fiat_max: 1_000.0,
            rate_timeout: Duration::from_millis(3_000),
            reference_books_url: None,
        }
    }
}

impl ValuationConfig {
    /// Defaults overridden by `PRESALE_*` variables and `API_REFERENCE_BOOKS_URL`.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();
        if let Some(stage) = parse_env::<u32>(STAGE_ENV)? {
            config.stage = stage;
        }
        if let Some(factor) = parse_env::<f64>(DEVALUATION_ENV)? {
            config.devaluation_factor = factor;
        }
        if let Some(timeout_ms) = parse_env::<u64>(RATE_TIMEOUT_ENV)? {
            config.rate_timeout = Duration::from_millis(timeout_ms);
        }
        config.reference_books_url = env::var(REFERENCE_BOOKS_URL_ENV)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(0.0..1.0).contains(&self.devaluation_factor) {
            return Err(ValidationError::InvalidConfig {
                key: DEVALUATION_ENV,
                value: self.devaluation_factor.to_string(),
            });
        }
        if self.rate_timeout.is_zero() {
            return Err(ValidationError::InvalidConfig {
                key: RATE_TIMEOUT_ENV,
                value: String::from("0"),
            });
        }
        if !(self.fiat_min.is_finite() && self.fiat_max.is_finite())
            || self.fiat_min > self.fiat_max
        {
            return Err(ValidationError::InvalidConfig {
                key: "fiat_bounds",
                value: format!("{}..={}", self.fiat_min, self.fiat_max),
            });
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(key: &'static str) -> Result<Option<T>, ValidationError> {
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ValidationError::InvalidConfig {
            key,
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_sale_rules() {
        let config = ValuationConfig::default();
        assert_eq!(config.stage, 5);
        assert_eq!(config.devaluation_factor, 0.66);
        assert_eq!(config.rate_timeout, Duration::from_millis(3_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_factor() {
        let config = ValuationConfig {
            devaluation_factor: 1.5,
            ..ValuationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConfig { key: DEVALUATION_ENV, .. })
        ));
    }
}
