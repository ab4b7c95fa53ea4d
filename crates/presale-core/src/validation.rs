use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ValuationConfig;
use crate::{CurrencyKind, ValidationReport};

/// Raw purchase input as it arrives from a caller. Fields stay loosely typed
/// so every problem can be reported at once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub product_id: Option<Value>,
    #[serde(default)]
    pub currency_ticker: Option<Value>,
    #[serde(default)]
    pub payment_amount: Option<Value>,
}

impl PurchaseRequest {
    pub fn new(product_id: &str, currency_ticker: &str, payment_amount: f64) -> Self {
        Self {
            product_id: Some(Value::from(product_id)),
            currency_ticker: Some(Value::from(currency_ticker)),
            payment_amount: serde_json::Number::from_f64(payment_amount).map(Value::Number),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPurchase {
    /// Product id or ticker, trimmed.
    pub product: String,
    /// Payment currency, lowercase.
    pub currency: String,
    pub currency_kind: CurrencyKind,
    pub payment_amount: f64,
}

#[derive(Debug, Clone)]
pub struct PurchaseRequestValidator {
    fiat_currencies: Vec<String>,
    fiat_min: f64,
    fiat_max: f64,
}

impl Default for PurchaseRequestValidator {
    fn default() -> Self {
        Self::from_config(&ValuationConfig::default())
    }
}

impl PurchaseRequestValidator {
    pub fn from_config(config: &ValuationConfig) -> Self {
        Self {
            fiat_currencies: config.fiat_currencies.clone(),
            fiat_min: config.fiat_min,
            fiat_max: config.fiat_max,
        }
    }

    pub fn currency_kind(&self, currency: &str) -> CurrencyKind {
        let currency = currency.trim();
        if self
            .fiat_currencies
            .iter()
            .any(|fiat| fiat.eq_ignore_ascii_case(currency))
        {
            CurrencyKind::Fiat
        } else {
            CurrencyKind::Crypto
        }
    }

    /// Check every field and collect all violations.
    pub fn validate(&self, request: &PurchaseRequest) -> Result<ValidatedPurchase, ValidationReport> {
        let mut report = ValidationReport::default();

        let product = required_string(&mut report, "product_id", request.product_id.as_ref());
        let currency =
            required_string(&mut report, "currency_ticker", request.currency_ticker.as_ref())
                .map(|currency| currency.to_ascii_lowercase());

        // A missing currency cannot be fiat, so crypto rules apply.
        let currency_kind = self.currency_kind(currency.as_deref().unwrap_or_default());
        let amount = match numeric(request.payment_amount.as_ref()) {
            Numeric::Missing => {
                report.push("payment_amount", "is required");
                None
            }
            Numeric::NotNumeric => {
                report.push("payment_amount", "must be numeric");
                None
            }
            Numeric::Value(amount) => self.check_amount(&mut report, currency_kind, amount),
        };

        match (product, currency, amount) {
            (Some(product), Some(currency), Some(payment_amount)) if report.is_empty() => {
                Ok(ValidatedPurchase {
                    product,
                    currency,
                    currency_kind,
                    payment_amount,
                })
            }
            _ => Err(report),
        }
    }

    fn check_amount(
        &self,
        report: &mut ValidationReport,
        kind: CurrencyKind,
        amount: f64,
    ) -> Option<f64> {
        match kind {
            CurrencyKind::Fiat if !(self.fiat_min..=self.fiat_max).contains(&amount) => {
                report.push(
                    "payment_amount",
                    format!("must be between {} and {}", self.fiat_min, self.fiat_max),
                );
                None
            }
            CurrencyKind::Crypto if amount < 0.0 => {
                report.push("payment_amount", "must not be negative");
                None
            }
            _ => Some(amount),
        }
    }
}

fn required_string(
    report: &mut ValidationReport,
    field: &'static str,
    value: Option<&Value>,
) -> Option<String> {
    match value {
        None | Some(Value::Null) => {
            report.push(field, "is required");
            None
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            report.push(field, "is required");
            None
        }
        Some(Value::String(text)) => Some(text.trim().to_string()),
        Some(_) => {
            report.push(field, "must be a string");
            None
        }
    }
}

enum Numeric {
    Missing,
    NotNumeric,
    Value(f64),
}

fn numeric(value: Option<&Value>) -> Numeric {
    let parsed = match value {
        None | Some(Value::Null) => return Numeric::Missing,
        Some(Value::String(text)) if text.trim().is_empty() => return Numeric::Missing,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(_) => None,
    };
    // "NaN" and "inf" parse as f64 but are not amounts.
    match parsed {
        Some(amount) if amount.is_finite() => Numeric::Value(amount),
        _ => Numeric::NotNumeric,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn request(value: Value) -> PurchaseRequest {
        serde_json::from_value(value).expect("request json")
    }

    #[test]
    fn fiat_bounds_are_inclusive() {
        let validator = PurchaseRequestValidator::default();
        for amount in [250.0, 1_000.0] {
            let ok = validator
                .validate(&PurchaseRequest::new("p-1", "USD", amount))
                .expect("accepted");
            assert_eq!(ok.currency_kind, CurrencyKind::Fiat);
            assert_eq!(ok.currency, "usd");
        }
        for amount in [249.99, 1_000.01] {
            let report = validator
                .validate(&PurchaseRequest::new("p-1", "eur", amount))
                .expect_err("rejected");
            assert!(report.has_field("payment_amount"));
        }
    }

    #[test]
    fn reports_every_missing_field() {
        let report = PurchaseRequestValidator::default()
            .validate(&request(json!({})))
            .expect_err("rejected");

        assert!(report.has_field("product_id"));
        assert!(report.has_field("currency_ticker"));
        assert!(report.has_field("payment_amount"));
        assert_eq!(report.violations().len(), 3);
    }

    #[test]
    fn accepts_numeric_strings() {
        let validated = PurchaseRequestValidator::default()
            .validate(&request(json!({
                "product_id": "p-1",
                "currency_ticker": "sol",
                "payment_amount": " 12.5 "
            })))
            .expect("accepted");
        assert_eq!(validated.payment_amount, 12.5);
        assert_eq!(validated.currency_kind, CurrencyKind::Crypto);
    }

    #[test]
    fn rejects_negative_and_non_numeric_crypto_amounts() {
        let validator = PurchaseRequestValidator::default();
        let report = validator
            .validate(&PurchaseRequest::new("p-1", "btc", -1.0))
            .expect_err("negative");
        assert!(report.to_string().contains("must not be negative"));

        let report = validator
            .validate(&request(json!({
                "product_id": 7,
                "currency_ticker": "btc",
                "payment_amount": "NaN"
            })))
            .expect_err("not numeric");
        assert!(report.has_field("product_id"));
        assert!(report.to_string().contains("must be numeric"));
    }

    #[test]
    fn crypto_amount_has_no_upper_bound() {
        let validated = PurchaseRequestValidator::default()
            .validate(&PurchaseRequest::new("p-1", "eth", 50_000.0))
            .expect("accepted");
        assert_eq!(validated.payment_amount, 50_000.0);
    }
}
