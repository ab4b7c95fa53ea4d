use std::fmt::{Display, Formatter};

use presale_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Invariant violations on domain values and configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("principal id cannot be empty")]
    EmptyPrincipal,

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be greater than zero")]
    NonPositiveValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },

    #[error("currency '{code}' appears more than once in the rate table")]
    DuplicateCurrency { code: String },

    #[error("bonus tier upper bound {upper} is below lower bound {lower}")]
    InvertedTier { lower: u64, upper: u64 },

    #[error("invalid value for {key}: '{value}'")]
    InvalidConfig { key: &'static str, value: String },

    #[error("request id must be at least 8 characters")]
    InvalidRequestId,
    #[error("schema version '{value}' must look like vMAJOR.MINOR.PATCH")]
    InvalidSchemaVersion { value: String },
    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
}

/// One rejected field of a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Every violation found in a purchase request, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationReport(Vec<FieldViolation>);

impl ValidationReport {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldViolation::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    /// True when at least one violation concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|violation| violation.field == field)
    }
}

impl Display for ValidationReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", violation.field, violation.message)?;
        }
        Ok(())
    }
}

/// Failure of a single valuation call. Nothing is written on any path, so
/// every variant leaves the catalog untouched.
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    #[error("reference rates unavailable{}: {reason}", status_suffix(.status))]
    UpstreamUnavailable { status: Option<u16>, reason: String },

    #[error("currency '{code}' is not in the rate table")]
    UnknownCurrency { code: String },

    #[error("product '{product}' not found")]
    ProductNotFound { product: String },

    #[error("product '{ticker}' has no price at stage {stage}")]
    NoPricingForStage { ticker: String, stage: u32 },

    #[error("{field} of {value} tokens is out of range")]
    TokenQuantityOutOfRange { field: &'static str, value: f64 },

    #[error(transparent)]
    InvalidData(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reason reported when the upstream gives none.
pub const DEFAULT_UPSTREAM_REASON: &str = "Error Processing Request";

impl ValuationError {
    pub fn upstream(status: Option<u16>, reason: Option<String>) -> Self {
        let reason = reason
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| String::from(DEFAULT_UPSTREAM_REASON));
        Self::UpstreamUnavailable { status, reason }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "valuation.validation",
            Self::UpstreamUnavailable { .. } => "valuation.upstream_unavailable",
            Self::UnknownCurrency { .. } => "valuation.unknown_currency",
            Self::ProductNotFound { .. } => "valuation.product_not_found",
            Self::NoPricingForStage { .. } => "valuation.no_pricing_for_stage",
            Self::TokenQuantityOutOfRange { .. } => "valuation.token_quantity_out_of_range",
            Self::InvalidData(_) => "valuation.invalid_data",
            Self::Store(_) => "valuation.store",
        }
    }

    /// Caused by the request itself rather than by an upstream or the catalog.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnknownCurrency { .. }
                | Self::ProductNotFound { .. }
                | Self::NoPricingForStage { .. }
                | Self::TokenQuantityOutOfRange { .. }
        )
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" (status {status})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_defaults_reason_when_missing() {
        let error = ValuationError::upstream(Some(503), None);
        assert_eq!(
            error.to_string(),
            "reference rates unavailable (status 503): Error Processing Request"
        );

        let error = ValuationError::upstream(None, Some(String::from("  ")));
        assert!(matches!(
            error,
            ValuationError::UpstreamUnavailable { status: None, ref reason } if reason == DEFAULT_UPSTREAM_REASON
        ));
    }

    #[test]
    fn report_lists_every_field() {
        let mut report = ValidationReport::default();
        report.push("product_id", "is required");
        report.push("payment_amount", "must be numeric");

        assert!(report.has_field("payment_amount"));
        assert_eq!(
            report.to_string(),
            "product_id: is required; payment_amount: must be numeric"
        );
    }
}
