use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{ValidationError, ValuationError};

/// Machine-readable output wrapper shared by every `presale` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn success(meta: EnvelopeMeta, data: T) -> Self {
        Self {
            meta,
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(
        meta: EnvelopeMeta,
        data: T,
        errors: Vec<EnvelopeError>,
    ) -> Result<Self, ValidationError> {
        meta.validate()?;
        for error in &errors {
            error.validate()?;
        }
        Ok(Self { meta, data, errors })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    pub schema_version: String,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(
        request_id: impl Into<String>,
        schema_version: impl Into<String>,
        latency_ms: u64,
    ) -> Result<Self, ValidationError> {
        let meta = Self {
            request_id: request_id.into(),
            schema_version: schema_version.into(),
            generated_at: OffsetDateTime::now_utc(),
            latency_ms,
            warnings: Vec::new(),
        };
        meta.validate()?;
        Ok(meta)
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.request_id.trim().len() < 8 {
            return Err(ValidationError::InvalidRequestId);
        }
        if !is_valid_schema_version(&self.schema_version) {
            return Err(ValidationError::InvalidSchemaVersion {
                value: self.schema_version.clone(),
            });
        }
        Ok(())
    }
}

/// Structured error entry for failed commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
    /// Upstream HTTP status, for rate service failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl EnvelopeError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let error = Self {
            code: code.into(),
            message: message.into(),
            retryable: None,
            status: None,
        };
        error.validate()?;
        Ok(error)
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.code.trim().is_empty() {
            return Err(ValidationError::EmptyErrorCode);
        }
        if self.message.trim().is_empty() {
            return Err(ValidationError::EmptyErrorMessage);
        }
        Ok(())
    }
}

impl From<&ValuationError> for EnvelopeError {
    fn from(error: &ValuationError) -> Self {
        let status = match error {
            ValuationError::UpstreamUnavailable { status, .. } => *status,
            _ => None,
        };
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            retryable: Some(matches!(error, ValuationError::UpstreamUnavailable { .. })),
            status,
        }
    }
}

fn is_valid_schema_version(value: &str) -> bool {
    let Some(version) = value.strip_prefix('v') else {
        return false;
    };
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_schema_version() {
        let err = EnvelopeMeta::new("request-12345", "1.0", 0).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidSchemaVersion { .. }));
        assert!(EnvelopeMeta::new("request-12345", "v1.0.0", 0).is_ok());
    }

    #[test]
    fn upstream_errors_carry_status_and_are_retryable() {
        let error = EnvelopeError::from(&ValuationError::upstream(Some(503), None));
        assert_eq!(error.code, "valuation.upstream_unavailable");
        assert_eq!(error.status, Some(503));
        assert_eq!(error.retryable, Some(true));

        let error = EnvelopeError::from(&ValuationError::UnknownCurrency {
            code: String::from("XYZ"),
        });
        assert_eq!(error.retryable, Some(false));
        assert_eq!(error.status, None);
    }

    #[test]
    fn rejects_blank_error_message() {
        let err = EnvelopeError::new("valuation.store", " ").expect_err("must fail");
        assert_eq!(err, ValidationError::EmptyErrorMessage);
    }
}
