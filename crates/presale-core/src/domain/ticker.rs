use std::fmt::{Display, Formatter};

use presale_store::MAX_TICKER_LEN;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Uppercase currency or token symbol (`USD`, `SOL`, a product ticker).
///
/// Same shape the catalog stores: 1 to 7 ASCII letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse and normalize a ticker to uppercase.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTicker);
        }

        let normalized = trimmed.to_ascii_uppercase();
        let len = normalized.chars().count();
        if len > MAX_TICKER_LEN {
            return Err(ValidationError::TickerTooLong {
                len,
                max: MAX_TICKER_LEN,
            });
        }

        for (index, ch) in normalized.chars().enumerate() {
            if !ch.is_ascii_alphanumeric() {
                return Err(ValidationError::TickerInvalidChar { ch, index });
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Ticker {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Ticker {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_normalizes_ticker() {
        let parsed = Ticker::parse(" sol ").expect("ticker should parse");
        assert_eq!(parsed.as_str(), "SOL");
    }

    #[test]
    fn accepts_leading_digit() {
        assert_eq!(Ticker::parse("1inch").expect("parse").as_str(), "1INCH");
    }

    #[test]
    fn rejects_invalid_chars() {
        let err = Ticker::parse("US D").expect_err("must fail");
        assert!(matches!(err, ValidationError::TickerInvalidChar { index: 2, .. }));
    }

    #[test]
    fn matches_catalog_ticker_rules() {
        assert_eq!(Ticker::parse("abcdefg").expect("seven").as_str(), "ABCDEFG");
        assert_eq!(
            Ticker::parse("ABCDEFGH"),
            Err(ValidationError::TickerTooLong { len: 8, max: 7 })
        );
        assert!(matches!(
            Ticker::parse("BRK.B"),
            Err(ValidationError::TickerInvalidChar { ch: '.', index: 3 })
        ));
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Ticker::parse("   "), Err(ValidationError::EmptyTicker));
    }
}
