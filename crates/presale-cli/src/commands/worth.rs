use presale_core::{PricedPurchase, Principal, ValuationEngine};
use serde::Serialize;

use crate::cli::ValuationArgs;
use crate::error::CliError;

use super::{purchase_request, CommandResult};

#[derive(Debug, Serialize)]
struct TokenWorthData {
    currency_ticker: String,
    rate: f64,
    payment_amount: f64,
    token_amount: u64,
    bonus: u64,
    total_token: u64,
}

impl From<&PricedPurchase> for TokenWorthData {
    fn from(priced: &PricedPurchase) -> Self {
        Self {
            currency_ticker: priced.currency_ticker.clone(),
            rate: priced.valuation.rate,
            payment_amount: priced.valuation.payment_amount,
            token_amount: priced.valuation.token.amount,
            bonus: priced.valuation.token.bonus,
            total_token: priced.valuation.token.total,
        }
    }
}

pub async fn run(args: &ValuationArgs, engine: &ValuationEngine) -> Result<CommandResult, CliError> {
    let principal = Principal::new(args.user.as_str())?;

    match engine.quote(&principal, &purchase_request(args)).await {
        Ok(priced) => Ok(CommandResult::ok(serde_json::to_value(
            TokenWorthData::from(&priced),
        )?)),
        Err(error) => Ok(CommandResult::failed(&error)),
    }
}
