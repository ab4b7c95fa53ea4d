use presale_core::{Principal, Store, ValuationEngine};
use presale_store::{NewPurchase, PurchaseRecord};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::cli::{ListArgs, ValuationArgs};
use crate::error::CliError;

use super::{purchase_request, CommandResult};

#[derive(Debug, Serialize)]
struct PurchaseData {
    amount: f64,
    currency: String,
    document: PurchaseDocument,
}

#[derive(Debug, Serialize)]
struct PurchaseDocument {
    id: String,
    object: &'static str,
    meta: PurchaseRecord,
}

#[derive(Debug, Serialize)]
struct PurchaseListData {
    purchases: Vec<PurchaseRecord>,
}

/// Value the payment, then persist it. Nothing is written if valuation fails.
pub async fn run(
    args: &ValuationArgs,
    engine: &ValuationEngine,
    store: &Store,
) -> Result<CommandResult, CliError> {
    let principal = Principal::new(args.user.as_str())?;

    let priced = match engine.quote(&principal, &purchase_request(args)).await {
        Ok(priced) => priced,
        Err(error) => return Ok(CommandResult::failed(&error)),
    };

    let record = store.record_purchase(&NewPurchase {
        product_id: priced.product.id.clone(),
        user_id: principal.to_string(),
        payment_amount: priced.valuation.payment_amount,
        currency_ticker: priced.currency_ticker.clone(),
        currency_type: priced.valuation.currency_type.as_str().to_string(),
        token_amount: priced.valuation.token.amount,
        bonus: priced.valuation.token.bonus,
        total_token: priced.valuation.token.total,
        created_at: OffsetDateTime::now_utc(),
    })?;
    info!(id = %record.id, product = %priced.product.ticker, total = record.total_token, "purchase recorded");

    let data = PurchaseData {
        amount: record.payment_amount,
        currency: record.currency_ticker.clone(),
        document: PurchaseDocument {
            id: record.id.clone(),
            object: "Purchase",
            meta: record,
        },
    };
    Ok(CommandResult::ok(serde_json::to_value(data)?))
}

pub fn list(args: &ListArgs, store: &Store) -> Result<CommandResult, CliError> {
    let purchases = store.purchases(args.limit)?;
    let result = CommandResult::ok(serde_json::to_value(PurchaseListData { purchases })?);
    if args.limit == 0 {
        return Ok(result.with_warning("--limit 0 returns no rows"));
    }
    Ok(result)
}
