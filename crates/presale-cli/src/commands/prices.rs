use presale_core::Store;
use presale_store::PriceRecord;
use serde::Serialize;

use crate::cli::{PricesArgs, PricesCommand};
use crate::error::CliError;

use super::{resolve_product, CommandResult};

#[derive(Debug, Serialize)]
struct PriceListData {
    product_id: String,
    ticker: String,
    prices: Vec<PriceRecord>,
}

pub fn run(args: &PricesArgs, store: &Store) -> Result<CommandResult, CliError> {
    match &args.command {
        PricesCommand::Set(set) => {
            let product = resolve_product(store, &set.product)?;
            let price = store.set_price(&product.id, set.stage, set.price)?;
            Ok(CommandResult::ok(serde_json::to_value(price)?))
        }
        PricesCommand::List(reference) => {
            let product = resolve_product(store, &reference.product)?;
            let prices = store.prices(&product.id)?;
            Ok(CommandResult::ok(serde_json::to_value(PriceListData {
                product_id: product.id,
                ticker: product.ticker,
                prices,
            })?))
        }
    }
}
