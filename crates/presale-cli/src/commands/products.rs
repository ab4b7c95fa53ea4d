use presale_core::Store;
use presale_store::{NewProduct, PriceRecord, ProductRecord};
use serde::Serialize;

use crate::cli::{ProductAddArgs, ProductsArgs, ProductsCommand};
use crate::error::CliError;

use super::{resolve_product, CommandResult};

#[derive(Debug, Serialize)]
struct ProductListData {
    products: Vec<ProductRecord>,
}

#[derive(Debug, Serialize)]
struct ProductDetailData {
    product: ProductRecord,
    prices: Vec<PriceRecord>,
}

pub fn run(args: &ProductsArgs, store: &Store) -> Result<CommandResult, CliError> {
    match &args.command {
        ProductsCommand::Add(add) => {
            let product = store.insert_product(&new_product(add))?;
            Ok(CommandResult::ok(serde_json::to_value(product)?))
        }
        ProductsCommand::List(list) => {
            let products = store.products(list.limit)?;
            Ok(CommandResult::ok(serde_json::to_value(ProductListData {
                products,
            })?))
        }
        ProductsCommand::Show(reference) => {
            let product = resolve_product(store, &reference.product)?;
            let prices = store.prices(&product.id)?;
            let unpriced = prices.is_empty();
            let result =
                CommandResult::ok(serde_json::to_value(ProductDetailData { product, prices })?);
            if unpriced {
                return Ok(result.with_warning("product has no stage prices"));
            }
            Ok(result)
        }
    }
}

fn new_product(args: &ProductAddArgs) -> NewProduct {
    NewProduct {
        title: args.title.clone(),
        ticker: args.ticker.clone(),
        supply: args.supply,
        presale_percentage: args.presale_percentage,
        icon: args.icon.clone(),
        start_date: args.start_date.clone(),
        end_date: args.end_date.clone(),
    }
}
