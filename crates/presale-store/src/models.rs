use serde::Serialize;
use time::OffsetDateTime;

/// A token offered in the sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    /// Uppercase trading symbol, unique across products.
    pub ticker: String,
    pub supply: u64,
    pub presale_percentage: f64,
    pub icon: Option<String>,
    /// `YYYY-MM-DD`.
    pub start_date: Option<String>,
    /// `YYYY-MM-DD`.
    pub end_date: Option<String>,
    pub status: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for [`ProductRecord`]; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub title: String,
    pub ticker: String,
    pub supply: u64,
    pub presale_percentage: f64,
    pub icon: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Price per token for one product at one sale stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRecord {
    pub product_id: String,
    pub stage: u32,
    pub price: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// One purchase band of the bonus table.
///
/// `swap` is the inclusive lower bound, `deposit_amount` the inclusive upper
/// bound; `None` marks the open-ended top band.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRewardRecord {
    pub id: String,
    pub purchase_band: u32,
    pub swap: u64,
    pub deposit_amount: Option<u64>,
    pub reward_bonus: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTokenReward {
    pub purchase_band: u32,
    pub swap: u64,
    pub deposit_amount: Option<u64>,
    pub reward_bonus: f64,
}

/// A recorded token purchase order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseRecord {
    pub id: String,
    pub product_id: String,
    pub user_id: String,
    pub payment_amount: f64,
    pub currency_ticker: String,
    /// `fiat` or `crypto`.
    pub currency_type: String,
    pub token_amount: u64,
    pub bonus: u64,
    pub total_token: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPurchase {
    pub product_id: String,
    pub user_id: String,
    pub payment_amount: f64,
    pub currency_ticker: String,
    pub currency_type: String,
    pub token_amount: u64,
    pub bonus: u64,
    pub total_token: u64,
    pub created_at: OffsetDateTime,
}
