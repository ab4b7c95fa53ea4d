//! # Domain Models
//!
//! Validated value types shared by the rate provider, the repositories and
//! the valuation engine.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | Normalized currency or token symbol |
//! | [`Principal`] | User on whose behalf rates are fetched |
//! | [`Product`] | Sale product reference (id + ticker) |
//! | [`TokenPrice`] | Price per token at a sale stage |
//! | [`BonusTier`] | Purchase band with bonus percentage |
//! | [`TokenAllocation`] | Independently rounded token quantities |
//! | [`PurchaseValuation`] | Engine output |

mod models;
mod ticker;

pub use models::{
    BonusTier, CurrencyKind, Principal, Product, PurchaseValuation, TokenAllocation, TokenPrice,
};
pub use ticker::Ticker;
