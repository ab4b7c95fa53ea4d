//! CLI argument definitions for `presale`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `worth` | Quote the tokens a payment buys (no writes) |
//! | `purchase` | Value a payment and record the purchase |
//! | `purchases` | List recorded purchases |
//! | `products` | Manage sale products |
//! | `prices` | Manage stage prices |
//! | `rewards` | Manage bonus bands |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--db` | `$PRESALE_HOME/catalog.duckdb` | Catalog database |
//! | `--stage` | `5` | Sale stage used for pricing |
//! | `--timeout-ms` | `3000` | Reference-rate request timeout |
//! | `--rates-file` | none | Read rates from a JSON file instead of the service |
//!
//! # Examples
//!
//! ```bash
//! presale products add --title Divit --ticker DVT --supply 10000000 --presale-percentage 0.2
//! presale prices set DVT --at-stage 5 --price 0.05
//! presale worth --product DVT --currency btc --amount 0.5 --user 42 --pretty
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Token sale valuation and catalog CLI.
#[derive(Debug, Parser)]
#[command(
    name = "presale",
    author,
    version,
    about = "Token sale valuation and catalog CLI",
    long_about = "presale values token purchases against live reference rates, the \
stage price of the product and the bonus bands, and manages the catalog rows \
those valuations read.\n\
\n\
Use 'presale <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log at debug level (otherwise `RUST_LOG`, default `warn`).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Catalog database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Sale stage whose price is used for valuation.
    #[arg(long, global = true)]
    pub stage: Option<u32>,

    /// Reference-rate request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Reference-rate payload (`{"data":[{"currency","rate"}]}`) to use offline.
    #[arg(long, global = true)]
    pub rates_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Quote the tokens a payment buys.
    ///
    /// # Examples
    ///
    ///   presale worth --product DVT --currency usd --amount 500 --user 42
    ///   presale worth --product DVT --currency sol --amount 3 --user 42 --pretty
    Worth(ValuationArgs),

    /// Value a payment and record it as a purchase.
    Purchase(ValuationArgs),

    /// Recorded purchases.
    Purchases(PurchasesArgs),

    /// Sale products.
    Products(ProductsArgs),

    /// Stage prices.
    Prices(PricesArgs),

    /// Bonus bands keyed by settlement-currency amount.
    Rewards(RewardsArgs),
}

/// Arguments shared by `worth` and `purchase`.
#[derive(Debug, Args)]
pub struct ValuationArgs {
    /// Product id or ticker.
    #[arg(long)]
    pub product: String,

    /// Payment currency (usd, eur, gbp or any crypto in the rate table).
    #[arg(long)]
    pub currency: String,

    /// Payment amount; kept as text so it is validated like any request.
    #[arg(long)]
    pub amount: String,

    /// User the valuation runs for; sent to the rate service.
    #[arg(long, env = "PRESALE_USER")]
    pub user: String,
}

#[derive(Debug, Args)]
pub struct PurchasesArgs {
    #[command(subcommand)]
    pub command: PurchasesCommand,
}

#[derive(Debug, Subcommand)]
pub enum PurchasesCommand {
    /// Newest purchases first.
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ProductsArgs {
    #[command(subcommand)]
    pub command: ProductsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProductsCommand {
    Add(ProductAddArgs),
    List(ListArgs),
    /// Show a product with its stage prices.
    Show(ProductRef),
}

#[derive(Debug, Args)]
pub struct ProductAddArgs {
    #[arg(long)]
    pub title: String,

    /// Up to 7 alphanumeric characters; stored uppercase.
    #[arg(long)]
    pub ticker: String,

    #[arg(long)]
    pub supply: u64,

    #[arg(long)]
    pub presale_percentage: f64,

    #[arg(long)]
    pub icon: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    pub end_date: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProductRef {
    /// Product id or ticker.
    pub product: String,
}

#[derive(Debug, Args)]
pub struct PricesArgs {
    #[command(subcommand)]
    pub command: PricesCommand,
}

#[derive(Debug, Subcommand)]
pub enum PricesCommand {
    /// Set (or replace) the price of a product at a stage.
    Set(PriceSetArgs),
    List(ProductRef),
}

#[derive(Debug, Args)]
pub struct PriceSetArgs {
    /// Product id or ticker.
    pub product: String,

    #[arg(long = "at-stage")]
    pub stage: u32,

    #[arg(long)]
    pub price: f64,
}

#[derive(Debug, Args)]
pub struct RewardsArgs {
    #[command(subcommand)]
    pub command: RewardsCommand,
}

#[derive(Debug, Subcommand)]
pub enum RewardsCommand {
    Add(RewardFields),
    List,
    Show(RewardRef),
    Update(RewardUpdateArgs),
    Delete(RewardRef),
}

#[derive(Debug, Args)]
pub struct RewardFields {
    #[arg(long)]
    pub purchase_band: u32,

    /// Lowest settlement amount of the band.
    #[arg(long)]
    pub swap: u64,

    /// Highest settlement amount of the band; omit for the open-ended top band.
    #[arg(long)]
    pub deposit_amount: Option<u64>,

    /// Bonus percentage.
    #[arg(long)]
    pub reward_bonus: f64,
}

#[derive(Debug, Args)]
pub struct RewardRef {
    pub id: String,
}

#[derive(Debug, Args)]
pub struct RewardUpdateArgs {
    pub id: String,

    #[command(flatten)]
    pub fields: RewardFields,
}
