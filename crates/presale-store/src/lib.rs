//! # Presale Store
//!
//! DuckDB-backed catalog for the token sale.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `products` | Tokens offered in the sale, unique by ticker |
//! | `prices` | Price per token, one row per (product, stage) |
//! | `token_rewards` | Bonus bands keyed by settlement-currency amount |
//! | `purchases` | Recorded purchase orders |
//! | `schema_migrations` | Applied migration versions |
//!
//! All values reach `DuckDB` as bound parameters; nothing user-provided is
//! interpolated into SQL text.
//!
//! ```rust,no_run
//! use presale_store::{NewProduct, Store};
//!
//! let store = Store::open_default()?;
//! let product = store.insert_product(&NewProduct {
//!     title: String::from("Divit"),
//!     ticker: String::from("dvt"),
//!     supply: 1_000_000,
//!     presale_percentage: 0.25,
//!     icon: None,
//!     start_date: None,
//!     end_date: None,
//! })?;
//! store.set_price(&product.id, 5, 0.05)?;
//! # Ok::<(), presale_store::StoreError>(())
//! ```

pub mod duckdb;
pub mod error;
pub mod migrations;
pub mod models;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{params, Connection, OptionalExt, Row};
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

pub use duckdb::{AccessMode, ConnectionPool, PooledConnection};
pub use error::StoreError;
pub use models::{
    NewProduct, NewPurchase, NewTokenReward, PriceRecord, ProductRecord, PurchaseRecord,
    TokenRewardRecord,
};

/// Maximum ticker length accepted for products.
pub const MAX_TICKER_LEN: usize = 7;

/// Location and pool sizing for the catalog database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for presale data.
    pub presale_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::at_home(resolve_presale_home())
    }
}

impl StoreConfig {
    /// Catalog rooted at `presale_home`, with the database under `catalog.duckdb`.
    pub fn at_home(presale_home: impl Into<PathBuf>) -> Self {
        let presale_home = presale_home.into();
        let db_path = presale_home.join("catalog.duckdb");
        Self {
            presale_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, title, ticker, supply, presale_percentage, icon, \
     CAST(start_date AS VARCHAR), CAST(end_date AS VARCHAR), status, created_at";
const PRICE_COLUMNS: &str = "product_id, stage, price, updated_at";
const REWARD_COLUMNS: &str = "id, purchase_band, swap, deposit_amount, reward_bonus";
const PURCHASE_COLUMNS: &str = "id, product_id, user_id, payment_amount, currency_ticker, \
     currency_type, token_amount, bonus, total_token, created_at";

/// Handle to the catalog database.
#[derive(Clone)]
pub struct Store {
    pool: ConnectionPool,
}

impl Store {
    /// Open the catalog at the default location (`$PRESALE_HOME` or `~/.presale`).
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(StoreConfig::default())
    }

    /// Open (creating if needed) the catalog and bring its schema up to date.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let store = Self { pool };
        store.initialize()?;
        info!(path = %store.db_path().display(), "catalog ready");
        Ok(store)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.pool.db_path()
    }

    // ---------------------------------------------------------------------
    // Products
    // ---------------------------------------------------------------------

    /// Insert a product. The ticker is trimmed and uppercased and must be unique.
    pub fn insert_product(&self, product: &NewProduct) -> Result<ProductRecord, StoreError> {
        let ticker = normalize_ticker(&product.ticker)?;
        if product.title.trim().is_empty() {
            return Err(StoreError::InvalidRecord(String::from(
                "product title must not be empty",
            )));
        }
        if !product.presale_percentage.is_finite() || product.presale_percentage < 0.0 {
            return Err(StoreError::InvalidRecord(String::from(
                "presale_percentage must be a non-negative number",
            )));
        }
        if self.product_by_ticker(&ticker)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "a product with ticker '{ticker}' already exists"
            )));
        }

        let id = Uuid::new_v4().to_string();
        let supply = to_i64(product.supply, "supply")?;
        let created_at = to_micros(OffsetDateTime::now_utc());

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute(
            "INSERT INTO products \
             (id, title, ticker, supply, presale_percentage, icon, start_date, end_date, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, CAST(? AS DATE), CAST(? AS DATE), TRUE, ?)",
            params![
                id,
                product.title.trim(),
                ticker,
                supply,
                product.presale_percentage,
                product.icon,
                product.start_date,
                product.end_date,
                created_at,
            ],
        )?;
        drop(connection);

        debug!(%id, %ticker, "inserted product");
        self.product(&id)?
            .ok_or_else(|| StoreError::InvalidRecord(format!("product '{id}' vanished after insert")))
    }

    pub fn product(&self, id: &str) -> Result<Option<ProductRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        connection
            .query_row(sql.as_str(), params![id], read_product)
            .optional()?
            .map(ProductRow::into_record)
            .transpose()
    }

    /// Look a product up by ticker, case-insensitively.
    pub fn product_by_ticker(&self, ticker: &str) -> Result<Option<ProductRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE ticker = ?");
        connection
            .query_row(
                sql.as_str(),
                params![ticker.trim().to_ascii_uppercase()],
                read_product,
            )
            .optional()?
            .map(ProductRow::into_record)
            .transpose()
    }

    pub fn products(&self, limit: usize) -> Result<Vec<ProductRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql =
            format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC LIMIT ?");
        collect_rows(
            &connection,
            sql.as_str(),
            params![to_i64(limit as u64, "limit")?],
            read_product,
        )?
        .into_iter()
        .map(ProductRow::into_record)
        .collect()
    }

    // ---------------------------------------------------------------------
    // Prices
    // ---------------------------------------------------------------------

    /// Set the price per token of `product_id` at `stage`, replacing any previous value.
    pub fn set_price(
        &self,
        product_id: &str,
        stage: u32,
        price: f64,
    ) -> Result<PriceRecord, StoreError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(StoreError::InvalidRecord(format!(
                "price must be a positive number, got {price}"
            )));
        }
        if self.product(product_id)?.is_none() {
            return Err(StoreError::InvalidRecord(format!(
                "unknown product '{product_id}'"
            )));
        }

        let updated_at = to_micros(OffsetDateTime::now_utc());
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute(
            "INSERT OR REPLACE INTO prices (product_id, stage, price, updated_at) VALUES (?, ?, ?, ?)",
            params![product_id, i64::from(stage), price, updated_at],
        )?;

        Ok(PriceRecord {
            product_id: product_id.to_string(),
            stage,
            price,
            updated_at: from_micros(updated_at)?,
        })
    }

    /// Price of the product with `ticker` at `stage`, if both exist.
    pub fn stage_price(&self, ticker: &str, stage: u32) -> Result<Option<PriceRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        connection
            .query_row(
                "SELECT p.product_id, p.stage, p.price, p.updated_at \
                 FROM prices p JOIN products pr ON pr.id = p.product_id \
                 WHERE pr.ticker = ? AND p.stage = ?",
                params![ticker.trim().to_ascii_uppercase(), i64::from(stage)],
                read_price,
            )
            .optional()?
            .map(PriceRow::into_record)
            .transpose()
    }

    /// All stage prices of a product, by ascending stage.
    pub fn prices(&self, product_id: &str) -> Result<Vec<PriceRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql = format!("SELECT {PRICE_COLUMNS} FROM prices WHERE product_id = ? ORDER BY stage");
        collect_rows(&connection, sql.as_str(), params![product_id], read_price)?
            .into_iter()
            .map(PriceRow::into_record)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Token rewards
    // ---------------------------------------------------------------------

    pub fn insert_token_reward(
        &self,
        reward: &NewTokenReward,
    ) -> Result<TokenRewardRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        insert_reward(&connection, &id, reward)?;
        Ok(reward_record(id, reward))
    }

    /// Replace the whole bonus table in one transaction.
    pub fn replace_token_rewards(
        &self,
        rewards: &[NewTokenReward],
    ) -> Result<Vec<TokenRewardRecord>, StoreError> {
        for reward in rewards {
            validate_reward(reward)?;
        }

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<Vec<TokenRewardRecord>, StoreError> {
            connection.execute("DELETE FROM token_rewards", [])?;
            let mut records = Vec::with_capacity(rewards.len());
            for reward in rewards {
                let id = Uuid::new_v4().to_string();
                insert_reward(&connection, &id, reward)?;
                records.push(reward_record(id, reward));
            }
            Ok(records)
        })();

        finalize_transaction(&connection, result)
    }

    pub fn token_reward(&self, id: &str) -> Result<Option<TokenRewardRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql = format!("SELECT {REWARD_COLUMNS} FROM token_rewards WHERE id = ?");
        connection
            .query_row(sql.as_str(), params![id], read_reward)
            .optional()?
            .map(RewardRow::into_record)
            .transpose()
    }

    /// Overwrite a reward band. Returns `false` when no band has that id.
    pub fn update_token_reward(
        &self,
        id: &str,
        reward: &NewTokenReward,
    ) -> Result<bool, StoreError> {
        validate_reward(reward)?;
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let changed = connection.execute(
            "UPDATE token_rewards SET purchase_band = ?, swap = ?, deposit_amount = ?, reward_bonus = ? \
             WHERE id = ?",
            params![
                i64::from(reward.purchase_band),
                to_i64(reward.swap, "swap")?,
                reward
                    .deposit_amount
                    .map(|value| to_i64(value, "deposit_amount"))
                    .transpose()?,
                reward.reward_bonus,
                id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Remove a reward band. Returns `false` when no band has that id.
    pub fn delete_token_reward(&self, id: &str) -> Result<bool, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        let changed = connection.execute("DELETE FROM token_rewards WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }

    /// The bonus table ordered by lower bound.
    pub fn token_rewards(&self) -> Result<Vec<TokenRewardRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql =
            format!("SELECT {REWARD_COLUMNS} FROM token_rewards ORDER BY swap, purchase_band");
        collect_rows(&connection, sql.as_str(), [], read_reward)?
            .into_iter()
            .map(RewardRow::into_record)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Purchases
    // ---------------------------------------------------------------------

    pub fn record_purchase(&self, purchase: &NewPurchase) -> Result<PurchaseRecord, StoreError> {
        if purchase.user_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord(String::from(
                "purchase user_id must not be empty",
            )));
        }

        let id = Uuid::new_v4().to_string();
        let created_at = to_micros(purchase.created_at);
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute(
            "INSERT INTO purchases \
             (id, product_id, user_id, payment_amount, currency_ticker, currency_type, \
              token_amount, bonus, total_token, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                purchase.product_id,
                purchase.user_id,
                purchase.payment_amount,
                purchase.currency_ticker,
                purchase.currency_type,
                to_i64(purchase.token_amount, "token_amount")?,
                to_i64(purchase.bonus, "bonus")?,
                to_i64(purchase.total_token, "total_token")?,
                created_at,
            ],
        )?;

        debug!(%id, user_id = %purchase.user_id, "recorded purchase");
        Ok(PurchaseRecord {
            id,
            product_id: purchase.product_id.clone(),
            user_id: purchase.user_id.clone(),
            payment_amount: purchase.payment_amount,
            currency_ticker: purchase.currency_ticker.clone(),
            currency_type: purchase.currency_type.clone(),
            token_amount: purchase.token_amount,
            bonus: purchase.bonus,
            total_token: purchase.total_token,
            created_at: from_micros(created_at)?,
        })
    }

    /// Most recent purchases first.
    pub fn purchases(&self, limit: usize) -> Result<Vec<PurchaseRecord>, StoreError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let sql =
            format!("SELECT {PURCHASE_COLUMNS} FROM purchases ORDER BY created_at DESC LIMIT ?");
        collect_rows(
            &connection,
            sql.as_str(),
            params![to_i64(limit as u64, "limit")?],
            read_purchase,
        )?
        .into_iter()
        .map(PurchaseRow::into_record)
        .collect()
    }
}

// -------------------------------------------------------------------------
// Row mapping
// -------------------------------------------------------------------------

struct ProductRow {
    id: String,
    title: String,
    ticker: String,
    supply: i64,
    presale_percentage: f64,
    icon: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    status: bool,
    created_at: i64,
}

fn read_product(row: &Row<'_>) -> Result<ProductRow, ::duckdb::Error> {
    Ok(ProductRow {
        id: row.get(0)?,
        title: row.get(1)?,
        ticker: row.get(2)?,
        supply: row.get(3)?,
        presale_percentage: row.get(4)?,
        icon: row.get(5)?,
        start_date: row.get(6)?,
        end_date: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl ProductRow {
    fn into_record(self) -> Result<ProductRecord, StoreError> {
        Ok(ProductRecord {
            supply: to_u64(self.supply, "supply")?,
            created_at: from_micros(self.created_at)?,
            id: self.id,
            title: self.title,
            ticker: self.ticker,
            presale_percentage: self.presale_percentage,
            icon: self.icon,
            start_date: self.start_date,
            end_date: self.end_date,
            status: self.status,
        })
    }
}

struct PriceRow {
    product_id: String,
    stage: i64,
    price: f64,
    updated_at: i64,
}

fn read_price(row: &Row<'_>) -> Result<PriceRow, ::duckdb::Error> {
    Ok(PriceRow {
        product_id: row.get(0)?,
        stage: row.get(1)?,
        price: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

impl PriceRow {
    fn into_record(self) -> Result<PriceRecord, StoreError> {
        Ok(PriceRecord {
            stage: u32::try_from(self.stage)
                .map_err(|_| StoreError::InvalidRecord(format!("stage {} out of range", self.stage)))?,
            updated_at: from_micros(self.updated_at)?,
            product_id: self.product_id,
            price: self.price,
        })
    }
}

struct RewardRow {
    id: String,
    purchase_band: i64,
    swap: i64,
    deposit_amount: Option<i64>,
    reward_bonus: f64,
}

fn read_reward(row: &Row<'_>) -> Result<RewardRow, ::duckdb::Error> {
    Ok(RewardRow {
        id: row.get(0)?,
        purchase_band: row.get(1)?,
        swap: row.get(2)?,
        deposit_amount: row.get(3)?,
        reward_bonus: row.get(4)?,
    })
}

impl RewardRow {
    fn into_record(self) -> Result<TokenRewardRecord, StoreError> {
        Ok(TokenRewardRecord {
            purchase_band: u32::try_from(self.purchase_band).map_err(|_| {
                StoreError::InvalidRecord(format!(
                    "purchase_band {} out of range",
                    self.purchase_band
                ))
            })?,
            swap: to_u64(self.swap, "swap")?,
            deposit_amount: self
                .deposit_amount
                .map(|value| to_u64(value, "deposit_amount"))
                .transpose()?,
            id: self.id,
            reward_bonus: self.reward_bonus,
        })
    }
}

struct PurchaseRow {
    id: String,
    product_id: String,
    user_id: String,
    payment_amount: f64,
    currency_ticker: String,
    currency_type: String,
    token_amount: i64,
    bonus: i64,
    total_token: i64,
    created_at: i64,
}

fn read_purchase(row: &Row<'_>) -> Result<PurchaseRow, ::duckdb::Error> {
    Ok(PurchaseRow {
        id: row.get(0)?,
        product_id: row.get(1)?,
        user_id: row.get(2)?,
        payment_amount: row.get(3)?,
        currency_ticker: row.get(4)?,
        currency_type: row.get(5)?,
        token_amount: row.get(6)?,
        bonus: row.get(7)?,
        total_token: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl PurchaseRow {
    fn into_record(self) -> Result<PurchaseRecord, StoreError> {
        Ok(PurchaseRecord {
            token_amount: to_u64(self.token_amount, "token_amount")?,
            bonus: to_u64(self.bonus, "bonus")?,
            total_token: to_u64(self.total_token, "total_token")?,
            created_at: from_micros(self.created_at)?,
            id: self.id,
            product_id: self.product_id,
            user_id: self.user_id,
            payment_amount: self.payment_amount,
            currency_ticker: self.currency_ticker,
            currency_type: self.currency_type,
        })
    }
}

// -------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------

fn collect_rows<T, P, F>(
    connection: &Connection,
    sql: &str,
    params: P,
    read: F,
) -> Result<Vec<T>, StoreError>
where
    P: ::duckdb::Params,
    F: FnMut(&Row<'_>) -> Result<T, ::duckdb::Error>,
{
    let mut statement = connection.prepare(sql)?;
    let rows = statement.query_map(params, read)?;
    let mut output = Vec::new();
    for row in rows {
        output.push(row?);
    }
    Ok(output)
}

fn insert_reward(
    connection: &Connection,
    id: &str,
    reward: &NewTokenReward,
) -> Result<(), StoreError> {
    validate_reward(reward)?;
    connection.execute(
        "INSERT INTO token_rewards (id, purchase_band, swap, deposit_amount, reward_bonus) \
         VALUES (?, ?, ?, ?, ?)",
        params![
            id,
            i64::from(reward.purchase_band),
            to_i64(reward.swap, "swap")?,
            reward
                .deposit_amount
                .map(|value| to_i64(value, "deposit_amount"))
                .transpose()?,
            reward.reward_bonus,
        ],
    )?;
    Ok(())
}

fn reward_record(id: String, reward: &NewTokenReward) -> TokenRewardRecord {
    TokenRewardRecord {
        id,
        purchase_band: reward.purchase_band,
        swap: reward.swap,
        deposit_amount: reward.deposit_amount,
        reward_bonus: reward.reward_bonus,
    }
}

fn validate_reward(reward: &NewTokenReward) -> Result<(), StoreError> {
    if !reward.reward_bonus.is_finite() || reward.reward_bonus < 0.0 {
        return Err(StoreError::InvalidRecord(format!(
            "reward_bonus must be a non-negative number, got {}",
            reward.reward_bonus
        )));
    }
    if let Some(upper) = reward.deposit_amount {
        if upper < reward.swap {
            return Err(StoreError::InvalidRecord(format!(
                "deposit_amount {upper} is below swap {}",
                reward.swap
            )));
        }
    }
    Ok(())
}

fn normalize_ticker(raw: &str) -> Result<String, StoreError> {
    let ticker = raw.trim().to_ascii_uppercase();
    if ticker.is_empty() || ticker.len() > MAX_TICKER_LEN {
        return Err(StoreError::InvalidRecord(format!(
            "ticker must be 1..={MAX_TICKER_LEN} characters: '{raw}'"
        )));
    }
    if !ticker.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(StoreError::InvalidRecord(format!(
            "ticker must be alphanumeric: '{raw}'"
        )));
    }
    Ok(ticker)
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn to_i64(value: u64, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{field} {value} does not fit the catalog")))
}

fn to_u64(value: i64, field: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::InvalidRecord(format!("{field} {value} is negative")))
}

fn to_micros(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000) as i64
}

fn from_micros(micros: i64) -> Result<OffsetDateTime, StoreError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(micros) * 1_000)
        .map_err(|error| StoreError::InvalidRecord(format!("timestamp {micros}: {error}")))
}

/// Resolve the presale home directory from environment or default.
fn resolve_presale_home() -> PathBuf {
    if let Some(path) = env::var_os("PRESALE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".presale");
    }

    PathBuf::from(".presale")
}
