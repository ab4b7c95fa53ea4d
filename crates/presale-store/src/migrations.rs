use ::duckdb::{params, Connection};
use tracing::info;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_catalog_tables",
        sql: r#"
CREATE TABLE IF NOT EXISTS products (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    ticker TEXT NOT NULL UNIQUE,
    supply BIGINT NOT NULL,
    presale_percentage DOUBLE NOT NULL DEFAULT 0,
    icon TEXT,
    start_date DATE,
    end_date DATE,
    status BOOLEAN NOT NULL DEFAULT TRUE,
    created_at BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS prices (
    product_id TEXT NOT NULL,
    stage INTEGER NOT NULL,
    price DOUBLE NOT NULL,
    updated_at BIGINT NOT NULL,
    PRIMARY KEY(product_id, stage)
);

CREATE TABLE IF NOT EXISTS token_rewards (
    id TEXT PRIMARY KEY,
    purchase_band INTEGER NOT NULL,
    swap BIGINT NOT NULL,
    deposit_amount BIGINT,
    reward_bonus DOUBLE NOT NULL
);

CREATE TABLE IF NOT EXISTS purchases (
    id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    payment_amount DOUBLE NOT NULL,
    currency_ticker TEXT NOT NULL,
    currency_type TEXT NOT NULL,
    token_amount BIGINT NOT NULL,
    bonus BIGINT NOT NULL,
    total_token BIGINT NOT NULL,
    created_at BIGINT NOT NULL
);
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_purchases_created_at ON purchases(created_at);
CREATE INDEX IF NOT EXISTS idx_purchases_user ON purchases(user_id);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
            info!(version = migration.version, "applied catalog migration");
        }
    }

    Ok(())
}
