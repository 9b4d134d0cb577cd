use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Singleton database wrapper.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Connected to database: {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema. Every table is created idempotently so
    /// repeated starts against an existing file are a no-op.
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bots (
                bot_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                coins_json TEXT NOT NULL,
                initial_coin TEXT NOT NULL,
                current_coin TEXT,
                threshold_percent TEXT NOT NULL,
                global_threshold_percent TEXT NOT NULL,
                check_interval_minutes INTEGER NOT NULL,
                commission_rate TEXT NOT NULL,
                preferred_stablecoin TEXT NOT NULL,
                reference_coin TEXT NOT NULL,
                allocation_percent TEXT,
                manual_budget_amount TEXT,
                use_take_profit BOOLEAN NOT NULL DEFAULT 0,
                take_profit_percent TEXT,
                enabled BOOLEAN NOT NULL DEFAULT 1,
                last_check_time TEXT,
                global_peak_value TEXT NOT NULL,
                global_peak_value_in_eth TEXT NOT NULL,
                total_commissions_paid TEXT NOT NULL,
                account_id TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create bots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_assets (
                bot_id TEXT NOT NULL,
                coin TEXT NOT NULL,
                amount TEXT NOT NULL,
                entry_price TEXT NOT NULL,
                stablecoin_equivalent TEXT NOT NULL,
                last_updated TEXT NOT NULL,
                PRIMARY KEY (bot_id, coin)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create bot_assets table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_snapshots (
                bot_id TEXT NOT NULL,
                coin TEXT NOT NULL,
                initial_price TEXT NOT NULL,
                snapshot_timestamp TEXT NOT NULL,
                units_held TEXT NOT NULL,
                eth_equivalent_value TEXT NOT NULL,
                was_ever_held BOOLEAN NOT NULL DEFAULT 0,
                max_units_reached TEXT NOT NULL,
                UNIQUE (bot_id, coin)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create coin_snapshots table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_unit_trackers (
                bot_id TEXT NOT NULL,
                coin TEXT NOT NULL,
                units TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (bot_id, coin)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create coin_unit_trackers table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS coin_deviations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                base TEXT NOT NULL,
                target TEXT NOT NULL,
                base_price TEXT NOT NULL,
                target_price TEXT NOT NULL,
                deviation_percent TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_coin_deviations_bot_time
            ON coin_deviations (bot_id, timestamp);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create coin_deviations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                trade_id TEXT,
                bot_id TEXT NOT NULL,
                from_coin TEXT NOT NULL,
                to_coin TEXT NOT NULL,
                from_amount TEXT NOT NULL,
                to_amount TEXT,
                from_price TEXT,
                to_price TEXT,
                commission_amount TEXT NOT NULL,
                commission_rate TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_trades_bot_created
            ON trades (bot_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_trades_trade_id
            ON trades (trade_id);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_steps (
                parent_trade_id TEXT NOT NULL,
                step_number INTEGER NOT NULL,
                trade_id TEXT NOT NULL,
                from_coin TEXT NOT NULL,
                to_coin TEXT NOT NULL,
                from_amount TEXT NOT NULL,
                to_amount TEXT NOT NULL,
                from_price TEXT NOT NULL,
                to_price TEXT NOT NULL,
                commission_amount TEXT NOT NULL,
                commission_rate TEXT NOT NULL,
                status TEXT NOT NULL,
                executed_at TEXT NOT NULL,
                completed_at TEXT,
                raw_data TEXT NOT NULL,
                PRIMARY KEY (parent_trade_id, step_number),
                FOREIGN KEY (parent_trade_id) REFERENCES trades (id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trade_steps table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS missed_trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                from_coin TEXT NOT NULL,
                to_coin TEXT NOT NULL,
                reason_code TEXT NOT NULL,
                context TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create missed_trades table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS asset_locks (
                lock_id TEXT PRIMARY KEY,
                bot_id TEXT NOT NULL,
                coin TEXT NOT NULL,
                amount TEXT NOT NULL,
                reason TEXT NOT NULL,
                status TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_asset_locks_coin_status
            ON asset_locks (coin, status, expires_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create asset_locks table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bot_reset_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                reset_at TEXT NOT NULL,
                reason TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create bot_reset_events table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id TEXT NOT NULL,
                coin TEXT NOT NULL,
                price TEXT NOT NULL,
                source TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_price_history_bot_coin_time
            ON price_history (bot_id, coin, recorded_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create price_history table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS log_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                target TEXT NOT NULL,
                message TEXT NOT NULL,
                bot_id TEXT,
                recorded_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create log_entries table")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
