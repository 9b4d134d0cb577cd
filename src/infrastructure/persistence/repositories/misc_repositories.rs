//! Smaller append-only repositories that don't warrant their own module:
//! missed trades, price history, bot resets, deviation log entries, and
//! the structured log sink.

use crate::domain::deviation::CoinDeviationRecord;
use crate::domain::lock::PriceHistoryEntry;
use crate::domain::ports::{
    BotResetRepository, DeviationLogRepository, LogLevel, LogRepository, MissedTradeRepository,
    PriceHistoryRepository,
};
use crate::domain::trade::{BotResetEvent, MissedTrade};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteMissedTradeRepository {
    pool: SqlitePool,
}

impl SqliteMissedTradeRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

#[async_trait]
impl MissedTradeRepository for SqliteMissedTradeRepository {
    async fn record(&self, missed: &MissedTrade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO missed_trades (bot_id, from_coin, to_coin, reason_code, context, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&missed.bot_id)
        .bind(&missed.from_coin)
        .bind(&missed.to_coin)
        .bind(&missed.reason_code)
        .bind(&missed.context)
        .bind(missed.recorded_at)
        .execute(&self.pool)
        .await
        .context("Failed to record missed trade")?;
        Ok(())
    }
}

pub struct SqlitePriceHistoryRepository {
    pool: SqlitePool,
}

impl SqlitePriceHistoryRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

#[async_trait]
impl PriceHistoryRepository for SqlitePriceHistoryRepository {
    async fn record(&self, entry: &PriceHistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_history (bot_id, coin, price, source, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.bot_id)
        .bind(&entry.coin)
        .bind(entry.price.to_string())
        .bind(&entry.source)
        .bind(entry.recorded_at)
        .execute(&self.pool)
        .await
        .context("Failed to record price history entry")?;
        Ok(())
    }
}

pub struct SqliteBotResetRepository {
    pool: SqlitePool,
}

impl SqliteBotResetRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

#[async_trait]
impl BotResetRepository for SqliteBotResetRepository {
    async fn record(&self, event: &BotResetEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_reset_events (bot_id, reset_at, reason)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&event.bot_id)
        .bind(event.reset_at)
        .bind(&event.reason)
        .execute(&self.pool)
        .await
        .context("Failed to record bot reset event")?;
        Ok(())
    }
}

pub struct SqliteDeviationLogRepository {
    pool: SqlitePool,
}

impl SqliteDeviationLogRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

#[async_trait]
impl DeviationLogRepository for SqliteDeviationLogRepository {
    async fn record(&self, entry: &CoinDeviationRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_deviations (bot_id, base, target, base_price, target_price, deviation_percent, timestamp)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.bot_id)
        .bind(&entry.base)
        .bind(&entry.target)
        .bind(entry.base_price.to_string())
        .bind(entry.target_price.to_string())
        .bind(entry.deviation_percent.to_string())
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to record deviation entry")?;
        Ok(())
    }
}

pub struct SqliteLogRepository {
    pool: SqlitePool,
}

impl SqliteLogRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }
}

fn level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "info",
        LogLevel::Warning => "warning",
        LogLevel::Error => "error",
        LogLevel::Trade => "trade",
    }
}

#[async_trait]
impl LogRepository for SqliteLogRepository {
    async fn append(&self, level: LogLevel, target: &str, message: &str, bot_id: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO log_entries (level, target, message, bot_id)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(level_str(level))
        .bind(target)
        .bind(message)
        .bind(bot_id)
        .execute(&self.pool)
        .await
        .context("Failed to append log entry")?;
        Ok(())
    }
}
