use crate::domain::ports::TradeRepository;
use crate::domain::trade::{Trade, TradeStatus, TradeStep};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }

    fn row_to_trade(row: &sqlx::sqlite::SqliteRow) -> Result<Trade> {
        let to_amount: Option<String> = row.try_get("to_amount")?;
        let from_price: Option<String> = row.try_get("from_price")?;
        let to_price: Option<String> = row.try_get("to_price")?;
        let status: String = row.try_get("status")?;
        Ok(Trade {
            id: row.try_get("id")?,
            trade_id: row.try_get("trade_id")?,
            bot_id: row.try_get("bot_id")?,
            from_coin: row.try_get("from_coin")?,
            to_coin: row.try_get("to_coin")?,
            from_amount: decimal_col(row, "from_amount")?,
            to_amount: to_amount.map(|s| Decimal::from_str(&s)).transpose()?,
            from_price: from_price.map(|s| Decimal::from_str(&s)).transpose()?,
            to_price: to_price.map(|s| Decimal::from_str(&s)).transpose()?,
            commission_amount: decimal_col(row, "commission_amount")?,
            commission_rate: decimal_col(row, "commission_rate")?,
            status: parse_status(&status)?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<TradeStep> {
        let status: String = row.try_get("status")?;
        let raw_data: String = row.try_get("raw_data")?;
        Ok(TradeStep {
            parent_trade_id: row.try_get("parent_trade_id")?,
            step_number: row.try_get::<i64, _>("step_number")? as u8,
            trade_id: row.try_get("trade_id")?,
            from_coin: row.try_get("from_coin")?,
            to_coin: row.try_get("to_coin")?,
            from_amount: decimal_col(row, "from_amount")?,
            to_amount: decimal_col(row, "to_amount")?,
            from_price: decimal_col(row, "from_price")?,
            to_price: decimal_col(row, "to_price")?,
            commission_amount: decimal_col(row, "commission_amount")?,
            commission_rate: decimal_col(row, "commission_rate")?,
            status: parse_status(&status)?,
            executed_at: row.try_get("executed_at")?,
            completed_at: row.try_get("completed_at")?,
            raw_data: serde_json::from_str(&raw_data).context("invalid raw_data")?,
        })
    }
}

fn decimal_col(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<Decimal> {
    let raw: String = row.try_get(name)?;
    Decimal::from_str(&raw).with_context(|| format!("invalid decimal column {name}"))
}

fn status_str(status: TradeStatus) -> &'static str {
    match status {
        TradeStatus::InProgress => "in_progress",
        TradeStatus::Completed => "completed",
        TradeStatus::Failed => "failed",
    }
}

fn parse_status(raw: &str) -> Result<TradeStatus> {
    match raw {
        "in_progress" => Ok(TradeStatus::InProgress),
        "completed" => Ok(TradeStatus::Completed),
        "failed" => Ok(TradeStatus::Failed),
        other => anyhow::bail!("unknown trade status {other}"),
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn save_parent(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, trade_id, bot_id, from_coin, to_coin, from_amount, to_amount,
                from_price, to_price, commission_amount, commission_rate, status,
                created_at, completed_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                trade_id = excluded.trade_id,
                to_amount = excluded.to_amount,
                from_price = excluded.from_price,
                to_price = excluded.to_price,
                commission_amount = excluded.commission_amount,
                status = excluded.status,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.trade_id)
        .bind(&trade.bot_id)
        .bind(&trade.from_coin)
        .bind(&trade.to_coin)
        .bind(trade.from_amount.to_string())
        .bind(trade.to_amount.map(|d| d.to_string()))
        .bind(trade.from_price.map(|d| d.to_string()))
        .bind(trade.to_price.map(|d| d.to_string()))
        .bind(trade.commission_amount.to_string())
        .bind(trade.commission_rate.to_string())
        .bind(status_str(trade.status))
        .bind(trade.created_at)
        .bind(trade.completed_at)
        .execute(&self.pool)
        .await
        .context("Failed to save parent trade")?;
        Ok(())
    }

    async fn save_step(&self, step: &TradeStep) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_steps (
                parent_trade_id, step_number, trade_id, from_coin, to_coin,
                from_amount, to_amount, from_price, to_price, commission_amount,
                commission_rate, status, executed_at, completed_at, raw_data
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(parent_trade_id, step_number) DO UPDATE SET
                trade_id = excluded.trade_id,
                to_amount = excluded.to_amount,
                to_price = excluded.to_price,
                commission_amount = excluded.commission_amount,
                status = excluded.status,
                completed_at = excluded.completed_at,
                raw_data = excluded.raw_data
            "#,
        )
        .bind(&step.parent_trade_id)
        .bind(step.step_number as i64)
        .bind(&step.trade_id)
        .bind(&step.from_coin)
        .bind(&step.to_coin)
        .bind(step.from_amount.to_string())
        .bind(step.to_amount.to_string())
        .bind(step.from_price.to_string())
        .bind(step.to_price.to_string())
        .bind(step.commission_amount.to_string())
        .bind(step.commission_rate.to_string())
        .bind(status_str(step.status))
        .bind(step.executed_at)
        .bind(step.completed_at)
        .bind(step.raw_data.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save trade step")?;
        Ok(())
    }

    async fn find_parent(&self, id: &str) -> Result<Option<Trade>> {
        let row = sqlx::query("SELECT * FROM trades WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load parent trade")?;
        row.as_ref().map(Self::row_to_trade).transpose()
    }

    async fn find_steps(&self, parent_trade_id: &str) -> Result<Vec<TradeStep>> {
        let rows = sqlx::query(
            "SELECT * FROM trade_steps WHERE parent_trade_id = ? ORDER BY step_number ASC",
        )
        .bind(parent_trade_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load trade steps")?;
        rows.iter().map(Self::row_to_step).collect()
    }
}
