use crate::domain::bot::Bot;
use crate::domain::ports::BotRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteBotRepository {
    pool: SqlitePool,
}

impl SqliteBotRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }

    fn row_to_bot(row: &sqlx::sqlite::SqliteRow) -> Result<Bot> {
        let coins_json: String = row.try_get("coins_json")?;
        let allocation_percent: Option<String> = row.try_get("allocation_percent")?;
        let manual_budget_amount: Option<String> = row.try_get("manual_budget_amount")?;
        let take_profit_percent: Option<String> = row.try_get("take_profit_percent")?;

        Ok(Bot {
            bot_id: row.try_get("bot_id")?,
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            coins: serde_json::from_str(&coins_json).context("invalid coins_json")?,
            initial_coin: row.try_get("initial_coin")?,
            current_coin: row.try_get("current_coin")?,
            threshold_percent: decimal_col(row, "threshold_percent")?,
            global_threshold_percent: decimal_col(row, "global_threshold_percent")?,
            check_interval_minutes: row.try_get("check_interval_minutes")?,
            commission_rate: decimal_col(row, "commission_rate")?,
            preferred_stablecoin: row.try_get("preferred_stablecoin")?,
            reference_coin: row.try_get("reference_coin")?,
            allocation_percent: allocation_percent
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .context("invalid allocation_percent")?,
            manual_budget_amount: manual_budget_amount
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .context("invalid manual_budget_amount")?,
            use_take_profit: row.try_get("use_take_profit")?,
            take_profit_percent: take_profit_percent
                .map(|s| Decimal::from_str(&s))
                .transpose()
                .context("invalid take_profit_percent")?,
            enabled: row.try_get("enabled")?,
            last_check_time: row.try_get("last_check_time")?,
            global_peak_value: decimal_col(row, "global_peak_value")?,
            global_peak_value_in_eth: decimal_col(row, "global_peak_value_in_eth")?,
            total_commissions_paid: decimal_col(row, "total_commissions_paid")?,
            account_id: row.try_get("account_id")?,
        })
    }
}

fn decimal_col(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<Decimal> {
    let raw: String = row.try_get(name)?;
    Decimal::from_str(&raw).with_context(|| format!("invalid decimal column {name}"))
}

#[async_trait]
impl BotRepository for SqliteBotRepository {
    async fn find(&self, bot_id: &str) -> Result<Option<Bot>> {
        let row = sqlx::query("SELECT * FROM bots WHERE bot_id = ?")
            .bind(bot_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load bot")?;
        row.as_ref().map(Self::row_to_bot).transpose()
    }

    async fn find_enabled(&self) -> Result<Vec<Bot>> {
        let rows = sqlx::query("SELECT * FROM bots WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load enabled bots")?;
        rows.iter().map(Self::row_to_bot).collect()
    }

    async fn save(&self, bot: &Bot) -> Result<()> {
        let coins_json = serde_json::to_string(&bot.coins)?;
        sqlx::query(
            r#"
            INSERT INTO bots (
                bot_id, user_id, name, coins_json, initial_coin, current_coin,
                threshold_percent, global_threshold_percent, check_interval_minutes,
                commission_rate, preferred_stablecoin, reference_coin,
                allocation_percent, manual_budget_amount, use_take_profit,
                take_profit_percent, enabled, last_check_time, global_peak_value,
                global_peak_value_in_eth, total_commissions_paid, account_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bot_id) DO UPDATE SET
                user_id = excluded.user_id,
                name = excluded.name,
                coins_json = excluded.coins_json,
                initial_coin = excluded.initial_coin,
                current_coin = excluded.current_coin,
                threshold_percent = excluded.threshold_percent,
                global_threshold_percent = excluded.global_threshold_percent,
                check_interval_minutes = excluded.check_interval_minutes,
                commission_rate = excluded.commission_rate,
                preferred_stablecoin = excluded.preferred_stablecoin,
                reference_coin = excluded.reference_coin,
                allocation_percent = excluded.allocation_percent,
                manual_budget_amount = excluded.manual_budget_amount,
                use_take_profit = excluded.use_take_profit,
                take_profit_percent = excluded.take_profit_percent,
                enabled = excluded.enabled,
                last_check_time = excluded.last_check_time,
                global_peak_value = excluded.global_peak_value,
                global_peak_value_in_eth = excluded.global_peak_value_in_eth,
                total_commissions_paid = excluded.total_commissions_paid,
                account_id = excluded.account_id
            "#,
        )
        .bind(&bot.bot_id)
        .bind(&bot.user_id)
        .bind(&bot.name)
        .bind(coins_json)
        .bind(&bot.initial_coin)
        .bind(&bot.current_coin)
        .bind(bot.threshold_percent.to_string())
        .bind(bot.global_threshold_percent.to_string())
        .bind(bot.check_interval_minutes)
        .bind(bot.commission_rate.to_string())
        .bind(&bot.preferred_stablecoin)
        .bind(&bot.reference_coin)
        .bind(bot.allocation_percent.map(|d| d.to_string()))
        .bind(bot.manual_budget_amount.map(|d| d.to_string()))
        .bind(bot.use_take_profit)
        .bind(bot.take_profit_percent.map(|d| d.to_string()))
        .bind(bot.enabled)
        .bind(bot.last_check_time)
        .bind(bot.global_peak_value.to_string())
        .bind(bot.global_peak_value_in_eth.to_string())
        .bind(bot.total_commissions_paid.to_string())
        .bind(&bot.account_id)
        .execute(&self.pool)
        .await
        .context("Failed to save bot")?;

        Ok(())
    }
}
