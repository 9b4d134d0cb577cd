use crate::domain::ports::SnapshotRepository;
use crate::domain::snapshot::{CoinSnapshot, CoinUnitTracker};
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteSnapshotRepository {
    pool: SqlitePool,
}

impl SqliteSnapshotRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }

    fn row_to_snapshot(row: &sqlx::sqlite::SqliteRow) -> Result<CoinSnapshot> {
        Ok(CoinSnapshot {
            bot_id: row.try_get("bot_id")?,
            coin: row.try_get("coin")?,
            initial_price: decimal_col(row, "initial_price")?,
            snapshot_timestamp: row.try_get("snapshot_timestamp")?,
            units_held: decimal_col(row, "units_held")?,
            eth_equivalent_value: decimal_col(row, "eth_equivalent_value")?,
            was_ever_held: row.try_get("was_ever_held")?,
            max_units_reached: decimal_col(row, "max_units_reached")?,
        })
    }
}

fn decimal_col(row: &sqlx::sqlite::SqliteRow, name: &str) -> Result<Decimal> {
    let raw: String = row.try_get(name)?;
    Decimal::from_str(&raw).with_context(|| format!("invalid decimal column {name}"))
}

#[async_trait]
impl SnapshotRepository for SqliteSnapshotRepository {
    async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<CoinSnapshot>> {
        let row = sqlx::query("SELECT * FROM coin_snapshots WHERE bot_id = ? AND coin = ?")
            .bind(bot_id)
            .bind(coin)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load snapshot")?;
        row.as_ref().map(Self::row_to_snapshot).transpose()
    }

    async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<CoinSnapshot>> {
        let rows = sqlx::query("SELECT * FROM coin_snapshots WHERE bot_id = ?")
            .bind(bot_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load snapshots for bot")?;
        rows.iter().map(Self::row_to_snapshot).collect()
    }

    async fn upsert(&self, snapshot: &CoinSnapshot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_snapshots (
                bot_id, coin, initial_price, snapshot_timestamp, units_held,
                eth_equivalent_value, was_ever_held, max_units_reached
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bot_id, coin) DO UPDATE SET
                snapshot_timestamp = excluded.snapshot_timestamp,
                units_held = excluded.units_held,
                eth_equivalent_value = excluded.eth_equivalent_value,
                was_ever_held = excluded.was_ever_held,
                max_units_reached = excluded.max_units_reached
            "#,
        )
        .bind(&snapshot.bot_id)
        .bind(&snapshot.coin)
        .bind(snapshot.initial_price.to_string())
        .bind(snapshot.snapshot_timestamp)
        .bind(snapshot.units_held.to_string())
        .bind(snapshot.eth_equivalent_value.to_string())
        .bind(snapshot.was_ever_held)
        .bind(snapshot.max_units_reached.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to upsert snapshot")?;
        Ok(())
    }

    async fn delete_for_bot(&self, bot_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM coin_snapshots WHERE bot_id = ?")
            .bind(bot_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete snapshots for bot")?;
        sqlx::query("DELETE FROM coin_unit_trackers WHERE bot_id = ?")
            .bind(bot_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete unit trackers for bot")?;
        Ok(())
    }

    async fn upsert_unit_tracker(&self, tracker: &CoinUnitTracker) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO coin_unit_trackers (bot_id, coin, units, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(bot_id, coin) DO UPDATE SET
                units = excluded.units,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&tracker.bot_id)
        .bind(&tracker.coin)
        .bind(tracker.units.to_string())
        .bind(tracker.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert unit tracker")?;
        Ok(())
    }
}
