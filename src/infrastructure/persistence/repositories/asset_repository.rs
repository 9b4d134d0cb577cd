use crate::domain::asset::Asset;
use crate::domain::ports::AssetRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteAssetRepository {
    pool: SqlitePool,
}

impl SqliteAssetRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }

    fn row_to_asset(row: &sqlx::sqlite::SqliteRow) -> Result<Asset> {
        let amount: String = row.try_get("amount")?;
        let entry_price: String = row.try_get("entry_price")?;
        let stablecoin_equivalent: String = row.try_get("stablecoin_equivalent")?;
        Ok(Asset {
            bot_id: row.try_get("bot_id")?,
            coin: row.try_get("coin")?,
            amount: Decimal::from_str(&amount).context("invalid amount")?,
            entry_price: Decimal::from_str(&entry_price).context("invalid entry_price")?,
            stablecoin_equivalent: Decimal::from_str(&stablecoin_equivalent)
                .context("invalid stablecoin_equivalent")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

#[async_trait]
impl AssetRepository for SqliteAssetRepository {
    async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<Asset>> {
        let row = sqlx::query("SELECT * FROM bot_assets WHERE bot_id = ? AND coin = ?")
            .bind(bot_id)
            .bind(coin)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load asset")?;
        row.as_ref().map(Self::row_to_asset).transpose()
    }

    async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<Asset>> {
        let rows = sqlx::query("SELECT * FROM bot_assets WHERE bot_id = ?")
            .bind(bot_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load assets for bot")?;
        rows.iter().map(Self::row_to_asset).collect()
    }

    async fn upsert(&self, asset: &Asset) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bot_assets (bot_id, coin, amount, entry_price, stablecoin_equivalent, last_updated)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(bot_id, coin) DO UPDATE SET
                amount = excluded.amount,
                entry_price = excluded.entry_price,
                stablecoin_equivalent = excluded.stablecoin_equivalent,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(&asset.bot_id)
        .bind(&asset.coin)
        .bind(asset.amount.to_string())
        .bind(asset.entry_price.to_string())
        .bind(asset.stablecoin_equivalent.to_string())
        .bind(asset.last_updated)
        .execute(&self.pool)
        .await
        .context("Failed to upsert asset")?;
        Ok(())
    }

    async fn delete(&self, bot_id: &str, coin: &str) -> Result<()> {
        sqlx::query("DELETE FROM bot_assets WHERE bot_id = ? AND coin = ?")
            .bind(bot_id)
            .bind(coin)
            .execute(&self.pool)
            .await
            .context("Failed to delete asset")?;
        Ok(())
    }
}
