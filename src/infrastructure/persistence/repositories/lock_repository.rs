use crate::domain::lock::{AssetLock, LockStatus};
use crate::domain::ports::LockRepository;
use crate::infrastructure::persistence::database::Database;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteLockRepository {
    pool: SqlitePool,
}

impl SqliteLockRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            pool: database.pool.clone(),
        }
    }

    fn row_to_lock(row: &sqlx::sqlite::SqliteRow) -> Result<AssetLock> {
        let amount: String = row.try_get("amount")?;
        let status: String = row.try_get("status")?;
        Ok(AssetLock {
            lock_id: row.try_get("lock_id")?,
            bot_id: row.try_get("bot_id")?,
            coin: row.try_get("coin")?,
            amount: Decimal::from_str(&amount).context("invalid amount")?,
            reason: row.try_get("reason")?,
            status: match status.as_str() {
                "locked" => LockStatus::Locked,
                "released" => LockStatus::Released,
                other => anyhow::bail!("unknown lock status {other}"),
            },
            expires_at: row.try_get("expires_at")?,
        })
    }
}

fn status_str(status: LockStatus) -> &'static str {
    match status {
        LockStatus::Locked => "locked",
        LockStatus::Released => "released",
    }
}

#[async_trait]
impl LockRepository for SqliteLockRepository {
    async fn try_acquire(&self, lock: &AssetLock) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to start lock tx")?;

        let conflict: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM asset_locks WHERE coin = ? AND bot_id != ? AND status = 'locked' AND expires_at > ? LIMIT 1",
        )
        .bind(&lock.coin)
        .bind(&lock.bot_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to check for conflicting lock")?;

        if conflict.is_some() {
            tx.rollback().await.ok();
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO asset_locks (lock_id, bot_id, coin, amount, reason, status, expires_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&lock.lock_id)
        .bind(&lock.bot_id)
        .bind(&lock.coin)
        .bind(lock.amount.to_string())
        .bind(&lock.reason)
        .bind(status_str(lock.status))
        .bind(lock.expires_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert lock")?;

        tx.commit().await.context("Failed to commit lock tx")?;
        Ok(true)
    }

    async fn find_conflicting(
        &self,
        coin: &str,
        bot_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<AssetLock>> {
        let row = sqlx::query(
            "SELECT * FROM asset_locks WHERE coin = ? AND bot_id != ? AND status = 'locked' AND expires_at > ? LIMIT 1",
        )
        .bind(coin)
        .bind(bot_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query conflicting lock")?;
        row.as_ref().map(Self::row_to_lock).transpose()
    }

    async fn find(&self, lock_id: &str) -> Result<Option<AssetLock>> {
        let row = sqlx::query("SELECT * FROM asset_locks WHERE lock_id = ?")
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load lock")?;
        row.as_ref().map(Self::row_to_lock).transpose()
    }

    async fn release(&self, lock_id: &str, bot_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE asset_locks SET status = 'released' WHERE lock_id = ? AND bot_id = ?",
        )
        .bind(lock_id)
        .bind(bot_id)
        .execute(&self.pool)
        .await
        .context("Failed to release lock")?;
        Ok(result.rows_affected() > 0)
    }

    async fn extend(&self, lock_id: &str, bot_id: &str, new_expires_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE asset_locks SET expires_at = ? WHERE lock_id = ? AND bot_id = ? AND status = 'locked'",
        )
        .bind(new_expires_at)
        .bind(lock_id)
        .bind(bot_id)
        .execute(&self.pool)
        .await
        .context("Failed to extend lock")?;
        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE asset_locks SET status = 'released' WHERE status = 'locked' AND expires_at <= ?",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to sweep expired locks")?;
        Ok(result.rows_affected())
    }
}
