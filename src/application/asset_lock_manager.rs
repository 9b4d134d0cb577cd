//! Asset Lock Manager: per-(bot, coin) leases with TTL, preventing two
//! bots from mutating the same exchange balance simultaneously.

use crate::domain::asset::Asset;
use crate::domain::errors::RebalancerError;
use crate::domain::lock::AssetLock;
use crate::domain::ports::{AssetRepository, LockRepository};
use anyhow::Result;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};
use uuid::Uuid;

pub struct AssetLockManager {
    locks: Arc<dyn LockRepository>,
    assets: Arc<dyn AssetRepository>,
}

pub enum CanTrade {
    Ok,
    InsufficientBalance { need: Decimal, available: Decimal },
    Locked,
}

impl AssetLockManager {
    pub fn new(locks: Arc<dyn LockRepository>, assets: Arc<dyn AssetRepository>) -> Self {
        Self { locks, assets }
    }

    pub async fn can_trade(&self, bot_id: &str, coin: &str, amount: Decimal) -> Result<CanTrade> {
        if let Some(asset) = self.assets.find(bot_id, coin).await? {
            if asset.amount < amount {
                return Ok(CanTrade::InsufficientBalance {
                    need: amount,
                    available: asset.amount,
                });
            }
        } else {
            return Ok(CanTrade::InsufficientBalance {
                need: amount,
                available: Decimal::ZERO,
            });
        }

        let now = Utc::now();
        if self.locks.find_conflicting(coin, bot_id, now).await?.is_some() {
            return Ok(CanTrade::Locked);
        }
        Ok(CanTrade::Ok)
    }

    /// Atomically inserts a new lock row after verifying no conflicting
    /// lock exists. The repository implementation is responsible for
    /// making the check-then-insert serializable.
    pub async fn acquire(
        &self,
        bot_id: &str,
        coin: &str,
        amount: Decimal,
        reason: impl Into<String>,
        ttl_minutes: i64,
    ) -> Result<Result<AssetLock, RebalancerError>> {
        let now = Utc::now();
        let lock = AssetLock {
            lock_id: Uuid::new_v4().to_string(),
            bot_id: bot_id.to_string(),
            coin: coin.to_string(),
            amount,
            reason: reason.into(),
            status: crate::domain::lock::LockStatus::Locked,
            expires_at: now + Duration::minutes(ttl_minutes),
        };

        let acquired = self.locks.try_acquire(&lock).await?;
        if acquired {
            info!(bot_id, coin, lock_id = %lock.lock_id, "acquired asset lock");
            Ok(Ok(lock))
        } else {
            warn!(bot_id, coin, "asset lock conflict on acquire");
            Ok(Err(RebalancerError::LockConflict {
                coin: coin.to_string(),
            }))
        }
    }

    /// Idempotent for the owning bot; rejects cross-bot release.
    pub async fn release(&self, lock_id: &str, bot_id: &str) -> Result<bool> {
        self.locks.release(lock_id, bot_id).await
    }

    pub async fn extend(&self, lock_id: &str, bot_id: &str, additional_minutes: i64) -> Result<bool> {
        let Some(lock) = self.locks.find(lock_id).await? else {
            return Ok(false);
        };
        if lock.bot_id != bot_id {
            return Ok(false);
        }
        let new_expiry = lock.expires_at + Duration::minutes(additional_minutes);
        self.locks.extend(lock_id, bot_id, new_expiry).await
    }

    /// Periodic sweeper transitioning expired `Locked` rows to `Released`.
    /// Intended to be driven by a `tokio::time::interval` every 60s.
    pub async fn sweep_once(&self) -> Result<u64> {
        self.locks.sweep_expired(Utc::now()).await
    }

    pub async fn run_sweeper(self: Arc<Self>, period: StdDuration) {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match self.sweep_once().await {
                Ok(n) if n > 0 => info!(count = n, "swept expired asset locks"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "asset lock sweep failed"),
            }
        }
    }
}
