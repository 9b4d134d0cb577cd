//! Snapshot Manager: maintains per-(bot, coin) baselines.

use crate::domain::bot::Bot;
use crate::domain::ports::SnapshotRepository;
use crate::domain::snapshot::{CoinSnapshot, CoinUnitTracker};
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct SnapshotManager {
    repo: Arc<dyn SnapshotRepository>,
}

impl SnapshotManager {
    pub fn new(repo: Arc<dyn SnapshotRepository>) -> Self {
        Self { repo }
    }

    /// For each coin in the bot's basket without a CoinSnapshot row,
    /// create one with `initial_price` set to the just-observed price and
    /// `was_ever_held = (coin == initial_coin)`. Runs once at first tick
    /// after bot creation or after reset.
    pub async fn ensure_baselines(&self, bot: &Bot, prices: &HashMap<String, Decimal>) -> Result<()> {
        let existing = self.repo.find_for_bot(&bot.bot_id).await?;
        let existing_coins: std::collections::HashSet<&str> =
            existing.iter().map(|s| s.coin.as_str()).collect();

        let now = Utc::now();
        for coin in &bot.coins {
            if existing_coins.contains(coin.as_str()) {
                continue;
            }
            let Some(&price) = prices.get(coin) else {
                continue;
            };
            let snapshot = CoinSnapshot::new_baseline(
                &bot.bot_id,
                coin,
                price,
                coin == &bot.initial_coin,
                now,
            );
            self.repo.upsert(&snapshot).await?;
            info!(bot_id = %bot.bot_id, coin, %price, "created baseline snapshot");
        }
        Ok(())
    }

    /// Upserts CoinUnitTracker, writes `units_held` into the CoinSnapshot,
    /// sets `was_ever_held = true`, and raises `max_units_reached` if
    /// `units > max_units_reached`.
    pub async fn record_units(
        &self,
        bot_id: &str,
        coin: &str,
        units: Decimal,
        eth_equivalent_value: Decimal,
    ) -> Result<()> {
        let now = Utc::now();
        let mut snapshot = self
            .repo
            .find(bot_id, coin)
            .await?
            .unwrap_or_else(|| CoinSnapshot::new_baseline(bot_id, coin, Decimal::ZERO, false, now));
        snapshot.record_units(units, eth_equivalent_value, now);
        self.repo.upsert(&snapshot).await?;

        self.repo
            .upsert_unit_tracker(&CoinUnitTracker {
                bot_id: bot_id.to_string(),
                coin: coin.to_string(),
                units,
                updated_at: now,
            })
            .await?;
        Ok(())
    }

    /// The baseline map used by the Deviation Calculator.
    pub async fn initial_prices(&self, bot_id: &str) -> Result<HashMap<String, Decimal>> {
        let snapshots = self.repo.find_for_bot(bot_id).await?;
        Ok(snapshots
            .into_iter()
            .map(|s| (s.coin, s.initial_price))
            .collect())
    }

    pub async fn max_units_ever(&self, bot_id: &str, coin: &str) -> Result<Option<Decimal>> {
        let snapshot = self.repo.find(bot_id, coin).await?;
        Ok(snapshot.and_then(|s| s.was_ever_held.then_some(s.max_units_reached)))
    }

    /// Resetting a bot deletes snapshots rather than mutating them.
    pub async fn reset(&self, bot_id: &str) -> Result<()> {
        self.repo.delete_for_bot(bot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemorySnapshotRepo {
        snapshots: Mutex<HashMap<(String, String), CoinSnapshot>>,
        trackers: Mutex<HashMap<(String, String), CoinUnitTracker>>,
    }

    #[async_trait]
    impl SnapshotRepository for InMemorySnapshotRepo {
        async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<CoinSnapshot>> {
            Ok(self
                .snapshots
                .lock()
                .unwrap()
                .get(&(bot_id.to_string(), coin.to_string()))
                .cloned())
        }

        async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<CoinSnapshot>> {
            Ok(self
                .snapshots
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.bot_id == bot_id)
                .cloned()
                .collect())
        }

        async fn upsert(&self, snapshot: &CoinSnapshot) -> Result<()> {
            self.snapshots.lock().unwrap().insert(
                (snapshot.bot_id.clone(), snapshot.coin.clone()),
                snapshot.clone(),
            );
            Ok(())
        }

        async fn delete_for_bot(&self, bot_id: &str) -> Result<()> {
            self.snapshots.lock().unwrap().retain(|k, _| k.0 != bot_id);
            Ok(())
        }

        async fn upsert_unit_tracker(&self, tracker: &CoinUnitTracker) -> Result<()> {
            self.trackers.lock().unwrap().insert(
                (tracker.bot_id.clone(), tracker.coin.clone()),
                tracker.clone(),
            );
            Ok(())
        }
    }

    fn sample_bot() -> Bot {
        crate::test_support::sample_bot()
    }

    #[tokio::test]
    async fn ensure_baselines_creates_missing_snapshots_once() {
        let repo = Arc::new(InMemorySnapshotRepo::default());
        let manager = SnapshotManager::new(repo.clone());
        let bot = sample_bot();

        let mut prices = HashMap::new();
        prices.insert("BTC".to_string(), dec!(50000));
        prices.insert("ETH".to_string(), dec!(3000));
        prices.insert("SOL".to_string(), dec!(150));

        manager.ensure_baselines(&bot, &prices).await.unwrap();
        let snapshots = repo.find_for_bot(&bot.bot_id).await.unwrap();
        assert_eq!(snapshots.len(), 3);

        let btc = snapshots.iter().find(|s| s.coin == "BTC").unwrap();
        assert!(btc.was_ever_held, "initial_coin must start was_ever_held");
        let eth = snapshots.iter().find(|s| s.coin == "ETH").unwrap();
        assert!(!eth.was_ever_held);

        // Second call with different prices must not overwrite existing baselines.
        let mut new_prices = HashMap::new();
        new_prices.insert("BTC".to_string(), dec!(99999));
        manager.ensure_baselines(&bot, &new_prices).await.unwrap();
        let btc_after = repo.find(&bot.bot_id, "BTC").await.unwrap().unwrap();
        assert_eq!(btc_after.initial_price, dec!(50000));
    }

    #[tokio::test]
    async fn record_units_is_monotone_on_max_units_reached() {
        let repo = Arc::new(InMemorySnapshotRepo::default());
        let manager = SnapshotManager::new(repo.clone());

        manager
            .record_units("bot1", "ETH", dec!(5), dec!(2))
            .await
            .unwrap();
        manager
            .record_units("bot1", "ETH", dec!(2), dec!(1))
            .await
            .unwrap();

        let max = manager.max_units_ever("bot1", "ETH").await.unwrap();
        assert_eq!(max, Some(dec!(5)));
    }

    #[tokio::test]
    async fn reset_deletes_all_snapshots_for_bot() {
        let repo = Arc::new(InMemorySnapshotRepo::default());
        let manager = SnapshotManager::new(repo.clone());
        manager
            .record_units("bot1", "ETH", dec!(5), dec!(2))
            .await
            .unwrap();
        manager.reset("bot1").await.unwrap();
        assert!(manager.initial_prices("bot1").await.unwrap().is_empty());
    }
}
