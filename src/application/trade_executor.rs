//! Trade Executor: acquires a lock, chooses direct vs two-step path,
//! drives the broker, records parent and step rows, releases the lock,
//! updates assets/snapshots/peak-value.

use crate::application::asset_lock_manager::{AssetLockManager, CanTrade};
use crate::application::snapshot_manager::SnapshotManager;
use crate::domain::asset::Asset;
use crate::domain::errors::RebalancerError;
use crate::domain::ports::{
    resolve_realized_amount, AssetRepository, BotRepository, ExchangeBroker, TradeRepository,
};
use crate::domain::trade::{join_step_trade_ids, Trade, TradeStatus, TradeStep};
use crate::domain::types::OrderPositionType;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// The margin subtracted from a step-1 stablecoin payout before sizing
/// the step-2 buy, guarding against price movement between steps.
const TWO_STEP_SAFETY_MARGIN: Decimal = dec!(0.995);

const LOCK_TTL_MINUTES: i64 = 5;
const BROKER_AWAIT_TIMEOUT: Duration = Duration::from_secs(45);

pub enum ExecutionOutcome {
    Completed { trade: Trade },
    Locked,
    AssetMissing,
    Failed { trade: Trade, error: String },
}

/// Where one `execute` call currently stands. Transitions only move
/// forward; logged at each step so a trace can be reconstructed from
/// `target: "trade"` log lines without re-reading the row history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TradeExecutionState {
    LockAcquired,
    BrokerSubmitted,
    Completed,
    Failed,
}

/// The realized outcome of one broker submission, used both for the
/// direct path (where it becomes the whole parent trade) and for each
/// leg of an indirect path (where it becomes one TradeStep).
struct StepOutcome {
    trade_id: String,
    from_amount: Decimal,
    to_amount: Decimal,
    from_price: Decimal,
    to_price: Decimal,
    commission_amount: Decimal,
    raw: serde_json::Value,
}

pub struct TradeExecutor {
    broker: Arc<dyn ExchangeBroker>,
    assets: Arc<dyn AssetRepository>,
    bots: Arc<dyn BotRepository>,
    trades: Arc<dyn TradeRepository>,
    locks: Arc<AssetLockManager>,
    snapshots: Arc<SnapshotManager>,
    simulate_trades: bool,
}

impl TradeExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn ExchangeBroker>,
        assets: Arc<dyn AssetRepository>,
        bots: Arc<dyn BotRepository>,
        trades: Arc<dyn TradeRepository>,
        locks: Arc<AssetLockManager>,
        snapshots: Arc<SnapshotManager>,
        simulate_trades: bool,
    ) -> Self {
        Self {
            broker,
            assets,
            bots,
            trades,
            locks,
            snapshots,
            simulate_trades,
        }
    }

    #[instrument(skip(self), fields(bot_id = %bot_id, from = %from, to = %to))]
    pub async fn execute(
        &self,
        bot_id: &str,
        account_id: &str,
        from: &str,
        to: &str,
        preferred_stablecoin: &str,
        commission_rate: Decimal,
    ) -> Result<ExecutionOutcome> {
        let Some(asset) = self.assets.find(bot_id, from).await? else {
            return Ok(ExecutionOutcome::AssetMissing);
        };

        match self.locks.can_trade(bot_id, from, asset.amount).await? {
            CanTrade::Locked => return Ok(ExecutionOutcome::Locked),
            CanTrade::InsufficientBalance { need, available } => {
                return Err(RebalancerError::InsufficientFunds { need, available }.into());
            }
            CanTrade::Ok => {}
        }

        let acquired = self
            .locks
            .acquire(bot_id, from, asset.amount, format!("trade_to_{to}"), LOCK_TTL_MINUTES)
            .await?;
        let lock = match acquired {
            Ok(lock) => lock,
            Err(_) => return Ok(ExecutionOutcome::Locked),
        };

        let mut state = TradeExecutionState::LockAcquired;
        info!(bot_id, ?state, target: "trade", "lock acquired, building trade");

        let now = Utc::now();
        let mut parent = Trade::new_parent(bot_id, from, to, asset.amount, commission_rate, now);
        self.trades.save_parent(&parent).await?;

        let is_direct = from == preferred_stablecoin || to == preferred_stablecoin;

        state = TradeExecutionState::BrokerSubmitted;
        info!(bot_id, ?state, is_direct, target: "trade", "submitting to broker");

        let result = if is_direct {
            self.execute_direct(account_id, &asset, to, preferred_stablecoin, commission_rate)
                .await
        } else {
            self.execute_indirect(bot_id, account_id, &parent.id, &asset, to, preferred_stablecoin, commission_rate)
                .await
        };

        // Release the lock regardless of outcome; trade execution itself
        // is not cancellable once a broker submission is in flight, but
        // the lock must never outlive this call.
        self.locks.release(&lock.lock_id, bot_id).await?;

        match result {
            Ok(outcome) => {
                parent.trade_id = Some(outcome.trade_id);
                parent.to_amount = Some(outcome.to_amount);
                parent.from_price = Some(outcome.from_price);
                parent.to_price = Some(outcome.to_price);
                parent.commission_amount = outcome.commission_amount;
                parent.status = TradeStatus::Completed;
                parent.completed_at = Some(Utc::now());
                self.trades.save_parent(&parent).await?;

                self.apply_successful_swap(
                    bot_id,
                    &asset,
                    to,
                    outcome.to_amount,
                    outcome.to_price,
                    preferred_stablecoin,
                )
                .await?;

                state = TradeExecutionState::Completed;
                info!(bot_id, from, to, ?state, to_amount = %outcome.to_amount, target: "trade", "swap completed");
                Ok(ExecutionOutcome::Completed { trade: parent })
            }
            Err(e) => {
                state = TradeExecutionState::Failed;
                parent.status = TradeStatus::Failed;
                self.trades.save_parent(&parent).await?;
                error!(bot_id, from, to, ?state, error = %e, "trade execution failed; asset left untouched");
                Ok(ExecutionOutcome::Failed {
                    trade: parent,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Direct trade: either side of the desired pair is the preferred
    /// stablecoin, so a single broker submission suffices.
    async fn execute_direct(
        &self,
        account_id: &str,
        asset: &Asset,
        to: &str,
        preferred_stablecoin: &str,
        commission_rate: Decimal,
    ) -> Result<StepOutcome> {
        let live_balances = self.broker.get_account_balances(account_id).await?;
        let live_balance = live_balances
            .iter()
            .find(|b| b.coin == asset.coin)
            .map(|b| b.amount)
            .unwrap_or(asset.amount);
        let traded_amount = asset.amount.min(live_balance);

        if to == preferred_stablecoin {
            // Selling the held coin for the stablecoin.
            let pair = format!("{}_{}", asset.coin, preferred_stablecoin);
            let handle = self
                .broker
                .submit_market_trade(account_id, &pair, OrderPositionType::Sell, traded_amount, None, self.simulate_trades)
                .await?;
            let result = self.broker.await_trade_completion(&handle, BROKER_AWAIT_TIMEOUT).await?;
            if !result.status.as_ref().is_some_and(|s| s.is_terminal()) {
                return Err(RebalancerError::TradeTimeout {
                    last_status: format!("{:?}", result.status),
                }
                .into());
            }

            let stable_out = resolve_realized_amount(&result)
                .unwrap_or(traded_amount * asset.entry_price * (Decimal::ONE - commission_rate));
            let commission = traded_amount * asset.entry_price * commission_rate;

            Ok(StepOutcome {
                trade_id: handle.trade_id,
                from_amount: traded_amount,
                to_amount: stable_out,
                from_price: asset.entry_price,
                to_price: Decimal::ONE,
                commission_amount: commission,
                raw: result.raw,
            })
        } else {
            // Buying `to` with the held stablecoin.
            let to_quote = self.broker.get_market_rate(to, preferred_stablecoin).await?;
            let pair = format!("{}_{}", to, preferred_stablecoin);
            let handle = self
                .broker
                .submit_market_trade(account_id, &pair, OrderPositionType::Buy, traded_amount, None, self.simulate_trades)
                .await?;
            let result = self.broker.await_trade_completion(&handle, BROKER_AWAIT_TIMEOUT).await?;
            if !result.status.as_ref().is_some_and(|s| s.is_terminal()) {
                return Err(RebalancerError::TradeTimeout {
                    last_status: format!("{:?}", result.status),
                }
                .into());
            }

            let commission = traded_amount * commission_rate;
            let to_units = resolve_realized_amount(&result)
                .unwrap_or((traded_amount - commission) / to_quote.price);

            Ok(StepOutcome {
                trade_id: handle.trade_id,
                from_amount: traded_amount,
                to_amount: to_units,
                from_price: Decimal::ONE,
                to_price: to_quote.price,
                commission_amount: commission,
                raw: result.raw,
            })
        }
    }

    /// Two-step trade routed through the preferred stablecoin:
    /// (1) sell `from -> stablecoin`, (2) buy `stablecoin -> to` with a
    /// 0.5% safety margin applied to the step-1 payout.
    async fn execute_indirect(
        &self,
        bot_id: &str,
        account_id: &str,
        parent_id: &str,
        asset: &Asset,
        to: &str,
        preferred_stablecoin: &str,
        commission_rate: Decimal,
    ) -> Result<StepOutcome> {
        // Step 1: from -> stablecoin.
        let step1 = self
            .execute_direct(account_id, asset, preferred_stablecoin, preferred_stablecoin, commission_rate)
            .await?;
        self.trades
            .save_step(&TradeStep {
                parent_trade_id: parent_id.to_string(),
                step_number: 1,
                trade_id: step1.trade_id.clone(),
                from_coin: asset.coin.clone(),
                to_coin: preferred_stablecoin.to_string(),
                from_amount: step1.from_amount,
                to_amount: step1.to_amount,
                from_price: step1.from_price,
                to_price: step1.to_price,
                commission_amount: step1.commission_amount,
                commission_rate,
                status: TradeStatus::Completed,
                executed_at: Utc::now(),
                completed_at: Some(Utc::now()),
                raw_data: step1.raw.clone(),
            })
            .await?;

        // Step 2: stablecoin -> to, sized off the actual stablecoin realized,
        // with a safety margin and a forced buy position type.
        let to_quote = self.broker.get_market_rate(to, preferred_stablecoin).await?;
        let units = step1.to_amount / to_quote.price * TWO_STEP_SAFETY_MARGIN;

        let pair = format!("{}_{}", to, preferred_stablecoin);
        let handle = self
            .broker
            .submit_market_trade(account_id, &pair, OrderPositionType::Buy, units, None, self.simulate_trades)
            .await?;
        let result = self.broker.await_trade_completion(&handle, BROKER_AWAIT_TIMEOUT).await?;
        if !result.status.as_ref().is_some_and(|s| s.is_terminal()) {
            warn!(bot_id, "step 2 of indirect trade did not reach a terminal status within budget");
            return Err(RebalancerError::TradeTimeout {
                last_status: format!("{:?}", result.status),
            }
            .into());
        }

        let commission2 = units * to_quote.price * commission_rate;
        let to_amount = resolve_realized_amount(&result).unwrap_or(units);

        self.trades
            .save_step(&TradeStep {
                parent_trade_id: parent_id.to_string(),
                step_number: 2,
                trade_id: handle.trade_id.clone(),
                from_coin: preferred_stablecoin.to_string(),
                to_coin: to.to_string(),
                from_amount: step1.to_amount,
                to_amount,
                from_price: Decimal::ONE,
                to_price: to_quote.price,
                commission_amount: commission2,
                commission_rate,
                status: TradeStatus::Completed,
                executed_at: Utc::now(),
                completed_at: Some(Utc::now()),
                raw_data: result.raw.clone(),
            })
            .await?;

        Ok(StepOutcome {
            trade_id: join_step_trade_ids(&step1.trade_id, &handle.trade_id),
            from_amount: asset.amount,
            to_amount,
            from_price: step1.from_price,
            to_price: to_quote.price,
            commission_amount: step1.commission_amount + commission2,
            raw: result.raw,
        })
    }

    async fn apply_successful_swap(
        &self,
        bot_id: &str,
        old_asset: &Asset,
        to: &str,
        to_amount: Decimal,
        to_price: Decimal,
        preferred_stablecoin: &str,
    ) -> Result<()> {
        self.assets.delete(bot_id, &old_asset.coin).await?;

        let stable_value = if to == preferred_stablecoin {
            to_amount
        } else {
            to_amount * to_price
        };

        let new_asset = Asset::new(bot_id, to, to_amount, to_price, stable_value, Utc::now());
        self.assets.upsert(&new_asset).await?;

        self.snapshots.record_units(bot_id, to, to_amount, Decimal::ZERO).await?;

        if let Some(mut bot) = self.bots.find(bot_id).await? {
            bot.current_coin = Some(to.to_string());
            if stable_value > bot.global_peak_value {
                bot.global_peak_value = stable_value;
            }
            self.bots.save(&bot).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bot::Bot;
    use crate::domain::lock::AssetLock;
    use crate::domain::ports::{
        Account, AccountBalance, BrokerTradeResult, BrokerTradeStatus, CommissionRates,
        CommissionSource, LockRepository, TradeHandle,
    };
    use crate::domain::snapshot::{CoinSnapshot, CoinUnitTracker};
    use crate::domain::types::PriceQuote;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryAssets {
        assets: Mutex<HashMap<(String, String), Asset>>,
    }

    #[async_trait]
    impl AssetRepository for InMemoryAssets {
        async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<Asset>> {
            Ok(self.assets.lock().unwrap().get(&(bot_id.to_string(), coin.to_string())).cloned())
        }
        async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<Asset>> {
            Ok(self.assets.lock().unwrap().values().filter(|a| a.bot_id == bot_id).cloned().collect())
        }
        async fn upsert(&self, asset: &Asset) -> Result<()> {
            self.assets.lock().unwrap().insert((asset.bot_id.clone(), asset.coin.clone()), asset.clone());
            Ok(())
        }
        async fn delete(&self, bot_id: &str, coin: &str) -> Result<()> {
            self.assets.lock().unwrap().remove(&(bot_id.to_string(), coin.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryBots {
        bots: Mutex<HashMap<String, Bot>>,
    }

    #[async_trait]
    impl BotRepository for InMemoryBots {
        async fn find(&self, bot_id: &str) -> Result<Option<Bot>> {
            Ok(self.bots.lock().unwrap().get(bot_id).cloned())
        }
        async fn find_enabled(&self) -> Result<Vec<Bot>> {
            Ok(self.bots.lock().unwrap().values().filter(|b| b.enabled).cloned().collect())
        }
        async fn save(&self, bot: &Bot) -> Result<()> {
            self.bots.lock().unwrap().insert(bot.bot_id.clone(), bot.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryTrades {
        parents: Mutex<HashMap<String, Trade>>,
        steps: Mutex<Vec<TradeStep>>,
    }

    #[async_trait]
    impl TradeRepository for InMemoryTrades {
        async fn save_parent(&self, trade: &Trade) -> Result<()> {
            self.parents.lock().unwrap().insert(trade.id.clone(), trade.clone());
            Ok(())
        }
        async fn save_step(&self, step: &TradeStep) -> Result<()> {
            self.steps.lock().unwrap().push(step.clone());
            Ok(())
        }
        async fn find_parent(&self, id: &str) -> Result<Option<Trade>> {
            Ok(self.parents.lock().unwrap().get(id).cloned())
        }
        async fn find_steps(&self, parent_trade_id: &str) -> Result<Vec<TradeStep>> {
            Ok(self.steps.lock().unwrap().iter().filter(|s| s.parent_trade_id == parent_trade_id).cloned().collect())
        }
    }

    #[derive(Default)]
    struct InMemoryLocks {
        locks: Mutex<HashMap<String, AssetLock>>,
    }

    #[async_trait]
    impl LockRepository for InMemoryLocks {
        async fn try_acquire(&self, lock: &AssetLock) -> Result<bool> {
            let now = Utc::now();
            let mut locks = self.locks.lock().unwrap();
            let conflict = locks.values().any(|l| l.coin == lock.coin && l.conflicts_with(&lock.bot_id, now));
            if conflict {
                return Ok(false);
            }
            locks.insert(lock.lock_id.clone(), lock.clone());
            Ok(true)
        }
        async fn find_conflicting(&self, coin: &str, bot_id: &str, now: chrono::DateTime<Utc>) -> Result<Option<AssetLock>> {
            Ok(self.locks.lock().unwrap().values().find(|l| l.coin == coin && l.conflicts_with(bot_id, now)).cloned())
        }
        async fn find(&self, lock_id: &str) -> Result<Option<AssetLock>> {
            Ok(self.locks.lock().unwrap().get(lock_id).cloned())
        }
        async fn release(&self, lock_id: &str, bot_id: &str) -> Result<bool> {
            let mut locks = self.locks.lock().unwrap();
            if let Some(l) = locks.get_mut(lock_id) {
                if l.bot_id != bot_id {
                    return Ok(false);
                }
                l.status = crate::domain::lock::LockStatus::Released;
                return Ok(true);
            }
            Ok(false)
        }
        async fn extend(&self, lock_id: &str, bot_id: &str, new_expires_at: chrono::DateTime<Utc>) -> Result<bool> {
            let mut locks = self.locks.lock().unwrap();
            if let Some(l) = locks.get_mut(lock_id) {
                if l.bot_id != bot_id {
                    return Ok(false);
                }
                l.expires_at = new_expires_at;
                return Ok(true);
            }
            Ok(false)
        }
        async fn sweep_expired(&self, now: chrono::DateTime<Utc>) -> Result<u64> {
            let mut locks = self.locks.lock().unwrap();
            let mut count = 0;
            for l in locks.values_mut() {
                if l.status == crate::domain::lock::LockStatus::Locked && l.expires_at <= now {
                    l.status = crate::domain::lock::LockStatus::Released;
                    count += 1;
                }
            }
            Ok(count)
        }
    }

    #[derive(Default)]
    struct InMemorySnapshots {
        snapshots: Mutex<HashMap<(String, String), CoinSnapshot>>,
    }

    #[async_trait]
    impl crate::domain::ports::SnapshotRepository for InMemorySnapshots {
        async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<CoinSnapshot>> {
            Ok(self.snapshots.lock().unwrap().get(&(bot_id.to_string(), coin.to_string())).cloned())
        }
        async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<CoinSnapshot>> {
            Ok(self.snapshots.lock().unwrap().values().filter(|s| s.bot_id == bot_id).cloned().collect())
        }
        async fn upsert(&self, snapshot: &CoinSnapshot) -> Result<()> {
            self.snapshots.lock().unwrap().insert((snapshot.bot_id.clone(), snapshot.coin.clone()), snapshot.clone());
            Ok(())
        }
        async fn delete_for_bot(&self, bot_id: &str) -> Result<()> {
            self.snapshots.lock().unwrap().retain(|k, _| k.0 != bot_id);
            Ok(())
        }
        async fn upsert_unit_tracker(&self, _tracker: &CoinUnitTracker) -> Result<()> {
            Ok(())
        }
    }

    /// A scripted broker double: step N of `await_trade_completion` calls
    /// returns the Nth entry of `await_responses`, falling back to the
    /// last entry once exhausted. Used to simulate S4 (two-step) and S6
    /// (timeout on step 1).
    struct ScriptedBroker {
        market_rate: Decimal,
        await_responses: Vec<BrokerTradeResult>,
        call_count: std::sync::atomic::AtomicUsize,
    }

    fn terminal_result(amount: Decimal) -> BrokerTradeResult {
        BrokerTradeResult {
            status: Some(BrokerTradeStatus::Completed),
            entered_total: Some(amount),
            raw: serde_json::json!({}),
            ..Default::default()
        }
    }

    #[async_trait]
    impl ExchangeBroker for ScriptedBroker {
        async fn list_accounts(&self) -> Result<Vec<Account>> {
            Ok(vec![])
        }
        async fn get_account_balances(&self, _account_id: &str) -> Result<Vec<AccountBalance>> {
            Ok(vec![])
        }
        async fn get_market_rate(&self, _base: &str, _quote: &str) -> Result<PriceQuote> {
            Ok(PriceQuote {
                price: self.market_rate,
                source: crate::domain::types::PriceSource::BrokerDirect,
                was_fallback: false,
            })
        }
        async fn get_commission_rates(&self, _account_id: &str) -> Result<CommissionRates> {
            Ok(CommissionRates {
                maker: dec!(0.001),
                taker: dec!(0.002),
                source: CommissionSource::Default,
            })
        }
        async fn submit_market_trade(
            &self,
            _account_id: &str,
            _pair: &str,
            _position_type: OrderPositionType,
            _amount: Decimal,
            _take_profit_percent: Option<Decimal>,
            _demo: bool,
        ) -> Result<TradeHandle> {
            let n = self.call_count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(TradeHandle {
                trade_id: format!("broker-trade-{n}"),
            })
        }
        async fn get_trade(&self, handle: &TradeHandle) -> Result<BrokerTradeResult> {
            self.await_trade_completion(handle, Duration::from_secs(0)).await
        }
        async fn await_trade_completion(&self, _handle: &TradeHandle, _max_wait: Duration) -> Result<BrokerTradeResult> {
            let idx = self.call_count.load(std::sync::atomic::Ordering::SeqCst).saturating_sub(1);
            Ok(self
                .await_responses
                .get(idx)
                .cloned()
                .unwrap_or_else(|| self.await_responses.last().cloned().unwrap()))
        }
    }

    fn bot_with_asset(assets: &InMemoryAssets, bots: &InMemoryBots, coin: &str, amount: Decimal) -> Bot {
        let bot = crate::test_support::sample_bot();
        assets.assets.lock().unwrap().insert(
            (bot.bot_id.clone(), coin.to_string()),
            Asset::new(&bot.bot_id, coin, amount, dec!(1), amount, Utc::now()),
        );
        bots.bots.lock().unwrap().insert(bot.bot_id.clone(), bot.clone());
        bot
    }

    /// S4 — two-step trade ADA -> USDT -> DOT.
    #[tokio::test]
    async fn s4_two_step_trade_path_joins_step_ids() {
        let assets = Arc::new(InMemoryAssets::default());
        let bots = Arc::new(InMemoryBots::default());
        let trades = Arc::new(InMemoryTrades::default());
        let locks = Arc::new(AssetLockManager::new(Arc::new(InMemoryLocks::default()), assets.clone()));
        let snapshots = Arc::new(SnapshotManager::new(Arc::new(InMemorySnapshots::default())));

        let bot = bot_with_asset(&assets, &bots, "ADA", dec!(1000));

        let broker = Arc::new(ScriptedBroker {
            market_rate: dec!(5), // DOT price in USDT
            await_responses: vec![terminal_result(dec!(400)), terminal_result(dec!(79))],
            call_count: std::sync::atomic::AtomicUsize::new(0),
        });

        let executor = TradeExecutor::new(broker, assets.clone(), bots.clone(), trades.clone(), locks, snapshots, false);

        let outcome = executor
            .execute(&bot.bot_id, &bot.account_id, "ADA", "DOT", "USDT", dec!(0.002))
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Completed { trade } => {
                assert_eq!(trade.trade_id.as_deref(), Some("broker-trade-0-broker-trade-1"));
                assert_eq!(trade.status, TradeStatus::Completed);

                let steps = trades.find_steps(&trade.id).await.unwrap();
                assert_eq!(steps.len(), 2);
                let commission_sum = steps[0].commission_amount + steps[1].commission_amount;
                assert_eq!(trade.commission_amount, commission_sum);
            }
            _ => panic!("expected Completed outcome"),
        }

        let steps = trades.steps.lock().unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_number, 1);
        assert_eq!(steps[1].step_number, 2);

        assert!(assets.find(&bot.bot_id, "ADA").await.unwrap().is_none());
        let new_asset = assets.find(&bot.bot_id, "DOT").await.unwrap().unwrap();
        assert_eq!(new_asset.coin, "DOT");
    }

    /// S6 — step 1 stays in_progress across the whole poll budget; the
    /// trade is marked failed, the lock released, Asset{from} untouched.
    #[tokio::test]
    async fn s6_broker_timeout_marks_trade_failed_and_leaves_asset_untouched() {
        let assets = Arc::new(InMemoryAssets::default());
        let bots = Arc::new(InMemoryBots::default());
        let trades = Arc::new(InMemoryTrades::default());
        let lock_repo = Arc::new(InMemoryLocks::default());
        let locks = Arc::new(AssetLockManager::new(lock_repo.clone(), assets.clone()));
        let snapshots = Arc::new(SnapshotManager::new(Arc::new(InMemorySnapshots::default())));

        let bot = bot_with_asset(&assets, &bots, "ADA", dec!(1000));

        let broker = Arc::new(ScriptedBroker {
            market_rate: dec!(5),
            await_responses: vec![BrokerTradeResult {
                status: Some(BrokerTradeStatus::InProgress),
                raw: serde_json::json!({}),
                ..Default::default()
            }],
            call_count: std::sync::atomic::AtomicUsize::new(0),
        });

        let executor = TradeExecutor::new(broker, assets.clone(), bots.clone(), trades.clone(), locks, snapshots, false);

        let outcome = executor
            .execute(&bot.bot_id, &bot.account_id, "ADA", "DOT", "USDT", dec!(0.002))
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Failed { trade, .. } => assert_eq!(trade.status, TradeStatus::Failed),
            _ => panic!("expected Failed outcome"),
        }

        // Asset{from} remains untouched, and no Asset{to} was created.
        let ada = assets.find(&bot.bot_id, "ADA").await.unwrap().unwrap();
        assert_eq!(ada.amount, dec!(1000));
        assert!(assets.find(&bot.bot_id, "DOT").await.unwrap().is_none());

        // Lock must have been released, not left dangling.
        let now = Utc::now();
        assert!(lock_repo.find_conflicting("ADA", "someone-else", now).await.unwrap().is_none());
    }
}
