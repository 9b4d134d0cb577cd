//! Bot Scheduler: one periodic task per enabled bot, each driving the
//! full evaluate-and-maybe-swap cycle on its own `check_interval_minutes`.

use crate::application::price_oracle::PriceOracle;
use crate::application::snapshot_manager::SnapshotManager;
use crate::application::swap_decision_engine::SwapDecisionEngine;
use crate::application::trade_executor::{ExecutionOutcome, TradeExecutor};
use crate::domain::decision::Decision;
use crate::domain::errors::RebalancerError;
use crate::domain::ports::{AssetRepository, BotRepository, ExchangeBroker};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

struct BotTask {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

pub struct Scheduler {
    bots: Arc<dyn BotRepository>,
    assets: Arc<dyn AssetRepository>,
    price_oracle: Arc<PriceOracle>,
    snapshots: Arc<SnapshotManager>,
    decision_engine: Arc<SwapDecisionEngine>,
    executor: Arc<TradeExecutor>,
    broker: Arc<dyn ExchangeBroker>,
    tasks: Mutex<HashMap<String, BotTask>>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bots: Arc<dyn BotRepository>,
        assets: Arc<dyn AssetRepository>,
        price_oracle: Arc<PriceOracle>,
        snapshots: Arc<SnapshotManager>,
        decision_engine: Arc<SwapDecisionEngine>,
        executor: Arc<TradeExecutor>,
        broker: Arc<dyn ExchangeBroker>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bots,
            assets,
            price_oracle,
            snapshots,
            decision_engine,
            executor,
            broker,
            tasks: Mutex::new(HashMap::new()),
        })
    }

    /// Starts one task per currently-enabled bot. Safe to call again
    /// after individual bots are stopped and re-enabled.
    pub async fn start_all_enabled(self: &Arc<Self>) -> Result<()> {
        for bot in self.bots.find_enabled().await? {
            self.start(bot.bot_id);
        }
        Ok(())
    }

    /// Spawns (or re-spawns) the periodic task for one bot. A running
    /// tick is never interrupted by `stop`; the task only checks for the
    /// shutdown signal between ticks.
    pub fn start(self: &Arc<Self>, bot_id: String) {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.contains_key(&bot_id) {
            return;
        }
        let shutdown = Arc::new(Notify::new());
        let scheduler = Arc::clone(self);
        let task_bot_id = bot_id.clone();
        let task_shutdown = shutdown.clone();

        let handle = tokio::spawn(async move {
            scheduler.run_bot_loop(task_bot_id, task_shutdown).await;
        });

        tasks.insert(bot_id, BotTask { handle, shutdown });
    }

    /// Number of bot schedules currently running. Used as the liveness
    /// probe behind the `rebalancer_active_bots` gauge.
    pub fn active_count(&self) -> u64 {
        self.tasks.lock().unwrap().len() as u64
    }

    /// Requests the bot's task to stop after its current tick (if any)
    /// completes. Does not abort an in-flight tick.
    pub fn stop(&self, bot_id: &str) {
        if let Some(task) = self.tasks.lock().unwrap().remove(bot_id) {
            // Notify rather than abort: a tick already in flight runs to
            // completion, and the task exits on its own at the next
            // select! iteration.
            task.shutdown.notify_one();
            drop(task.handle);
        }
    }

    async fn run_bot_loop(self: Arc<Self>, bot_id: String, shutdown: Arc<Notify>) {
        let Ok(Some(bot)) = self.bots.find(&bot_id).await else {
            warn!(bot_id, "scheduler could not load bot at startup; aborting task");
            return;
        };
        let period = Duration::from_secs((bot.check_interval_minutes.max(1) * 60) as u64);
        let mut interval = tokio::time::interval(period);
        let running = AtomicBool::new(false);

        info!(bot_id, period_secs = period.as_secs(), "bot schedule started");

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!(bot_id, "bot schedule stopping");
                    break;
                }
                _ = interval.tick() => {
                    if running.swap(true, Ordering::SeqCst) {
                        warn!(bot_id, "previous tick still running; skipping this fire");
                        continue;
                    }
                    if let Err(e) = self.tick(&bot_id).await {
                        error!(bot_id, error = %e, "tick failed");
                    }
                    running.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    #[instrument(skip(self))]
    async fn tick(&self, bot_id: &str) -> Result<()> {
        let Some(mut bot) = self.bots.find(bot_id).await? else {
            return Err(RebalancerError::Invariant {
                detail: format!("bot {bot_id} disappeared mid-schedule"),
            }
            .into());
        };

        let mut prices = HashMap::new();
        for coin in &bot.coins {
            match self.price_oracle.get_price(coin, &bot.preferred_stablecoin).await {
                Ok(quote) => {
                    prices.insert(coin.clone(), quote.price);
                }
                Err(e) => warn!(bot_id, coin, error = %e, "price lookup failed for tick"),
            }
        }

        self.snapshots.ensure_baselines(&bot, &prices).await?;

        bot.last_check_time = Some(Utc::now());
        self.bots.save(&bot).await?;

        let Some(current_coin) = bot.current_coin.clone() else {
            return Ok(());
        };
        let held_amount = self
            .assets
            .find(bot_id, &current_coin)
            .await?
            .map(|a| a.amount)
            .unwrap_or_default();

        let commission_rate = match self.broker.get_commission_rates(&bot.account_id).await {
            Ok(rates) => rates.taker,
            Err(e) => {
                warn!(bot_id, error = %e, "commission rate lookup failed; using bot's stored rate");
                bot.commission_rate
            }
        };

        let decision = self
            .decision_engine
            .evaluate(&bot, held_amount, &prices, commission_rate)
            .await?;

        if let Decision::Swap { from, to, .. } = decision {
            let outcome = self
                .executor
                .execute(bot_id, &bot.account_id, &from, &to, &bot.preferred_stablecoin, commission_rate)
                .await?;
            match outcome {
                ExecutionOutcome::Completed { trade } => {
                    info!(bot_id, trade_id = trade.trade_id.as_deref().unwrap_or("pending"), "tick completed a swap");
                }
                ExecutionOutcome::Locked => info!(bot_id, "swap skipped: asset locked"),
                ExecutionOutcome::AssetMissing => {
                    warn!(bot_id, "swap skipped: held asset row missing")
                }
                ExecutionOutcome::Failed { error, .. } => {
                    warn!(bot_id, error, "swap attempt failed")
                }
            }
        }

        Ok(())
    }
}
