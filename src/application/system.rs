//! Application bootstrap: wires infrastructure adapters into the domain
//! ports, builds the application services, and owns process-lifetime
//! background tasks (scheduler, lock sweeper, metrics reporter).

use crate::application::asset_lock_manager::AssetLockManager;
use crate::application::price_oracle::PriceOracle;
use crate::application::reconciliation::Reconciler;
use crate::application::scheduler::Scheduler;
use crate::application::snapshot_manager::SnapshotManager;
use crate::application::swap_decision_engine::SwapDecisionEngine;
use crate::application::trade_executor::TradeExecutor;
use crate::config::Config;
use crate::domain::ports::{AssetRepository, BotRepository, ExchangeBroker};
use crate::infrastructure::broker::ExchangeBrokerClient;
use crate::infrastructure::mock::MockExchangeBroker;
use crate::infrastructure::observability::metrics::Metrics;
use crate::infrastructure::observability::reporter::MetricsReporter;
use crate::infrastructure::persistence::database::Database;
use crate::infrastructure::persistence::repositories::asset_repository::SqliteAssetRepository;
use crate::infrastructure::persistence::repositories::bot_repository::SqliteBotRepository;
use crate::infrastructure::persistence::repositories::lock_repository::SqliteLockRepository;
use crate::infrastructure::persistence::repositories::misc_repositories::SqliteMissedTradeRepository;
use crate::infrastructure::persistence::repositories::snapshot_repository::SqliteSnapshotRepository;
use crate::infrastructure::persistence::repositories::trade_repository::SqliteTradeRepository;
use crate::infrastructure::price::aggregator_provider::AggregatorPriceProvider;
use crate::infrastructure::price::broker_rate_provider::BrokerRateProvider;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything the running process needs, already wired together.
pub struct Application {
    pub config: Config,
    pub database: Database,
    pub bots: Arc<dyn BotRepository>,
    pub assets: Arc<dyn AssetRepository>,
    pub broker: Arc<dyn ExchangeBroker>,
    pub lock_manager: Arc<AssetLockManager>,
    pub reconciler: Arc<Reconciler>,
    pub scheduler: Arc<Scheduler>,
    pub metrics: Metrics,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        info!("building application");

        let database = Database::new(&config.runtime.database_url).await?;

        let bots: Arc<dyn BotRepository> = Arc::new(SqliteBotRepository::new(&database));
        let assets: Arc<dyn AssetRepository> = Arc::new(SqliteAssetRepository::new(&database));
        let snapshot_repo = Arc::new(SqliteSnapshotRepository::new(&database));
        let trade_repo = Arc::new(SqliteTradeRepository::new(&database));
        let lock_repo = Arc::new(SqliteLockRepository::new(&database));
        let missed_trade_repo = Arc::new(SqliteMissedTradeRepository::new(&database));

        let broker: Arc<dyn ExchangeBroker> = if config.runtime.use_mock_data {
            info!("USE_MOCK_DATA set: using in-memory mock broker, no live balance reads");
            Arc::new(MockExchangeBroker::new())
        } else {
            Arc::new(ExchangeBrokerClient::new(
                config.exchange.api_key.clone(),
                config.exchange.api_secret.clone(),
                config.exchange.base_url.clone(),
            ))
        };

        let broker_provider = Arc::new(BrokerRateProvider::new(broker.clone()));
        let fallback_provider: Arc<dyn crate::domain::ports::PriceProvider> =
            if config.runtime.use_mock_data {
                Arc::new(BrokerRateProvider::new(broker.clone()))
            } else {
                Arc::new(AggregatorPriceProvider::new(config.exchange.aggregator_base_url.clone()))
            };
        let price_oracle = Arc::new(PriceOracle::new(broker_provider, fallback_provider));

        let snapshots = Arc::new(SnapshotManager::new(snapshot_repo));
        let decision_engine = Arc::new(SwapDecisionEngine::new(snapshots.clone(), missed_trade_repo));
        let lock_manager = Arc::new(AssetLockManager::new(lock_repo, assets.clone()));
        let reconciler = Arc::new(Reconciler::new(assets.clone(), broker.clone()));

        let executor = Arc::new(TradeExecutor::new(
            broker.clone(),
            assets.clone(),
            bots.clone(),
            trade_repo,
            lock_manager.clone(),
            snapshots.clone(),
            config.runtime.simulate_trades,
        ));

        let scheduler = Scheduler::new(
            bots.clone(),
            assets.clone(),
            price_oracle,
            snapshots,
            decision_engine,
            executor,
            broker.clone(),
        );

        let metrics = Metrics::new()?;

        Ok(Self {
            config,
            database,
            bots,
            assets,
            broker,
            lock_manager,
            reconciler,
            scheduler,
            metrics,
        })
    }

    /// Starts all background tasks (per-bot schedules, the expired-lock
    /// sweeper, and the metrics reporter) and returns immediately. The
    /// caller is responsible for awaiting a shutdown signal and then
    /// calling `shutdown`.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        self.scheduler.start_all_enabled().await?;

        let sweeper = self.lock_manager.clone();
        let sweep_period = Duration::from_secs(self.config.runtime.lock_sweep_interval_seconds);
        tokio::spawn(async move {
            sweeper.run_sweeper(sweep_period).await;
        });

        let reconciler = self.reconciler.clone();
        let bots = self.bots.clone();
        let reconcile_period = Duration::from_secs(self.config.runtime.reconciliation_interval_seconds);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(reconcile_period);
            loop {
                interval.tick().await;
                let Ok(enabled) = bots.find_enabled().await else {
                    continue;
                };
                for bot in enabled {
                    if let Err(e) = reconciler.reconcile(&bot.bot_id, &bot.account_id).await {
                        warn!(bot_id = %bot.bot_id, error = %e, "reconciliation pass failed");
                    }
                }
            }
        });

        if self.config.observability.enabled {
            let scheduler = self.scheduler.clone();
            let reporter = MetricsReporter::new(
                self.metrics.clone(),
                self.config.observability.report_interval_seconds,
                move || scheduler.active_count(),
            );
            tokio::spawn(async move {
                reporter.run().await;
            });
            info!(
                interval_seconds = self.config.observability.report_interval_seconds,
                "metrics reporter started"
            );
        }

        Ok(())
    }

    /// Stops every running bot schedule. Called once, on process shutdown.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down: stopping all bot schedules");
        for bot in self.bots.find_enabled().await? {
            self.scheduler.stop(&bot.bot_id);
        }
        Ok(())
    }
}
