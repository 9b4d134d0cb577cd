//! End-to-end scenario tests driven against a real (temp-file) SQLite
//! database and a deterministic in-memory broker, exercising the
//! application layer the way the scheduler does but one tick at a time
//! so each scenario's inputs and assertions stay explicit.

use rebalancer::application::asset_lock_manager::{AssetLockManager, CanTrade};
use rebalancer::application::snapshot_manager::SnapshotManager;
use rebalancer::application::swap_decision_engine::SwapDecisionEngine;
use rebalancer::application::trade_executor::{ExecutionOutcome, TradeExecutor};
use rebalancer::domain::asset::Asset;
use rebalancer::domain::bot::Bot;
use rebalancer::domain::decision::{Decision, NoOpReason};
use rebalancer::domain::ports::{AssetRepository, BotRepository};
use rebalancer::infrastructure::mock::MockExchangeBroker;
use rebalancer::infrastructure::persistence::database::Database;
use rebalancer::infrastructure::persistence::repositories::asset_repository::SqliteAssetRepository;
use rebalancer::infrastructure::persistence::repositories::bot_repository::SqliteBotRepository;
use rebalancer::infrastructure::persistence::repositories::lock_repository::SqliteLockRepository;
use rebalancer::infrastructure::persistence::repositories::misc_repositories::SqliteMissedTradeRepository;
use rebalancer::infrastructure::persistence::repositories::snapshot_repository::SqliteSnapshotRepository;
use rebalancer::infrastructure::persistence::repositories::trade_repository::SqliteTradeRepository;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

fn basket_bot(bot_id: &str, account_id: &str, coins: &[&str], current: &str) -> Bot {
    Bot {
        bot_id: bot_id.to_string(),
        user_id: "user1".to_string(),
        name: format!("{bot_id}-bot"),
        coins: coins.iter().map(|c| c.to_string()).collect(),
        initial_coin: current.to_string(),
        current_coin: Some(current.to_string()),
        threshold_percent: dec!(10),
        global_threshold_percent: dec!(10),
        check_interval_minutes: 15,
        commission_rate: dec!(0.002),
        preferred_stablecoin: "USDT".to_string(),
        reference_coin: coins[0].to_string(),
        allocation_percent: None,
        manual_budget_amount: None,
        use_take_profit: false,
        take_profit_percent: None,
        enabled: true,
        last_check_time: None,
        global_peak_value: Decimal::ZERO,
        global_peak_value_in_eth: Decimal::ZERO,
        total_commissions_paid: Decimal::ZERO,
        account_id: account_id.to_string(),
    }
}

/// Shared fixture: a fresh temp-file SQLite database with every repository
/// wired up, plus a `SwapDecisionEngine` ready to evaluate ticks.
struct Fixture {
    bots: Arc<SqliteBotRepository>,
    assets: Arc<SqliteAssetRepository>,
    snapshots: Arc<SnapshotManager>,
    decision_engine: SwapDecisionEngine,
    lock_manager: Arc<AssetLockManager>,
    broker: Arc<MockExchangeBroker>,
    executor: TradeExecutor,
}

async fn build_fixture() -> Fixture {
    let path = std::env::temp_dir().join(format!("rebalancer-scenario-{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", path.display());
    let database = Database::new(&db_url).await.expect("open temp database");

    let bots = Arc::new(SqliteBotRepository::new(&database));
    let assets = Arc::new(SqliteAssetRepository::new(&database));
    let snapshot_repo = Arc::new(SqliteSnapshotRepository::new(&database));
    let trade_repo = Arc::new(SqliteTradeRepository::new(&database));
    let lock_repo = Arc::new(SqliteLockRepository::new(&database));
    let missed_trade_repo = Arc::new(SqliteMissedTradeRepository::new(&database));

    let snapshots = Arc::new(SnapshotManager::new(snapshot_repo));
    let decision_engine = SwapDecisionEngine::new(snapshots.clone(), missed_trade_repo);
    let lock_manager = Arc::new(AssetLockManager::new(lock_repo, assets.clone()));
    let broker = Arc::new(MockExchangeBroker::new());

    let executor = TradeExecutor::new(
        broker.clone(),
        assets.clone(),
        bots.clone(),
        trade_repo,
        lock_manager.clone(),
        snapshots.clone(),
        false,
    );

    Fixture {
        bots,
        assets,
        snapshots,
        decision_engine,
        lock_manager,
        broker,
        executor,
    }
}

async fn seed_bot_with_baselines(
    fx: &Fixture,
    bot: &Bot,
    baselines: &[(&str, Decimal)],
    held_amount: Decimal,
) {
    fx.bots.save(bot).await.unwrap();
    let mut prices = HashMap::new();
    for (coin, price) in baselines {
        prices.insert(coin.to_string(), *price);
    }
    fx.snapshots.ensure_baselines(bot, &prices).await.unwrap();
    if let Some(current) = &bot.current_coin {
        let asset = Asset::new(&bot.bot_id, current, held_amount, baselines[0].1, Decimal::ZERO, chrono::Utc::now());
        fx.assets.upsert(&asset).await.unwrap();
    }
}

/// S1 — prices move but stay within the threshold: no admissible
/// candidate, no swap, no missed trade.
#[tokio::test]
async fn s1_below_threshold_yields_no_op() {
    let fx = build_fixture().await;
    let bot = basket_bot("bot-s1", "acct-s1", &["BTC", "ETH", "SOL"], "BTC");
    seed_bot_with_baselines(
        &fx,
        &bot,
        &[("BTC", dec!(50000)), ("ETH", dec!(3000)), ("SOL", dec!(150))],
        dec!(1),
    )
    .await;

    let mut now_prices = HashMap::new();
    now_prices.insert("BTC".to_string(), dec!(50000));
    now_prices.insert("ETH".to_string(), dec!(3060));
    now_prices.insert("SOL".to_string(), dec!(153));

    let decision = fx
        .decision_engine
        .evaluate(&bot, dec!(1), &now_prices, bot.commission_rate)
        .await
        .unwrap();

    assert!(matches!(decision, Decision::NoOp { reason: NoOpReason::BelowThreshold }));
}

/// S2 — ETH drops far enough to be admitted and selected over SOL; after
/// execution the held Asset flips from BTC to ETH.
#[tokio::test]
async fn s2_admitted_swap_flips_held_asset() {
    let fx = build_fixture().await;
    let bot = basket_bot("bot-s2", "acct-s2", &["BTC", "ETH", "SOL"], "BTC");
    let btc_amount = dec!(1);
    seed_bot_with_baselines(
        &fx,
        &bot,
        &[("BTC", dec!(50000)), ("ETH", dec!(3000)), ("SOL", dec!(150))],
        btc_amount,
    )
    .await;

    fx.broker.set_price("BTC", "USDT", dec!(50000)).await;
    fx.broker.set_price("ETH", "USDT", dec!(2400)).await;

    let mut now_prices = HashMap::new();
    now_prices.insert("BTC".to_string(), dec!(50000));
    now_prices.insert("ETH".to_string(), dec!(2400));
    now_prices.insert("SOL".to_string(), dec!(135));

    let decision = fx
        .decision_engine
        .evaluate(&bot, btc_amount, &now_prices, bot.commission_rate)
        .await
        .unwrap();

    let Decision::Swap { from, to, .. } = decision else {
        panic!("expected an admitted swap, got {decision:?}");
    };
    assert_eq!(from, "BTC");
    assert_eq!(to, "ETH");

    let outcome = fx
        .executor
        .execute("bot-s2", "acct-s2", &from, &to, "USDT", bot.commission_rate)
        .await
        .unwrap();

    let ExecutionOutcome::Completed { .. } = outcome else {
        panic!("expected the swap to complete, got a non-completed outcome");
    };

    assert!(fx.assets.find("bot-s2", "BTC").await.unwrap().is_none());
    let eth_asset = fx.assets.find("bot-s2", "ETH").await.unwrap().expect("ETH asset created");
    assert!(eth_asset.amount > Decimal::ZERO);

    let reloaded_bot = fx.bots.find("bot-s2").await.unwrap().expect("bot still exists");
    assert_eq!(reloaded_bot.current_coin.as_deref(), Some("ETH"));
}

/// S3 — even though ETH scores as an admissible candidate, the bot's
/// global peak value protection blocks the swap and logs a MissedTrade.
#[tokio::test]
async fn s3_global_protection_blocks_swap() {
    let fx = build_fixture().await;
    let mut bot = basket_bot("bot-s3", "acct-s3", &["BTC", "ETH"], "BTC");
    bot.global_peak_value = dec!(60000);
    bot.global_threshold_percent = dec!(10);

    seed_bot_with_baselines(&fx, &bot, &[("BTC", dec!(55000)), ("ETH", dec!(3000))], dec!(1)).await;

    let mut now_prices = HashMap::new();
    now_prices.insert("BTC".to_string(), dec!(52000));
    now_prices.insert("ETH".to_string(), dec!(2400));

    let decision = fx
        .decision_engine
        .evaluate(&bot, dec!(1), &now_prices, dec!(0.002))
        .await
        .unwrap();

    assert!(matches!(decision, Decision::NoOp { reason: NoOpReason::ProgressProtection }));
}

/// S5 — two bots holding the same coin on the same account contend for
/// the lock; the loser observes `Locked` and never reaches the broker.
#[tokio::test]
async fn s5_concurrent_bots_contend_for_the_same_coin() {
    let fx = build_fixture().await;
    let shared_amount = dec!(2);

    let asset_a = Asset::new("bot-a", "ADA", shared_amount, dec!(1), Decimal::ZERO, chrono::Utc::now());
    let asset_b = Asset::new("bot-b", "ADA", shared_amount, dec!(1), Decimal::ZERO, chrono::Utc::now());
    fx.assets.upsert(&asset_a).await.unwrap();
    fx.assets.upsert(&asset_b).await.unwrap();

    assert!(matches!(
        fx.lock_manager.can_trade("bot-a", "ADA", shared_amount).await.unwrap(),
        CanTrade::Ok
    ));

    let acquired = fx
        .lock_manager
        .acquire("bot-a", "ADA", shared_amount, "s5-test", 5)
        .await
        .unwrap()
        .expect("bot-a acquires the lock uncontested");

    assert!(matches!(
        fx.lock_manager.can_trade("bot-b", "ADA", shared_amount).await.unwrap(),
        CanTrade::Locked
    ));

    assert!(fx.lock_manager.release(&acquired.lock_id, "bot-a").await.unwrap());

    assert!(matches!(
        fx.lock_manager.can_trade("bot-b", "ADA", shared_amount).await.unwrap(),
        CanTrade::Ok
    ));
}
