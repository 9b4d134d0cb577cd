//! Trait abstractions the application layer depends on. Mirrors the
//! repository/port split of the teacher: business logic is written only
//! against these traits, never against a concrete broker or database.

use crate::domain::asset::Asset;
use crate::domain::bot::Bot;
use crate::domain::deviation::CoinDeviationRecord;
use crate::domain::lock::{AssetLock, PriceHistoryEntry};
use crate::domain::snapshot::{CoinSnapshot, CoinUnitTracker};
use crate::domain::trade::{BotResetEvent, MissedTrade, Trade, TradeStep};
use crate::domain::types::{OrderPositionType, PriceQuote};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A single price provider (broker direct-rate endpoint, or public
/// aggregator). The Price Oracle composes two of these with fallback.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn get_price(&self, coin: &str, quote: &str) -> Result<Decimal>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct AccountBalance {
    pub coin: String,
    pub amount: Decimal,
    pub amount_in_usd: Decimal,
}

#[derive(Debug, Clone)]
pub struct CommissionRates {
    pub maker: Decimal,
    pub taker: Decimal,
    pub source: CommissionSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommissionSource {
    Api,
    AccountInfo,
    Default,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct TradeHandle {
    pub trade_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerTradeStatus {
    InProgress,
    Completed,
    Closed,
    Done,
    Finished,
    Cancelled,
    Failed,
}

impl BrokerTradeStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BrokerTradeStatus::InProgress)
    }
}

/// Raw broker response fields consulted, in precedence order, to resolve
/// the realized amount of a completed trade (spec §4.7/§6).
#[derive(Debug, Clone, Default)]
pub struct BrokerTradeResult {
    pub status: Option<BrokerTradeStatus>,
    pub entered_total: Option<Decimal>,
    pub entered_amount: Option<Decimal>,
    pub position_total_value: Option<Decimal>,
    pub position_done_quantity: Option<Decimal>,
    pub position_done_average_price: Option<Decimal>,
    pub position_quantity: Option<Decimal>,
    pub position_units: Option<Decimal>,
    pub raw: serde_json::Value,
}

/// Resolve the realized output amount from a broker trade result,
/// trying each field in the precedence order named in spec §4.7.
pub fn resolve_realized_amount(result: &BrokerTradeResult) -> Option<Decimal> {
    result
        .entered_total
        .or(result.entered_amount)
        .or(result.position_total_value)
        .or_else(|| {
            match (result.position_done_quantity, result.position_done_average_price) {
                (Some(q), Some(p)) => Some(q * p),
                _ => None,
            }
        })
        .or(result.position_quantity)
        .or(result.position_units)
}

/// Authenticated signed RPC to a single external exchange/trading service.
#[async_trait]
pub trait ExchangeBroker: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    async fn get_account_balances(&self, account_id: &str) -> Result<Vec<AccountBalance>>;
    async fn get_market_rate(&self, base: &str, quote: &str) -> Result<PriceQuote>;
    async fn get_commission_rates(&self, account_id: &str) -> Result<CommissionRates>;
    #[allow(clippy::too_many_arguments)]
    async fn submit_market_trade(
        &self,
        account_id: &str,
        pair: &str,
        position_type: OrderPositionType,
        amount: Decimal,
        take_profit_percent: Option<Decimal>,
        demo: bool,
    ) -> Result<TradeHandle>;
    async fn get_trade(&self, handle: &TradeHandle) -> Result<BrokerTradeResult>;
    async fn await_trade_completion(
        &self,
        handle: &TradeHandle,
        max_wait: std::time::Duration,
    ) -> Result<BrokerTradeResult>;
}

#[async_trait]
pub trait BotRepository: Send + Sync {
    async fn find(&self, bot_id: &str) -> Result<Option<Bot>>;
    async fn find_enabled(&self) -> Result<Vec<Bot>>;
    async fn save(&self, bot: &Bot) -> Result<()>;
}

#[async_trait]
pub trait AssetRepository: Send + Sync {
    async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<Asset>>;
    async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<Asset>>;
    async fn upsert(&self, asset: &Asset) -> Result<()>;
    async fn delete(&self, bot_id: &str, coin: &str) -> Result<()>;
}

#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    async fn find(&self, bot_id: &str, coin: &str) -> Result<Option<CoinSnapshot>>;
    async fn find_for_bot(&self, bot_id: &str) -> Result<Vec<CoinSnapshot>>;
    async fn upsert(&self, snapshot: &CoinSnapshot) -> Result<()>;
    async fn delete_for_bot(&self, bot_id: &str) -> Result<()>;
    async fn upsert_unit_tracker(&self, tracker: &CoinUnitTracker) -> Result<()>;
}

#[async_trait]
pub trait DeviationLogRepository: Send + Sync {
    async fn record(&self, entry: &CoinDeviationRecord) -> Result<()>;
}

#[async_trait]
pub trait TradeRepository: Send + Sync {
    /// Upserts by `trade.id` (the stable row identity), never by the
    /// broker-facing `trade_id`, so completing a trade updates the same
    /// row in place instead of inserting a new one.
    async fn save_parent(&self, trade: &Trade) -> Result<()>;
    async fn save_step(&self, step: &TradeStep) -> Result<()>;
    /// Looks up a parent trade by its stable `id`, not its broker `trade_id`.
    async fn find_parent(&self, id: &str) -> Result<Option<Trade>>;
    async fn find_steps(&self, parent_trade_id: &str) -> Result<Vec<TradeStep>>;
}

#[async_trait]
pub trait MissedTradeRepository: Send + Sync {
    async fn record(&self, missed: &MissedTrade) -> Result<()>;
}

#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Atomically insert a new lock row after verifying no conflicting
    /// lock exists. Implementations must make the check-then-insert
    /// serializable.
    async fn try_acquire(&self, lock: &AssetLock) -> Result<bool>;
    async fn find_conflicting(&self, coin: &str, bot_id: &str, now: DateTime<Utc>) -> Result<Option<AssetLock>>;
    async fn find(&self, lock_id: &str) -> Result<Option<AssetLock>>;
    async fn release(&self, lock_id: &str, bot_id: &str) -> Result<bool>;
    async fn extend(&self, lock_id: &str, bot_id: &str, new_expires_at: DateTime<Utc>) -> Result<bool>;
    /// Transition expired `Locked` rows to `Released`; used by the
    /// 60s sweeper.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait PriceHistoryRepository: Send + Sync {
    async fn record(&self, entry: &PriceHistoryEntry) -> Result<()>;
}

#[async_trait]
pub trait BotResetRepository: Send + Sync {
    async fn record(&self, event: &BotResetEvent) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Trade,
}

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append(&self, level: LogLevel, target: &str, message: &str, bot_id: Option<&str>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn resolve_realized_amount_prefers_entered_total() {
        let result = BrokerTradeResult {
            entered_total: Some(dec!(100)),
            entered_amount: Some(dec!(999)),
            ..Default::default()
        };
        assert_eq!(resolve_realized_amount(&result), Some(dec!(100)));
    }

    #[test]
    fn resolve_realized_amount_falls_back_to_done_quantity_times_price() {
        let result = BrokerTradeResult {
            position_done_quantity: Some(dec!(2)),
            position_done_average_price: Some(dec!(50)),
            ..Default::default()
        };
        assert_eq!(resolve_realized_amount(&result), Some(dec!(100)));
    }

    #[test]
    fn resolve_realized_amount_returns_none_when_all_absent() {
        let result = BrokerTradeResult::default();
        assert_eq!(resolve_realized_amount(&result), None);
    }

    #[test]
    fn broker_trade_status_in_progress_is_not_terminal() {
        assert!(!BrokerTradeStatus::InProgress.is_terminal());
        assert!(BrokerTradeStatus::Completed.is_terminal());
        assert!(BrokerTradeStatus::Cancelled.is_terminal());
    }
}
