use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    InProgress,
    Completed,
    Failed,
}

/// A parent trade row with zero, one, or two child steps.
///
/// `id` is the stable row identity, assigned once and never rewritten —
/// every `TradeStep.parent_trade_id` points at it, so steps stay joined to
/// their parent even though `trade_id` changes. `trade_id` is the
/// broker-facing id: `None` until execution completes, then set to the
/// broker's own id (direct trade) or `step1.trade_id + "-" + step2.trade_id`
/// (two-step trade). It is neither required nor unique (spec §6/§9 open
/// question) — callers must not treat it as present before
/// `status == Completed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub trade_id: Option<String>,
    pub bot_id: String,
    pub from_coin: String,
    pub to_coin: String,
    pub from_amount: Decimal,
    pub to_amount: Option<Decimal>,
    pub from_price: Option<Decimal>,
    pub to_price: Option<Decimal>,
    pub commission_amount: Decimal,
    pub commission_rate: Decimal,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Trade {
    pub fn new_parent(bot_id: impl Into<String>, from: impl Into<String>, to: impl Into<String>, amount: Decimal, commission_rate: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            trade_id: None,
            bot_id: bot_id.into(),
            from_coin: from.into(),
            to_coin: to.into(),
            from_amount: amount,
            to_amount: None,
            from_price: None,
            to_price: None,
            commission_amount: Decimal::ZERO,
            commission_rate,
            status: TradeStatus::InProgress,
            created_at: now,
            completed_at: None,
        }
    }
}

/// One leg of a two-step trade. `parent_trade_id` holds the parent's
/// stable `id`, not its (possibly still-`None`) broker `trade_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeStep {
    pub parent_trade_id: String,
    pub step_number: u8,
    pub trade_id: String,
    pub from_coin: String,
    pub to_coin: String,
    pub from_amount: Decimal,
    pub to_amount: Decimal,
    pub from_price: Decimal,
    pub to_price: Decimal,
    pub commission_amount: Decimal,
    pub commission_rate: Decimal,
    pub status: TradeStatus,
    pub executed_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub raw_data: serde_json::Value,
}

/// An append-only record of a candidate that scored positively but failed
/// an admission rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissedTrade {
    pub bot_id: String,
    pub from_coin: String,
    pub to_coin: String,
    pub reason_code: String,
    pub context: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotResetEvent {
    pub bot_id: String,
    pub reset_at: DateTime<Utc>,
    pub reason: String,
}

/// Given two completed step trade ids, join them into the parent trade_id
/// per spec §4.7/§8: `parent.trade_id == step1.trade_id + "-" + step2.trade_id`.
pub fn join_step_trade_ids(step1_trade_id: &str, step2_trade_id: &str) -> String {
    format!("{}-{}", step1_trade_id, step2_trade_id)
}
