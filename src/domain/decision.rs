use crate::domain::deviation::DeviationMetrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured reason code for rejected or skipped swaps, used both on
/// `Decision::NoOp` and when writing a `MissedTrade` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOpReason {
    NoCurrentCoin,
    MissingPriceData,
    BelowThreshold,
    ProgressProtection,
    InsufficientFunds,
    MinTradeAmount,
    AssetLocked,
    ExchangeError,
    Other,
}

impl NoOpReason {
    pub fn as_missed_trade_code(&self) -> &'static str {
        match self {
            NoOpReason::NoCurrentCoin | NoOpReason::MissingPriceData => "other",
            NoOpReason::BelowThreshold => "below_threshold",
            NoOpReason::ProgressProtection => "progress_protection",
            NoOpReason::InsufficientFunds => "insufficient_funds",
            NoOpReason::MinTradeAmount => "min_trade_amount",
            NoOpReason::AssetLocked => "asset_locked",
            NoOpReason::ExchangeError => "exchange_error",
            NoOpReason::Other => "other",
        }
    }
}

/// The outcome of one Swap Decision Engine evaluation.
#[derive(Debug, Clone)]
pub enum Decision {
    NoOp {
        reason: NoOpReason,
    },
    Swap {
        from: String,
        to: String,
        score: Decimal,
        metrics: DeviationMetrics,
    },
}

impl Decision {
    pub fn is_swap(&self) -> bool {
        matches!(self, Decision::Swap { .. })
    }
}
