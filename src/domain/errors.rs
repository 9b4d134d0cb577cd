//! Error taxonomy for the bot evaluation and swap engine.
//!
//! One enum covers every kind named in the design: a tick catches this type
//! at its outermost boundary and decides, per variant, whether to abort the
//! trade, skip a coin, or simply log and continue on schedule.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RebalancerError {
    #[error("config missing: {field}")]
    ConfigMissing { field: String },

    #[error("price unavailable for {coin}: primary={primary_reason}, fallback={fallback_reason}")]
    PriceUnavailable {
        coin: String,
        primary_reason: String,
        fallback_reason: String,
    },

    #[error("broker error ({code}): {message}")]
    BrokerError { code: u16, message: String },

    #[error("lock conflict on {coin}: held by another bot")]
    LockConflict { coin: String },

    #[error("asset missing for bot {bot_id} coin {coin}")]
    AssetMissing { bot_id: String, coin: String },

    #[error("insufficient funds: need {need}, available {available}")]
    InsufficientFunds { need: Decimal, available: Decimal },

    #[error("trade timed out awaiting completion; last status: {last_status}")]
    TradeTimeout { last_status: String },

    #[error("internal invariant violated: {detail}")]
    Invariant { detail: String },
}

impl RebalancerError {
    /// Whether this error should abort the in-flight tick immediately
    /// rather than being recorded and absorbed.
    pub fn is_fatal_to_tick(&self) -> bool {
        matches!(self, RebalancerError::Invariant { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_funds_formats_amounts() {
        let err = RebalancerError::InsufficientFunds {
            need: dec!(100),
            available: dec!(40),
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn only_invariant_is_fatal_to_tick() {
        assert!(
            RebalancerError::Invariant {
                detail: "x".into()
            }
            .is_fatal_to_tick()
        );
        assert!(
            !RebalancerError::LockConflict { coin: "ADA".into() }.is_fatal_to_tick()
        );
    }
}
