use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which provider produced a price, and whether it was reached
/// via the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    BrokerDirect,
    Aggregator,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::BrokerDirect => write!(f, "broker_direct"),
            PriceSource::Aggregator => write!(f, "aggregator"),
        }
    }
}

/// A price observation: the value and which provider/path produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: rust_decimal::Decimal,
    pub source: PriceSource,
    pub was_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderPositionType {
    Buy,
    Sell,
}

impl fmt::Display for OrderPositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPositionType::Buy => write!(f, "buy"),
            OrderPositionType::Sell => write!(f, "sell"),
        }
    }
}

/// Severity classification for reconciliation discrepancies between
/// bot-tracked Asset rows and broker-reported balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscrepancySeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub bot_id: String,
    pub coin: String,
    pub tracked_amount: rust_decimal::Decimal,
    pub broker_amount: rust_decimal::Decimal,
    pub percent_divergence: rust_decimal::Decimal,
    pub severity: DiscrepancySeverity,
    pub observed_at: DateTime<Utc>,
}

/// Classify a balance discrepancy by percent divergence.
///
/// HIGH: > 5%, MEDIUM: > 1%, LOW: otherwise (but nonzero).
pub fn classify_discrepancy_severity(percent_divergence: rust_decimal::Decimal) -> DiscrepancySeverity {
    let magnitude = percent_divergence.abs();
    if magnitude > rust_decimal::Decimal::new(5, 0) {
        DiscrepancySeverity::High
    } else if magnitude > rust_decimal::Decimal::new(1, 0) {
        DiscrepancySeverity::Medium
    } else {
        DiscrepancySeverity::Low
    }
}
