use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Baseline and re-entry guard for one (bot, coin) pair.
///
/// `initial_price` is immutable once set; resetting a bot deletes the row
/// rather than mutating it. `max_units_reached` is monotonically
/// non-decreasing for the life of the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    pub bot_id: String,
    pub coin: String,
    pub initial_price: Decimal,
    pub snapshot_timestamp: DateTime<Utc>,
    pub units_held: Decimal,
    pub eth_equivalent_value: Decimal,
    pub was_ever_held: bool,
    pub max_units_reached: Decimal,
}

impl CoinSnapshot {
    pub fn new_baseline(
        bot_id: impl Into<String>,
        coin: impl Into<String>,
        initial_price: Decimal,
        was_ever_held: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            coin: coin.into(),
            initial_price,
            snapshot_timestamp: now,
            units_held: Decimal::ZERO,
            eth_equivalent_value: Decimal::ZERO,
            was_ever_held,
            max_units_reached: Decimal::ZERO,
        }
    }

    /// Apply an observed unit count, enforcing monotonicity of
    /// `max_units_reached` and flipping `was_ever_held`.
    pub fn record_units(&mut self, units: Decimal, eth_equivalent_value: Decimal, now: DateTime<Utc>) {
        self.units_held = units;
        self.eth_equivalent_value = eth_equivalent_value;
        self.was_ever_held = true;
        if units > self.max_units_reached {
            self.max_units_reached = units;
        }
        self.snapshot_timestamp = now;
    }
}

/// Running units per (bot, coin), updated on every asset mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinUnitTracker {
    pub bot_id: String,
    pub coin: String,
    pub units: Decimal,
    pub updated_at: DateTime<Utc>,
}
