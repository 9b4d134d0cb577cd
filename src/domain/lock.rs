use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    Locked,
    Released,
}

/// A leased claim over a (bot, coin) pair, preventing other bots from
/// submitting trades that mutate the same exchange balance.
///
/// A lock is "held" only when `status == Locked AND expires_at > now`;
/// amount-based partial sharing is explicitly not implemented (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetLock {
    pub lock_id: String,
    pub bot_id: String,
    pub coin: String,
    pub amount: Decimal,
    pub reason: String,
    pub status: LockStatus,
    pub expires_at: DateTime<Utc>,
}

impl AssetLock {
    pub fn is_held_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LockStatus::Locked && self.expires_at > now
    }

    /// Whether this lock conflicts with a trade attempted by `other_bot_id`
    /// on this coin: any unexpired, locked row owned by a *different* bot.
    pub fn conflicts_with(&self, other_bot_id: &str, now: DateTime<Utc>) -> bool {
        self.is_held_at(now) && self.bot_id != other_bot_id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistoryEntry {
    pub bot_id: String,
    pub coin: String,
    pub price: Decimal,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}
