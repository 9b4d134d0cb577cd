use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The bot's currently-held position in a single coin. Invariant: exactly
/// one Asset row exists per bot whenever `Bot::current_coin` is non-null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub bot_id: String,
    pub coin: String,
    pub amount: Decimal,
    pub entry_price: Decimal,
    pub stablecoin_equivalent: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Asset {
    pub fn new(
        bot_id: impl Into<String>,
        coin: impl Into<String>,
        amount: Decimal,
        entry_price: Decimal,
        stablecoin_equivalent: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            bot_id: bot_id.into(),
            coin: coin.into(),
            amount,
            entry_price,
            stablecoin_equivalent,
            last_updated: now,
        }
    }
}
