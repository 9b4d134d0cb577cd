use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The top-level configuration and runtime-state record for one bot.
///
/// `coins` is stored as a plain ordered `Vec<String>` rather than behind a
/// `getCoinsArray()`-style accessor: rows are data, behavior lives in free
/// functions over that data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bot {
    pub bot_id: String,
    pub user_id: String,
    pub name: String,

    // Strategy
    pub coins: Vec<String>,
    pub initial_coin: String,
    pub current_coin: Option<String>,
    pub threshold_percent: Decimal,
    pub global_threshold_percent: Decimal,
    pub check_interval_minutes: i64,
    pub commission_rate: Decimal,
    pub preferred_stablecoin: String,
    pub reference_coin: String,
    pub allocation_percent: Option<Decimal>,
    pub manual_budget_amount: Option<Decimal>,
    pub use_take_profit: bool,
    pub take_profit_percent: Option<Decimal>,

    // Runtime
    pub enabled: bool,
    pub last_check_time: Option<DateTime<Utc>>,
    pub global_peak_value: Decimal,
    pub global_peak_value_in_eth: Decimal,
    pub total_commissions_paid: Decimal,
    pub account_id: String,
}

impl Bot {
    /// Position of `coin` within the bot's configured basket, used as the
    /// tie-break order when two candidates score equally.
    pub fn basket_position(&self, coin: &str) -> Option<usize> {
        self.coins.iter().position(|c| c == coin)
    }

    pub fn candidate_coins(&self) -> impl Iterator<Item = &String> {
        let current = self.current_coin.clone();
        self.coins.iter().filter(move |c| Some((*c).clone()) != current)
    }
}
