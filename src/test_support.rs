//! Shared fixtures for unit/integration tests.

use crate::domain::bot::Bot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn sample_bot() -> Bot {
    Bot {
        bot_id: "bot1".into(),
        user_id: "user1".into(),
        name: "rebalancer-test".into(),
        coins: vec!["BTC".into(), "ETH".into(), "SOL".into()],
        initial_coin: "BTC".into(),
        current_coin: Some("BTC".into()),
        threshold_percent: dec!(10),
        global_threshold_percent: dec!(10),
        check_interval_minutes: 15,
        commission_rate: dec!(0.002),
        preferred_stablecoin: "USDT".into(),
        reference_coin: "ETH".into(),
        allocation_percent: None,
        manual_budget_amount: None,
        use_take_profit: false,
        take_profit_percent: None,
        enabled: true,
        last_check_time: None,
        global_peak_value: Decimal::ZERO,
        global_peak_value_in_eth: Decimal::ZERO,
        total_commissions_paid: Decimal::ZERO,
        account_id: "acct1".into(),
    }
}
