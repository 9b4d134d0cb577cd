//! In-memory stand-ins for the exchange broker, selected instead of the
//! real HTTP client when `RuntimeEnvConfig::use_mock_data` is set. Used
//! both for local development without real credentials and by
//! integration tests that need a deterministic broker.

use crate::domain::errors::RebalancerError;
use crate::domain::ports::{
    Account, AccountBalance, BrokerTradeResult, BrokerTradeStatus, CommissionRates,
    CommissionSource, ExchangeBroker, TradeHandle,
};
use crate::domain::types::{OrderPositionType, PriceQuote, PriceSource};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

fn pair_key(base: &str, quote: &str) -> String {
    format!("{base}_{quote}")
}

/// A deterministic, always-fills-immediately broker. Market rates are
/// whatever was seeded with `set_price`; anything else is reported as
/// unavailable rather than guessed.
pub struct MockExchangeBroker {
    prices: RwLock<HashMap<String, Decimal>>,
    trades: RwLock<HashMap<String, BrokerTradeResult>>,
}

impl MockExchangeBroker {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            trades: RwLock::new(HashMap::new()),
        }
    }

    pub async fn set_price(&self, base: &str, quote: &str, price: Decimal) {
        self.prices.write().await.insert(pair_key(base, quote), price);
    }
}

impl Default for MockExchangeBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeBroker for MockExchangeBroker {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        Ok(vec![Account {
            account_id: "mock-account".to_string(),
            name: "Mock Account".to_string(),
        }])
    }

    async fn get_account_balances(&self, _account_id: &str) -> Result<Vec<AccountBalance>> {
        // The mock broker is not the source of truth for holdings; callers
        // fall back to the locally-tracked Asset rows when this is empty.
        Ok(Vec::new())
    }

    async fn get_market_rate(&self, base: &str, quote: &str) -> Result<PriceQuote> {
        let price = self.prices.read().await.get(&pair_key(base, quote)).copied();
        match price {
            Some(price) => Ok(PriceQuote {
                price,
                source: PriceSource::BrokerDirect,
                was_fallback: false,
            }),
            None => Err(RebalancerError::PriceUnavailable {
                coin: base.to_string(),
                primary_reason: "mock broker has no seeded price for this pair".to_string(),
                fallback_reason: "mock mode has no secondary provider".to_string(),
            }
            .into()),
        }
    }

    async fn get_commission_rates(&self, _account_id: &str) -> Result<CommissionRates> {
        Ok(CommissionRates {
            maker: dec!(0.001),
            taker: dec!(0.002),
            source: CommissionSource::Default,
        })
    }

    async fn submit_market_trade(
        &self,
        _account_id: &str,
        pair: &str,
        position_type: OrderPositionType,
        amount: Decimal,
        _take_profit_percent: Option<Decimal>,
        _demo: bool,
    ) -> Result<TradeHandle> {
        let trade_id = format!("mock-{}", Uuid::new_v4());
        let (base, quote) = pair
            .split_once('_')
            .ok_or_else(|| RebalancerError::BrokerError {
                code: "invalid_pair".to_string(),
                message: format!("mock broker expects BASE_QUOTE, got {pair}"),
            })?;
        let price = self
            .prices
            .read()
            .await
            .get(&pair_key(base, quote))
            .copied()
            .unwrap_or(Decimal::ONE);

        let entered_total = match position_type {
            OrderPositionType::Sell => amount * price,
            OrderPositionType::Buy => amount,
        };

        let result = BrokerTradeResult {
            status: Some(BrokerTradeStatus::Completed),
            entered_total: Some(entered_total),
            raw: serde_json::json!({"mock": true, "pair": pair, "amount": amount.to_string()}),
            ..Default::default()
        };
        self.trades.write().await.insert(trade_id.clone(), result);
        Ok(TradeHandle { trade_id })
    }

    async fn get_trade(&self, handle: &TradeHandle) -> Result<BrokerTradeResult> {
        self.trades
            .read()
            .await
            .get(&handle.trade_id)
            .cloned()
            .ok_or_else(|| {
                RebalancerError::BrokerError {
                    code: "not_found".to_string(),
                    message: format!("mock broker has no trade {}", handle.trade_id),
                }
                .into()
            })
    }

    async fn await_trade_completion(
        &self,
        handle: &TradeHandle,
        _max_wait: Duration,
    ) -> Result<BrokerTradeResult> {
        // Every mock trade fills synchronously in `submit_market_trade`.
        self.get_trade(handle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn seeded_price_round_trips_through_get_market_rate() {
        let broker = MockExchangeBroker::new();
        broker.set_price("ETH", "USDT", dec!(2400)).await;
        let quote = broker.get_market_rate("ETH", "USDT").await.unwrap();
        assert_eq!(quote.price, dec!(2400));
    }

    #[tokio::test]
    async fn submit_and_fetch_trade_round_trips() {
        let broker = MockExchangeBroker::new();
        broker.set_price("ETH", "USDT", dec!(2400)).await;
        let handle = broker
            .submit_market_trade("acct", "ETH_USDT", OrderPositionType::Buy, dec!(1), None, true)
            .await
            .unwrap();
        let result = broker.get_trade(&handle).await.unwrap();
        assert_eq!(result.status, Some(BrokerTradeStatus::Completed));
    }

    #[tokio::test]
    async fn unseeded_pair_is_price_unavailable() {
        let broker = MockExchangeBroker::new();
        assert!(broker.get_market_rate("BTC", "USDT").await.is_err());
    }
}
