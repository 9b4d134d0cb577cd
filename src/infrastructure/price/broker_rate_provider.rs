//! Wraps the broker's own direct-rate endpoint as a `PriceProvider`, the
//! primary leg of the Price Oracle's two-provider fallback chain.

use crate::domain::ports::{ExchangeBroker, PriceProvider};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;

pub struct BrokerRateProvider {
    broker: Arc<dyn ExchangeBroker>,
}

impl BrokerRateProvider {
    pub fn new(broker: Arc<dyn ExchangeBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl PriceProvider for BrokerRateProvider {
    async fn get_price(&self, coin: &str, quote: &str) -> Result<Decimal> {
        let quote_result = self.broker.get_market_rate(coin, quote).await?;
        Ok(quote_result.price)
    }

    fn name(&self) -> &'static str {
        "broker_direct"
    }
}
