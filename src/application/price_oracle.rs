//! Price Oracle: given (coin, quote, bot), returns (price, source).
//!
//! Pure with respect to external inputs beyond what the providers
//! themselves do — no hidden cross-tick caching here (mirrors the
//! `MarketDataService` trait boundary in the teacher's `domain/ports.rs`).

use crate::domain::errors::RebalancerError;
use crate::domain::ports::PriceProvider;
use crate::domain::types::{PriceQuote, PriceSource};
use std::sync::Arc;
use tracing::warn;

pub struct PriceOracle {
    primary: Arc<dyn PriceProvider>,
    fallback: Arc<dyn PriceProvider>,
}

impl PriceOracle {
    pub fn new(primary: Arc<dyn PriceProvider>, fallback: Arc<dyn PriceProvider>) -> Self {
        Self { primary, fallback }
    }

    /// Attempt the primary provider, then the fallback; surface
    /// `PriceUnavailable` carrying both underlying reasons if both fail.
    pub async fn get_price(&self, coin: &str, quote: &str) -> Result<PriceQuote, RebalancerError> {
        match self.primary.get_price(coin, quote).await {
            Ok(price) => Ok(PriceQuote {
                price,
                source: PriceSource::BrokerDirect,
                was_fallback: false,
            }),
            Err(primary_err) => {
                warn!(
                    coin,
                    quote,
                    provider = self.primary.name(),
                    error = %primary_err,
                    "primary price provider failed, attempting fallback"
                );
                match self.fallback.get_price(coin, quote).await {
                    Ok(price) => Ok(PriceQuote {
                        price,
                        source: PriceSource::Aggregator,
                        was_fallback: true,
                    }),
                    Err(fallback_err) => Err(RebalancerError::PriceUnavailable {
                        coin: coin.to_string(),
                        primary_reason: primary_err.to_string(),
                        fallback_reason: fallback_err.to_string(),
                    }),
                }
            }
        }
    }
}
