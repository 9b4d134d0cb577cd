//! Public price aggregator: an unauthenticated simple-price endpoint used
//! as the Price Oracle's fallback leg when the broker's own rate endpoint
//! is unavailable. Grounded on the teacher's unauthenticated public-API
//! client pattern (no signing, no API key, plain GET + JSON decode).

use crate::domain::ports::PriceProvider;
use crate::infrastructure::core::http_client_factory::HttpClientFactory;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Known symbol -> aggregator slug mappings. Anything not listed here is
/// passed through lowercased, since most aggregator slugs are just the
/// lowercase ticker.
fn symbol_to_slug(symbol: &str) -> String {
    let known: HashMap<&str, &str> = HashMap::from([
        ("BTC", "bitcoin"),
        ("ETH", "ethereum"),
        ("ADA", "cardano"),
        ("DOT", "polkadot"),
        ("SOL", "solana"),
        ("USDT", "tether"),
        ("USDC", "usd-coin"),
    ]);
    known
        .get(symbol.to_uppercase().as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| symbol.to_lowercase())
}

pub struct AggregatorPriceProvider {
    client: ClientWithMiddleware,
    base_url: String,
}

impl AggregatorPriceProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            base_url,
        }
    }
}

#[async_trait]
impl PriceProvider for AggregatorPriceProvider {
    async fn get_price(&self, coin: &str, quote: &str) -> Result<Decimal> {
        let slug = symbol_to_slug(coin);
        let quote_key = quote.to_lowercase();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies={}",
            self.base_url, slug, quote_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("aggregator request failed")?;

        if !response.status().is_success() {
            bail!("aggregator returned status {}", response.status());
        }

        let body: HashMap<String, HashMap<String, Decimal>> =
            response.json().await.context("aggregator returned invalid JSON")?;

        body.get(&slug)
            .and_then(|quotes| quotes.get(&quote_key))
            .copied()
            .ok_or_else(|| anyhow::anyhow!("aggregator had no {slug}/{quote_key} price"))
    }

    fn name(&self) -> &'static str {
        "aggregator"
    }
}
