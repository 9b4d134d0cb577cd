//! Exchange broker and price aggregator credentials/endpoints, loaded
//! from environment variables.

use std::env;

#[derive(Debug, Clone)]
pub struct ExchangeEnvConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub aggregator_base_url: String,
}

impl ExchangeEnvConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("EXCHANGE_API_KEY").unwrap_or_default(),
            api_secret: env::var("EXCHANGE_API_SECRET").unwrap_or_default(),
            base_url: env::var("EXCHANGE_BASE_URL")
                .unwrap_or_else(|_| "https://api.exchange.example".to_string()),
            aggregator_base_url: env::var("PRICE_AGGREGATOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string()),
        }
    }
}
