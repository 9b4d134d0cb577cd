//! Exchange Broker Client: authenticated HTTPS RPC to a single external
//! trading service. Requests are signed HMAC-SHA256 over `path || body`
//! (`body` empty for GETs), mirroring `BinanceExecutionService::sign_request`
//! but generalized to the broker's own v1/v2 path scheme.

use crate::domain::errors::RebalancerError;
use crate::domain::ports::{
    Account, AccountBalance, BrokerTradeResult, BrokerTradeStatus, CommissionRates,
    CommissionSource, ExchangeBroker, TradeHandle,
};
use crate::domain::types::{OrderPositionType, PriceQuote, PriceSource};
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::infrastructure::core::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::Rng;
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Smart-trades (v2) and anything not explicitly listed as v1 route through
/// the v2 path family per spec.md §6.
const SMART_TRADE_PATH: &str = "/v2/smart-trades";

pub struct ExchangeBrokerClient {
    client: ClientWithMiddleware,
    api_key: String,
    api_secret: String,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    poll_interval: Duration,
}

impl ExchangeBrokerClient {
    pub fn new(api_key: String, api_secret: String, base_url: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            api_key,
            api_secret,
            base_url,
            circuit_breaker: Arc::new(CircuitBreaker::new(
                "ExchangeBroker",
                5,
                3,
                Duration::from_secs(60),
            )),
            poll_interval: Duration::from_secs(3),
        }
    }

    fn sign(&self, path: &str, body: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts a key of any size");
        mac.update(path.as_bytes());
        mac.update(body.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value> {
        let signature = self.sign(path, "");
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("APIKEY", &self.api_key)
            .header("Signature", signature)
            .send()
            .await
            .context("broker GET request failed")?;
        Self::parse_response(response).await
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<serde_json::Value> {
        let body_str = body.to_string();
        let signature = self.sign(path, &body_str);
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .header("APIKEY", &self.api_key)
            .header("Signature", signature)
            .header("Content-Type", "application/json")
            .body(body_str)
            .send()
            .await
            .context("broker POST request failed")?;
        Self::parse_response(response).await
    }

    async fn parse_response(response: reqwest::Response) -> Result<serde_json::Value> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RebalancerError::BrokerError {
                code: status.as_u16(),
                message,
            }
            .into());
        }
        response.json().await.context("broker returned invalid JSON")
    }

    async fn guarded<T>(&self, fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        self.circuit_breaker.call(fut).await.map_err(|e| match e {
            CircuitBreakerError::Open(msg) => anyhow::anyhow!("broker circuit breaker open: {msg}"),
            CircuitBreakerError::Inner(inner) => inner,
        })
    }
}

fn decimal_field(value: &serde_json::Value, field: &str) -> Option<Decimal> {
    value.get(field).and_then(|v| {
        v.as_str()
            .and_then(|s| Decimal::from_str(s).ok())
            .or_else(|| v.as_f64().and_then(Decimal::from_f64_retain))
    })
}

fn parse_broker_status(raw: &str) -> Option<BrokerTradeStatus> {
    match raw.to_lowercase().as_str() {
        "in_progress" | "active" | "pending" => Some(BrokerTradeStatus::InProgress),
        "completed" => Some(BrokerTradeStatus::Completed),
        "closed" => Some(BrokerTradeStatus::Closed),
        "done" => Some(BrokerTradeStatus::Done),
        "finished" => Some(BrokerTradeStatus::Finished),
        "cancelled" | "canceled" => Some(BrokerTradeStatus::Cancelled),
        "failed" | "error" => Some(BrokerTradeStatus::Failed),
        _ => None,
    }
}

#[async_trait]
impl ExchangeBroker for ExchangeBrokerClient {
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        self.guarded(async {
            #[derive(Deserialize)]
            struct Row {
                account_id: String,
                #[serde(default)]
                name: String,
            }
            let raw = self.get("/v1/accounts").await?;
            let rows: Vec<Row> = serde_json::from_value(raw)?;
            Ok(rows
                .into_iter()
                .map(|r| Account {
                    account_id: r.account_id,
                    name: r.name,
                })
                .collect())
        })
        .await
    }

    async fn get_account_balances(&self, account_id: &str) -> Result<Vec<AccountBalance>> {
        self.guarded(async {
            let path = format!("/v1/accounts/{account_id}/balances");
            let raw = self.get(&path).await?;
            let entries = raw.as_array().cloned().unwrap_or_default();
            Ok(entries
                .iter()
                .filter_map(|e| {
                    let coin = e.get("coin")?.as_str()?.to_string();
                    let amount = decimal_field(e, "amount")?;
                    let amount_in_usd = decimal_field(e, "amount_in_usd").unwrap_or(Decimal::ZERO);
                    Some(AccountBalance {
                        coin,
                        amount,
                        amount_in_usd,
                    })
                })
                .collect())
        })
        .await
    }

    async fn get_market_rate(&self, base: &str, quote: &str) -> Result<PriceQuote> {
        self.guarded(async {
            // Best-effort across the three shapes the broker has been seen
            // to return: a dedicated rate endpoint, a ticker endpoint, and
            // (rarely) a pair-embedded orderbook summary.
            let candidates = [
                format!("/v2/market/rate?base={base}&quote={quote}"),
                format!("/v1/ticker?symbol={base}{quote}"),
                format!("/v1/orderbook/{base}_{quote}/summary"),
            ];

            for path in candidates {
                if let Ok(raw) = self.get(&path).await {
                    if let Some(price) = decimal_field(&raw, "price").or_else(|| decimal_field(&raw, "rate")) {
                        return Ok(PriceQuote {
                            price,
                            source: PriceSource::BrokerDirect,
                            was_fallback: false,
                        });
                    }
                }
            }
            Err(RebalancerError::PriceUnavailable {
                coin: base.to_string(),
                primary_reason: "no broker endpoint shape resolved a rate".to_string(),
                fallback_reason: "not attempted".to_string(),
            }
            .into())
        })
        .await
    }

    async fn get_commission_rates(&self, account_id: &str) -> Result<CommissionRates> {
        self.guarded(async {
            let path = format!("/v1/accounts/{account_id}/commission");
            let raw = self.get(&path).await?;
            match (decimal_field(&raw, "maker"), decimal_field(&raw, "taker")) {
                (Some(maker), Some(taker)) => Ok(CommissionRates {
                    maker,
                    taker,
                    source: CommissionSource::Api,
                }),
                _ => Ok(CommissionRates {
                    maker: dec!(0.001),
                    taker: dec!(0.002),
                    source: CommissionSource::Default,
                }),
            }
        })
        .await
    }

    async fn submit_market_trade(
        &self,
        account_id: &str,
        pair: &str,
        position_type: OrderPositionType,
        amount: Decimal,
        take_profit_percent: Option<Decimal>,
        demo: bool,
    ) -> Result<TradeHandle> {
        self.guarded(async {
            let mut position = json!({
                "type": position_type.to_string(),
                "units": { "value": amount.to_string() },
                "total": amount.to_string(),
                "order_type": "market",
            });

            if let Some(tp) = take_profit_percent {
                position["take_profit"] = json!({
                    "enabled": true,
                    "steps": [{
                        "order_type": "market",
                        "price": { "type": "percent", "value": tp.to_string() },
                        "volume": 100,
                    }],
                });
            }

            let body = json!({
                "account_id": account_id,
                "pair": pair,
                "position": position,
                "stop_loss": { "enabled": false },
                "instant": true,
                "demo": demo,
            });

            let raw = self.post(SMART_TRADE_PATH, &body).await?;
            let trade_id = raw
                .get("trade_id")
                .and_then(|v| v.as_str())
                .ok_or_else(|| RebalancerError::BrokerError {
                    code: 0,
                    message: "smart-trade response missing trade_id".to_string(),
                })?
                .to_string();
            info!(account_id, pair, trade_id, "submitted smart-trade");
            Ok(TradeHandle { trade_id })
        })
        .await
    }

    async fn get_trade(&self, handle: &TradeHandle) -> Result<BrokerTradeResult> {
        self.guarded(async {
            let path = format!("{}/{}", SMART_TRADE_PATH, handle.trade_id);
            let raw = self.get(&path).await?;
            let status = raw
                .get("status")
                .and_then(|v| v.as_str())
                .and_then(parse_broker_status);

            Ok(BrokerTradeResult {
                status,
                entered_total: decimal_field(&raw, "entered_total"),
                entered_amount: decimal_field(&raw, "entered_amount"),
                position_total_value: raw
                    .get("position")
                    .and_then(|p| decimal_field(p, "total_value")),
                position_done_quantity: raw
                    .get("position")
                    .and_then(|p| decimal_field(p, "done_quantity")),
                position_done_average_price: raw
                    .get("position")
                    .and_then(|p| decimal_field(p, "done_average_price")),
                position_quantity: raw.get("position").and_then(|p| decimal_field(p, "quantity")),
                position_units: raw
                    .get("position")
                    .and_then(|p| p.get("units"))
                    .and_then(|u| decimal_field(u, "value")),
                raw,
            })
        })
        .await
    }

    async fn await_trade_completion(
        &self,
        handle: &TradeHandle,
        max_wait: Duration,
    ) -> Result<BrokerTradeResult> {
        let deadline = tokio::time::Instant::now() + max_wait;
        let mut last = self.get_trade(handle).await?;

        while !last.status.as_ref().is_some_and(|s| s.is_terminal()) {
            if tokio::time::Instant::now() >= deadline {
                warn!(trade_id = %handle.trade_id, "trade did not reach a terminal status within budget");
                return Ok(last);
            }
            tokio::time::sleep(self.jittered_poll_interval()).await;
            last = self.get_trade(handle).await?;
        }
        Ok(last)
    }

    /// `poll_interval` plus up to 20% jitter, so a fleet of bots polling
    /// the same trade doesn't all hit the broker in lockstep.
    fn jittered_poll_interval(&self) -> Duration {
        let jitter_ms = self.poll_interval.as_millis() as i64 / 5;
        let jitter = rand::rng().random_range(-jitter_ms..=jitter_ms);
        let ms = (self.poll_interval.as_millis() as i64 + jitter).max(0) as u64;
        Duration::from_millis(ms)
    }
}
