//! Reconciliation: compares bot-tracked Asset rows against broker-reported
//! balances. Advisory only — never writes back to the Asset table.

use crate::domain::ports::{AssetRepository, ExchangeBroker};
use crate::domain::types::{classify_discrepancy_severity, BalanceDiscrepancy};
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::warn;

pub struct Reconciler {
    assets: Arc<dyn AssetRepository>,
    broker: Arc<dyn ExchangeBroker>,
}

impl Reconciler {
    pub fn new(assets: Arc<dyn AssetRepository>, broker: Arc<dyn ExchangeBroker>) -> Self {
        Self { assets, broker }
    }

    /// Compares every tracked Asset for `bot_id` against the broker's
    /// live balances for `account_id`, returning one discrepancy per
    /// coin whose divergence is nonzero.
    pub async fn reconcile(&self, bot_id: &str, account_id: &str) -> Result<Vec<BalanceDiscrepancy>> {
        let tracked = self.assets.find_for_bot(bot_id).await?;
        let live = self.broker.get_account_balances(account_id).await?;

        let mut discrepancies = Vec::new();
        for asset in tracked {
            let broker_amount = live
                .iter()
                .find(|b| b.coin == asset.coin)
                .map(|b| b.amount)
                .unwrap_or(Decimal::ZERO);

            if broker_amount == asset.amount {
                continue;
            }

            let percent_divergence = if asset.amount.is_zero() {
                Decimal::ZERO
            } else {
                (broker_amount - asset.amount) / asset.amount * Decimal::ONE_HUNDRED
            };
            let severity = classify_discrepancy_severity(percent_divergence);

            if severity != crate::domain::types::DiscrepancySeverity::Low {
                warn!(
                    bot_id,
                    coin = %asset.coin,
                    tracked = %asset.amount,
                    broker = %broker_amount,
                    ?severity,
                    "balance discrepancy observed"
                );
            }

            discrepancies.push(BalanceDiscrepancy {
                bot_id: bot_id.to_string(),
                coin: asset.coin,
                tracked_amount: asset.amount,
                broker_amount,
                percent_divergence,
                severity,
                observed_at: Utc::now(),
            });
        }

        Ok(discrepancies)
    }
}
