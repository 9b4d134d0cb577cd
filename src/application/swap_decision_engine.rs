//! Swap Decision Engine: scores candidates, applies threshold and global
//! value protection, selects the best admissible swap.

use crate::application::snapshot_manager::SnapshotManager;
use crate::domain::bot::Bot;
use crate::domain::decision::{Decision, NoOpReason};
use crate::domain::deviation::{compute_deviation, score_candidate, select_best_candidate, DeviationInputs, ScoredCandidate};
use crate::domain::ports::MissedTradeRepository;
use crate::domain::trade::MissedTrade;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct SwapDecisionEngine {
    snapshots: Arc<SnapshotManager>,
    missed_trades: Arc<dyn MissedTradeRepository>,
}

impl SwapDecisionEngine {
    pub fn new(snapshots: Arc<SnapshotManager>, missed_trades: Arc<dyn MissedTradeRepository>) -> Self {
        Self {
            snapshots,
            missed_trades,
        }
    }

    /// `commission_rate` should already reflect the resolution order from
    /// spec §4.6 step 2: cached broker-reported taker rate, else
    /// `bot.commission_rate`. `held_amount` is the current Asset's amount
    /// for `bot.current_coin`, read by the caller from the Asset
    /// repository before this call.
    pub async fn evaluate(
        &self,
        bot: &Bot,
        held_amount: Decimal,
        prices: &HashMap<String, Decimal>,
        commission_rate: Decimal,
    ) -> Result<Decision> {
        let Some(current_coin) = bot.current_coin.clone() else {
            return Ok(Decision::NoOp {
                reason: NoOpReason::NoCurrentCoin,
            });
        };
        let Some(&current_price) = prices.get(&current_coin) else {
            return Ok(Decision::NoOp {
                reason: NoOpReason::MissingPriceData,
            });
        };

        let baselines = self.snapshots.initial_prices(&bot.bot_id).await?;
        let Some(&held_baseline) = baselines.get(&current_coin) else {
            return Ok(Decision::NoOp {
                reason: NoOpReason::MissingPriceData,
            });
        };

        let asset_amount = held_amount;

        let mut candidates = Vec::new();
        for coin in bot.candidate_coins() {
            let Some(&candidate_price) = prices.get(coin) else {
                warn!(bot_id = %bot.bot_id, coin, "skipping candidate with missing price");
                continue;
            };
            let Some(&candidate_baseline) = baselines.get(coin) else {
                warn!(bot_id = %bot.bot_id, coin, "skipping candidate with no baseline yet");
                continue;
            };

            let max_units_ever = self.snapshots.max_units_ever(&bot.bot_id, coin).await?;

            let metrics = compute_deviation(&DeviationInputs {
                held_price_now: current_price,
                held_price_baseline: held_baseline,
                candidate_price_now: candidate_price,
                candidate_price_baseline: candidate_baseline,
                held_amount: asset_amount,
                candidate_max_units_ever: max_units_ever,
            });
            let score = score_candidate(&metrics, bot.threshold_percent);

            candidates.push(ScoredCandidate {
                coin: coin.clone(),
                basket_position: bot.basket_position(coin).unwrap_or(usize::MAX),
                metrics,
                score,
            });
        }

        // A candidate that dropped relative to the held coin but not far
        // enough to cross the threshold still counts as "positively
        // scored" for missed-trade bookkeeping, distinct from the
        // stricter `meets_threshold` gate used for admission.
        let any_positively_scored = candidates.iter().any(|c| c.score.base_score < Decimal::ZERO);
        let best = select_best_candidate(&candidates).cloned();

        let Some(best) = best else {
            if any_positively_scored {
                self.record_missed(bot, &current_coin, None, NoOpReason::BelowThreshold)
                    .await?;
            }
            return Ok(Decision::NoOp {
                reason: NoOpReason::BelowThreshold,
            });
        };

        // Global Progress Protection.
        let net_value = asset_amount * current_price * (Decimal::ONE - commission_rate);
        let min_acceptable =
            bot.global_peak_value * (Decimal::ONE - bot.global_threshold_percent / Decimal::ONE_HUNDRED);

        if bot.global_peak_value > Decimal::ZERO && net_value < min_acceptable {
            self.record_missed(
                bot,
                &current_coin,
                Some(&best.coin),
                NoOpReason::ProgressProtection,
            )
            .await?;
            return Ok(Decision::NoOp {
                reason: NoOpReason::ProgressProtection,
            });
        }

        info!(
            bot_id = %bot.bot_id,
            from = %current_coin,
            to = %best.coin,
            score = %best.score.base_score,
            target: "trade",
            "swap decision selected"
        );

        Ok(Decision::Swap {
            from: current_coin,
            to: best.coin.clone(),
            score: best.score.base_score,
            metrics: best.metrics,
        })
    }

    async fn record_missed(
        &self,
        bot: &Bot,
        from: &str,
        to: Option<&str>,
        reason: NoOpReason,
    ) -> Result<()> {
        self.missed_trades
            .record(&MissedTrade {
                bot_id: bot.bot_id.clone(),
                from_coin: from.to_string(),
                to_coin: to.unwrap_or("").to_string(),
                reason_code: reason.as_missed_trade_code().to_string(),
                context: String::new(),
                recorded_at: Utc::now(),
            })
            .await
    }
}
