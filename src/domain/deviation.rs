//! Three-way deviation calculator and swap-worthiness scoring.
//!
//! This module is pure: every function takes plain `Decimal` inputs and
//! returns plain data, with no I/O. The sign convention below is
//! deliberately preserved from the source system (see spec §4.4 / §9):
//! admission is keyed off `base_score <= -threshold_percent`, i.e. a
//! candidate must have *dropped* from its own baseline by at least the
//! threshold, not merely have outperformed the held coin.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An append-only log entry of one candidate evaluation (`CoinDeviation`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinDeviationRecord {
    pub bot_id: String,
    pub base: String,
    pub target: String,
    pub base_price: Decimal,
    pub target_price: Decimal,
    pub deviation_percent: Decimal,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The metrics tuple produced for one (held, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationMetrics {
    pub relative_deviation: Decimal,
    pub initial_deviation: Decimal,
    pub potential_units: Decimal,
    pub unit_gain_percent: Option<Decimal>,
}

/// Inputs needed to compute `DeviationMetrics` for one candidate.
pub struct DeviationInputs {
    pub held_price_now: Decimal,
    pub held_price_baseline: Decimal,
    pub candidate_price_now: Decimal,
    pub candidate_price_baseline: Decimal,
    pub held_amount: Decimal,
    /// `None` if the candidate coin was never held by this bot before.
    pub candidate_max_units_ever: Option<Decimal>,
}

pub fn compute_deviation(inputs: &DeviationInputs) -> DeviationMetrics {
    let ratio_held = inputs.held_price_now / inputs.held_price_baseline;
    let ratio_candidate = inputs.candidate_price_now / inputs.candidate_price_baseline;

    let relative_deviation = ratio_candidate / ratio_held - Decimal::ONE;
    let initial_deviation =
        inputs.candidate_price_now / inputs.candidate_price_baseline - Decimal::ONE;

    let potential_units =
        (inputs.held_amount * inputs.held_price_now) / inputs.candidate_price_now;

    let unit_gain_percent = inputs.candidate_max_units_ever.map(|max_units| {
        if max_units.is_zero() {
            Decimal::ZERO
        } else {
            (potential_units / max_units - Decimal::ONE) * Decimal::ONE_HUNDRED
        }
    });

    DeviationMetrics {
        relative_deviation,
        initial_deviation,
        potential_units,
        unit_gain_percent,
    }
}

/// Score and admission verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreDetails {
    pub base_score: Decimal,
    pub meets_threshold: bool,
    /// True when the re-entry veto fired and `base_score` was forced to -100.
    pub re_entry_vetoed: bool,
}

const PUMP_DETECTOR_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 2); // 0.05
const PUMP_PENALTY_CAP: Decimal = Decimal::from_parts(20, 0, 0, false, 0); // 20
const RE_ENTRY_VETO_SCORE: Decimal = Decimal::from_parts(100, 0, 0, true, 0); // -100

pub fn score_candidate(metrics: &DeviationMetrics, threshold_percent: Decimal) -> ScoreDetails {
    let mut base_score = metrics.initial_deviation * Decimal::ONE_HUNDRED;

    if metrics.initial_deviation > PUMP_DETECTOR_THRESHOLD {
        let penalty = (metrics.initial_deviation * Decimal::ONE_HUNDRED).min(PUMP_PENALTY_CAP);
        base_score -= penalty;
    }

    let re_entry_vetoed = matches!(metrics.unit_gain_percent, Some(gain) if gain < Decimal::ZERO);
    if re_entry_vetoed {
        base_score = RE_ENTRY_VETO_SCORE;
    }

    let meets_threshold = base_score <= -threshold_percent
        && metrics.unit_gain_percent.is_none_or(|gain| gain >= Decimal::ZERO);

    ScoreDetails {
        base_score,
        meets_threshold,
        re_entry_vetoed,
    }
}

/// One scored candidate, carrying enough context for tie-breaking and
/// MissedTrade recording.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub coin: String,
    pub basket_position: usize,
    pub metrics: DeviationMetrics,
    pub score: ScoreDetails,
}

/// Select the best admissible swap among scored candidates per spec §4.4's
/// tie-break rule: highest `base_score` (least negative) wins among those
/// meeting threshold; ties broken by earliest basket position.
pub fn select_best_candidate(candidates: &[ScoredCandidate]) -> Option<&ScoredCandidate> {
    candidates
        .iter()
        .filter(|c| c.score.meets_threshold)
        .max_by(|a, b| {
            a.score
                .base_score
                .cmp(&b.score.base_score)
                .then_with(|| b.basket_position.cmp(&a.basket_position))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candidate(
        coin: &str,
        basket_position: usize,
        held_now: Decimal,
        held_base: Decimal,
        cand_now: Decimal,
        cand_base: Decimal,
        held_amount: Decimal,
        max_units_ever: Option<Decimal>,
        threshold: Decimal,
    ) -> ScoredCandidate {
        let metrics = compute_deviation(&DeviationInputs {
            held_price_now: held_now,
            held_price_baseline: held_base,
            candidate_price_now: cand_now,
            candidate_price_baseline: cand_base,
            held_amount,
            candidate_max_units_ever: max_units_ever,
        });
        let score = score_candidate(&metrics, threshold);
        ScoredCandidate {
            coin: coin.to_string(),
            basket_position,
            metrics,
            score,
        }
    }

    /// S1 — below threshold, small moves, no candidate admitted.
    #[test]
    fn s1_below_threshold_no_swap() {
        let threshold = dec!(10);
        let eth = candidate(
            "ETH", 1, dec!(50000), dec!(50000), dec!(3060), dec!(3000), dec!(1), None, threshold,
        );
        let sol = candidate(
            "SOL", 2, dec!(50000), dec!(50000), dec!(153), dec!(150), dec!(1), None, threshold,
        );
        assert!(!eth.score.meets_threshold);
        assert!(!sol.score.meets_threshold);
        assert!(select_best_candidate(&[eth, sol]).is_none());
    }

    /// S2 — ETH drops 20%, SOL drops 10%; ETH should win (largest admissible drop).
    #[test]
    fn s2_admitted_swap_picks_largest_drop() {
        let threshold = dec!(10);
        let eth = candidate(
            "ETH", 1, dec!(50000), dec!(50000), dec!(2400), dec!(3000), dec!(1), None, threshold,
        );
        let sol = candidate(
            "SOL", 2, dec!(50000), dec!(50000), dec!(135), dec!(150), dec!(1), None, threshold,
        );
        assert!(eth.score.meets_threshold);
        assert!(sol.score.meets_threshold);

        let best = select_best_candidate(&[eth.clone(), sol.clone()]).unwrap();
        assert_eq!(best.coin, "ETH");

        let expected_units = (dec!(1) * dec!(50000)) / dec!(2400);
        assert_eq!(eth.metrics.potential_units, expected_units);
    }

    #[test]
    fn pump_penalty_reduces_score_above_five_percent_gain() {
        let threshold = dec!(10);
        // Candidate pumped 30% from its own baseline: base_score should be
        // penalized by min(30, 20) = 20, landing at 30 - 20 = 10 (positive,
        // so it never meets a negative-drop threshold anyway).
        let pumped = candidate(
            "ETH", 0, dec!(50000), dec!(50000), dec!(3900), dec!(3000), dec!(1), None, threshold,
        );
        assert_eq!(pumped.score.base_score, dec!(10.00));
        assert!(!pumped.score.meets_threshold);
    }

    #[test]
    fn re_entry_veto_forces_score_to_negative_100() {
        let threshold = dec!(10);
        // Candidate dropped 10% from its own baseline (meets raw threshold),
        // but potential_units (50000/2700 ~= 18.5) is far below the 100
        // units ever previously held, so re-entry must be vetoed.
        let vetoed = candidate(
            "ETH",
            0,
            dec!(50000),
            dec!(50000),
            dec!(2700),
            dec!(3000),
            dec!(1),
            Some(dec!(100)),
            threshold,
        );
        assert!(vetoed.score.re_entry_vetoed);
        assert_eq!(vetoed.score.base_score, dec!(-100));
        assert!(!vetoed.score.meets_threshold);
    }

    #[test]
    fn tie_break_prefers_earlier_basket_position() {
        let threshold = dec!(5);
        // Both candidates score identically at -10.
        let a = candidate(
            "A", 0, dec!(100), dec!(100), dec!(90), dec!(100), dec!(1), None, threshold,
        );
        let b = candidate(
            "B", 1, dec!(100), dec!(100), dec!(90), dec!(100), dec!(1), None, threshold,
        );
        assert_eq!(a.score.base_score, b.score.base_score);
        let best = select_best_candidate(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(best.coin, "A");
    }
}
