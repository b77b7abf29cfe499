//! Kelly Criterion stake sizing for American-odds bets.
//!
//! Computes the bankroll fraction to stake using fractional Kelly with a
//! hard cap.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::scoring::odds::net_odds;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyWeights {
    pub kelly_fraction: Decimal,
    pub max_stake_pct: Decimal,
}

impl Default for KellyWeights {
    fn default() -> Self {
        Self {
            kelly_fraction: dec!(0.25),
            max_stake_pct: dec!(0.05),
        }
    }
}

/// Bankroll fraction to stake on a bet at `american` odds when the true win
/// probability is `fair_prob`.
///
/// # Formula
/// ```text
/// f = (p * b - q) / b
/// where p = fair_prob, q = 1-p, b = net decimal odds
/// stake = min(f * kelly_fraction, max_stake_pct)
/// ```
pub fn kelly_stake(fair_prob: Decimal, american: i64, w: &KellyWeights) -> KellyResult {
    if fair_prob <= Decimal::ZERO || fair_prob >= Decimal::ONE || american == 0 {
        return KellyResult::zero();
    }

    let b = net_odds(american);
    if b <= Decimal::ZERO {
        return KellyResult::zero();
    }

    let p = fair_prob;
    let q = Decimal::ONE - p;
    let kelly_raw = (p * b - q) / b;

    if kelly_raw <= Decimal::ZERO {
        return KellyResult {
            kelly_raw,
            stake_pct: Decimal::ZERO,
            capped: false,
        };
    }

    let adjusted = kelly_raw * w.kelly_fraction;
    let capped = adjusted > w.max_stake_pct;
    let stake_pct = if capped { w.max_stake_pct } else { adjusted };

    KellyResult {
        kelly_raw,
        stake_pct: stake_pct.round_dp(4),
        capped,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KellyResult {
    pub kelly_raw: Decimal,
    pub stake_pct: Decimal,
    pub capped: bool,
}

impl KellyResult {
    fn zero() -> Self {
        Self {
            kelly_raw: Decimal::ZERO,
            stake_pct: Decimal::ZERO,
            capped: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_money_edge() {
        // p = 0.55 at +100: f = (0.55 - 0.45) / 1 = 0.10 → quarter Kelly 0.025
        let r = kelly_stake(dec!(0.55), 100, &KellyWeights::default());
        assert_eq!(r.kelly_raw, dec!(0.10));
        assert_eq!(r.stake_pct, dec!(0.025));
        assert!(!r.capped);
    }

    #[test]
    fn test_no_edge_is_zero() {
        let r = kelly_stake(dec!(0.50), -110, &KellyWeights::default());
        assert!(r.kelly_raw < Decimal::ZERO);
        assert_eq!(r.stake_pct, Decimal::ZERO);
    }

    #[test]
    fn test_large_edge_caps() {
        let r = kelly_stake(dec!(0.80), 150, &KellyWeights::default());
        assert!(r.capped);
        assert_eq!(r.stake_pct, dec!(0.05));
    }

    #[test]
    fn test_degenerate_inputs() {
        let w = KellyWeights::default();
        assert_eq!(kelly_stake(Decimal::ZERO, 100, &w), KellyResult::zero());
        assert_eq!(kelly_stake(Decimal::ONE, 100, &w), KellyResult::zero());
        assert_eq!(kelly_stake(dec!(0.6), 0, &w), KellyResult::zero());
    }
}
