//! American-odds arithmetic shared by the scoring engines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Implied win probability of an American price, vig included.
///
/// A price of 0 is not a valid American quote and yields zero.
pub fn implied_probability(american: i64) -> Decimal {
    let a = Decimal::from(american);
    let hundred = Decimal::ONE_HUNDRED;
    if american < 0 {
        -a / (-a + hundred)
    } else if american > 0 {
        hundred / (a + hundred)
    } else {
        Decimal::ZERO
    }
}

/// Two-way no-vig probability for `price` given the opposite side's `opposite` price.
pub fn no_vig_probability(price: i64, opposite: i64) -> Option<Decimal> {
    let p = implied_probability(price);
    let q = implied_probability(opposite);
    let total = p + q;
    if total.is_zero() {
        return None;
    }
    Some(p / total)
}

/// Net decimal odds (profit per unit staked).
pub fn net_odds(american: i64) -> Decimal {
    let a = Decimal::from(american);
    if american < 0 {
        Decimal::ONE_HUNDRED / -a
    } else {
        a / Decimal::ONE_HUNDRED
    }
}

/// Position of a price on a continuous "cents" axis where higher means more expensive.
///
/// -110 → 10, -105 → 5, +100 → 0, +120 → -20.
pub fn price_cents(american: f64) -> f64 {
    if american < 0.0 {
        -american - 100.0
    } else {
        100.0 - american
    }
}

/// Signed price movement in cents; positive when the side got more expensive.
pub fn price_delta(opening: f64, current: f64) -> f64 {
    price_cents(current) - price_cents(opening)
}

/// How much commission is baked into a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JuiceTier {
    Heavy,
    Elevated,
    Standard,
    PlusMoney,
}

impl JuiceTier {
    /// Fixed product thresholds: -130 or worse is heavy juice.
    pub fn classify(american: i64) -> Self {
        if american <= -130 {
            Self::Heavy
        } else if american <= -116 {
            Self::Elevated
        } else if american <= 100 {
            Self::Standard
        } else {
            Self::PlusMoney
        }
    }
}

impl std::fmt::Display for JuiceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Heavy => "heavy",
            Self::Elevated => "elevated",
            Self::Standard => "standard",
            Self::PlusMoney => "plus_money",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_implied_probability() {
        assert_eq!(implied_probability(-100), dec!(0.5));
        assert_eq!(implied_probability(100), dec!(0.5));
        assert_eq!(implied_probability(-300), dec!(0.75));
        assert_eq!(implied_probability(300), dec!(0.25));
        assert_eq!(implied_probability(0), Decimal::ZERO);
    }

    #[test]
    fn test_no_vig_symmetric_market() {
        assert_eq!(no_vig_probability(-110, -110), Some(dec!(0.5)));
        assert_eq!(no_vig_probability(0, 0), None);
    }

    #[test]
    fn test_net_odds() {
        assert_eq!(net_odds(-200), dec!(0.5));
        assert_eq!(net_odds(150), dec!(1.5));
    }

    #[test]
    fn test_price_cents_axis() {
        assert_eq!(price_cents(-110.0), 10.0);
        assert_eq!(price_cents(100.0), 0.0);
        assert_eq!(price_cents(120.0), -20.0);
        assert_eq!(price_delta(-105.0, -110.0), 5.0);
        assert_eq!(price_delta(-110.0, 105.0), -15.0);
    }

    #[test]
    fn test_juice_tiers() {
        assert_eq!(JuiceTier::classify(-130), JuiceTier::Heavy);
        assert_eq!(JuiceTier::classify(-129), JuiceTier::Elevated);
        assert_eq!(JuiceTier::classify(-116), JuiceTier::Elevated);
        assert_eq!(JuiceTier::classify(-115), JuiceTier::Standard);
        assert_eq!(JuiceTier::classify(100), JuiceTier::Standard);
        assert_eq!(JuiceTier::classify(101), JuiceTier::PlusMoney);
    }
}
