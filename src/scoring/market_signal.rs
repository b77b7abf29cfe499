//! Market signal engine.
//!
//! Compares the best available price on one outcome against the consensus
//! no-vig probability across books.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::scoring::kelly::{kelly_stake, KellyWeights};
use crate::scoring::odds::{implied_probability, no_vig_probability, JuiceTier};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalWeights {
    pub value_edge: Decimal,
    pub overpriced_edge: Decimal,
    pub kelly: KellyWeights,
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            value_edge: dec!(0.02),
            overpriced_edge: dec!(-0.02),
            kelly: KellyWeights::default(),
        }
    }
}

/// One book's quote for the outcome, optionally with the other side of a two-way market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPrice {
    pub book: String,
    pub price: i64,
    #[serde(default, alias = "opposite_price")]
    pub opposite_price: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Value,
    Fair,
    Overpriced,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value => write!(f, "value"),
            Self::Fair => write!(f, "fair"),
            Self::Overpriced => write!(f, "overpriced"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSignal {
    pub best_book: String,
    pub best_price: i64,
    pub implied_probability: Decimal,
    pub fair_probability: Decimal,
    /// True when the fair probability had the vig removed.
    pub vig_free: bool,
    pub edge: Decimal,
    pub juice_tier: JuiceTier,
    pub stake_pct: Decimal,
    pub signal: Signal,
    pub books: usize,
}

/// Evaluate an outcome's prices. Returns `None` when no usable price was given.
///
/// The fair probability is the mean no-vig probability over books quoting both
/// sides; when no book quotes the opposite side it falls back to the mean raw
/// implied probability, which still carries the vig.
pub fn evaluate(prices: &[BookPrice], w: &SignalWeights) -> Option<MarketSignal> {
    let quotes: Vec<&BookPrice> = prices.iter().filter(|p| p.price != 0).collect();
    // Highest American price pays the most.
    let best = quotes.iter().max_by_key(|p| p.price)?;

    let no_vig: Vec<Decimal> = quotes
        .iter()
        .filter_map(|p| no_vig_probability(p.price, p.opposite_price?))
        .collect();

    let (fair, vig_free) = if no_vig.is_empty() {
        let raw: Decimal = quotes.iter().map(|p| implied_probability(p.price)).sum();
        (raw / Decimal::from(quotes.len() as u64), false)
    } else {
        let sum: Decimal = no_vig.iter().sum();
        (sum / Decimal::from(no_vig.len() as u64), true)
    };

    let implied = implied_probability(best.price);
    let edge = (fair - implied).round_dp(6);

    let signal = if edge >= w.value_edge {
        Signal::Value
    } else if edge <= w.overpriced_edge {
        Signal::Overpriced
    } else {
        Signal::Fair
    };

    let stake_pct = if signal == Signal::Value {
        kelly_stake(fair, best.price, &w.kelly).stake_pct
    } else {
        Decimal::ZERO
    };

    Some(MarketSignal {
        best_book: best.book.clone(),
        best_price: best.price,
        implied_probability: implied.round_dp(6),
        fair_probability: fair.round_dp(6),
        vig_free,
        edge,
        juice_tier: JuiceTier::classify(best.price),
        stake_pct,
        signal,
        books: quotes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(book: &str, price: i64, opposite: Option<i64>) -> BookPrice {
        BookPrice {
            book: book.to_string(),
            price,
            opposite_price: opposite,
        }
    }

    #[test]
    fn test_empty_prices() {
        assert!(evaluate(&[], &SignalWeights::default()).is_none());
        assert!(evaluate(&[quote("dk", 0, None)], &SignalWeights::default()).is_none());
    }

    #[test]
    fn test_outlier_plus_price_is_value() {
        let prices = vec![
            quote("dk", -110, Some(-110)),
            quote("fd", -110, Some(-110)),
            quote("mgm", 125, Some(-150)),
        ];
        let s = evaluate(&prices, &SignalWeights::default()).unwrap();
        assert_eq!(s.best_book, "mgm");
        assert_eq!(s.best_price, 125);
        assert!(s.vig_free);
        assert_eq!(s.signal, Signal::Value);
        assert_eq!(s.juice_tier, JuiceTier::PlusMoney);
        assert!(s.stake_pct > Decimal::ZERO);
    }

    #[test]
    fn test_standard_market_is_fair_or_worse() {
        let prices = vec![quote("dk", -110, Some(-110)), quote("fd", -110, Some(-110))];
        let s = evaluate(&prices, &SignalWeights::default()).unwrap();
        // 0.5 fair vs 0.5238 implied
        assert_eq!(s.signal, Signal::Overpriced);
        assert_eq!(s.stake_pct, Decimal::ZERO);
    }

    #[test]
    fn test_without_opposite_falls_back_to_raw_implied() {
        let prices = vec![quote("dk", -170, None), quote("fd", -130, None)];
        let s = evaluate(&prices, &SignalWeights::default()).unwrap();
        assert!(!s.vig_free);
        assert_eq!(s.best_price, -130);
        assert_eq!(s.juice_tier, JuiceTier::Heavy);
        assert_eq!(s.signal, Signal::Value);
    }
}
