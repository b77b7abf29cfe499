//! Sharp pressure engine.
//!
//! Scores a single line-movement observation: how much of the move looks
//! like informed money (sharp pressure) versus public noise or a bait line
//! (trap pressure). The difference is squashed through a logistic curve into
//! a 0-100 confidence and labelled FOLLOW / FADE / PASS.

use serde::{Deserialize, Serialize};

use crate::scoring::odds::price_delta;

/// Tunable constants for the sharp engine. Every field can be overridden from
/// `[scoring.sharp]` in the config file or a `sharp.<field>` weights row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpWeights {
    pub price_bucket_edges: [f64; 4],
    pub price_bucket_points: [f64; 5],
    pub line_bucket_edges: [f64; 4],
    pub line_bucket_points: [f64; 5],
    pub decay_window_hours: f64,
    pub late_boost: f64,
    pub steam_bonus: f64,
    pub consensus_weight: f64,
    pub neutral_consensus: f64,
    pub confirm_books_min: f64,
    pub confirm_bonus: f64,
    pub late_move_hours: f64,
    pub late_move_bonus: f64,
    pub rlm_public_max: f64,
    pub rlm_bonus: f64,
    pub heavy_juice_price: f64,
    pub heavy_juice_penalty: f64,
    pub public_heavy_min: f64,
    pub public_heavy_penalty: f64,
    pub juice_only_min_cents: f64,
    pub juice_only_penalty: f64,
    pub thin_consensus_max: f64,
    pub thin_consensus_penalty: f64,
    pub stale_hours: f64,
    pub stale_penalty: f64,
    pub logistic_scale: f64,
    pub sharp_cutoff: f64,
    pub sharp_pct_min: f64,
    pub trap_cutoff: f64,
    pub trap_pct_max: f64,
}

impl Default for SharpWeights {
    fn default() -> Self {
        Self {
            price_bucket_edges: [5.0, 10.0, 15.0, 25.0],
            price_bucket_points: [0.0, 6.0, 12.0, 18.0, 24.0],
            line_bucket_edges: [0.5, 1.0, 1.5, 2.5],
            line_bucket_points: [0.0, 5.0, 10.0, 15.0, 20.0],
            decay_window_hours: 24.0,
            late_boost: 0.5,
            steam_bonus: 8.0,
            consensus_weight: 15.0,
            neutral_consensus: 0.5,
            confirm_books_min: 3.0,
            confirm_bonus: 5.0,
            late_move_hours: 3.0,
            late_move_bonus: 5.0,
            rlm_public_max: 40.0,
            rlm_bonus: 10.0,
            heavy_juice_price: -130.0,
            heavy_juice_penalty: 10.0,
            public_heavy_min: 65.0,
            public_heavy_penalty: 10.0,
            juice_only_min_cents: 10.0,
            juice_only_penalty: 6.0,
            thin_consensus_max: 0.4,
            thin_consensus_penalty: 8.0,
            stale_hours: 48.0,
            stale_penalty: 4.0,
            logistic_scale: 15.0,
            sharp_cutoff: 20.0,
            sharp_pct_min: 65.0,
            trap_cutoff: -20.0,
            trap_pct_max: 35.0,
        }
    }
}

/// One observed movement. Every field is optional; see [`score_movement`]
/// for the neutral value used when a field is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementInput {
    #[serde(default, alias = "price_change")]
    pub price_change: Option<f64>,
    #[serde(default, alias = "line_change")]
    pub line_change: Option<f64>,
    #[serde(default, alias = "hours_to_game")]
    pub hours_to_game: Option<f64>,
    #[serde(default, alias = "confirming_books")]
    pub books_count: Option<f64>,
    #[serde(default, alias = "total_books")]
    pub total_books: Option<f64>,
    #[serde(default, alias = "current_price")]
    pub current_price: Option<f64>,
    #[serde(default, alias = "opening_price")]
    pub opening_price: Option<f64>,
    /// Share of tickets on this side, 0-100.
    #[serde(default, alias = "public_pct")]
    pub public_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharpLabel {
    Sharp,
    Trap,
    Neutral,
}

impl SharpLabel {
    pub fn recommendation(self) -> &'static str {
        match self {
            Self::Sharp => "FOLLOW",
            Self::Trap => "FADE",
            Self::Neutral => "PASS",
        }
    }
}

impl std::fmt::Display for SharpLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sharp => write!(f, "sharp"),
            Self::Trap => write!(f, "trap"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharpResult {
    /// Sharp edge score: sharp pressure minus trap pressure, clamped to [-100, 100].
    #[serde(rename = "SES")]
    pub ses: f64,
    #[serde(rename = "sharpPct")]
    pub sharp_pct: f64,
    pub label: SharpLabel,
    pub recommendation: &'static str,
    #[serde(rename = "sharpPressure")]
    pub sharp_pressure: f64,
    #[serde(rename = "trapPressure")]
    pub trap_pressure: f64,
    #[serde(rename = "timeDecay")]
    pub time_decay: f64,
    #[serde(rename = "consensusRatio")]
    pub consensus_ratio: f64,
    pub signals: Vec<&'static str>,
}

/// Score one movement.
///
/// Neutral defaults: price change is derived from opening/current price when
/// absent (else 0), line change 0, time decay 1.0 when hours are unknown,
/// consensus ratio `neutral_consensus` when either book count is unknown.
pub fn score_movement(input: &MovementInput, w: &SharpWeights) -> SharpResult {
    let price = finite(input.price_change)
        .or_else(|| match (finite(input.opening_price), finite(input.current_price)) {
            (Some(open), Some(cur)) => Some(price_delta(open, cur)),
            _ => None,
        })
        .unwrap_or(0.0);
    let line = finite(input.line_change).unwrap_or(0.0);
    let hours = finite(input.hours_to_game).map(|h| h.max(0.0));
    let public = finite(input.public_pct);

    let decay = time_decay(hours, w);
    let (ratio, ratio_known) = consensus_ratio(input, w);
    let mut signals = Vec::new();

    // --- Sharp side ---
    let price_points = bucket_points(price.abs(), &w.price_bucket_edges, &w.price_bucket_points);
    let line_points = bucket_points(line.abs(), &w.line_bucket_edges, &w.line_bucket_points);

    let mut favorable = 0.0;
    let mut adverse = 0.0;
    if price > 0.0 {
        favorable += price_points;
    } else if price < 0.0 {
        adverse += price_points;
    }
    if line > 0.0 {
        favorable += line_points;
    } else if line < 0.0 {
        adverse += line_points;
    }

    let mut sharp = favorable * decay;
    if price > 0.0 && line > 0.0 {
        sharp += w.steam_bonus;
        signals.push("steam");
    }
    sharp += w.consensus_weight * ratio;
    if finite(input.books_count).is_some_and(|b| b >= w.confirm_books_min) {
        sharp += w.confirm_bonus;
        signals.push("multi_book_confirm");
    }
    if price > 0.0 && hours.is_some_and(|h| h <= w.late_move_hours) {
        sharp += w.late_move_bonus;
        signals.push("late_move");
    }
    if price > 0.0 && public.is_some_and(|p| p <= w.rlm_public_max) {
        sharp += w.rlm_bonus;
        signals.push("reverse_line_movement");
    }

    // --- Trap side ---
    let mut trap = adverse * decay;
    if finite(input.current_price).is_some_and(|p| p <= w.heavy_juice_price) {
        trap += w.heavy_juice_penalty;
        signals.push("heavy_juice");
    }
    if public.is_some_and(|p| p >= w.public_heavy_min) {
        trap += w.public_heavy_penalty;
        signals.push("public_heavy");
    }
    if price.abs() >= w.juice_only_min_cents && line.abs() < w.line_bucket_edges[0] {
        trap += w.juice_only_penalty;
        signals.push("juice_only_move");
    }
    if ratio_known && ratio < w.thin_consensus_max {
        trap += w.thin_consensus_penalty;
        signals.push("thin_consensus");
    }
    if hours.is_some_and(|h| h > w.stale_hours) {
        trap += w.stale_penalty;
        signals.push("stale_move");
    }

    let ses = (sharp - trap).clamp(-100.0, 100.0);
    let sharp_pct = logistic_pct(ses, w.logistic_scale);
    let label = classify(ses, sharp_pct, w);

    SharpResult {
        ses,
        sharp_pct,
        label,
        recommendation: label.recommendation(),
        sharp_pressure: sharp,
        trap_pressure: trap,
        time_decay: decay,
        consensus_ratio: ratio,
        signals,
    }
}

/// Joint cutoff check. Comparisons are inclusive: a score sitting exactly on
/// a cutoff takes the labelled side.
pub fn classify(ses: f64, sharp_pct: f64, w: &SharpWeights) -> SharpLabel {
    if ses >= w.sharp_cutoff && sharp_pct >= w.sharp_pct_min {
        SharpLabel::Sharp
    } else if ses <= w.trap_cutoff && sharp_pct <= w.trap_pct_max {
        SharpLabel::Trap
    } else {
        SharpLabel::Neutral
    }
}

/// Logistic squash of a score into a 0-100 percentage.
pub fn logistic_pct(score: f64, scale: f64) -> f64 {
    let scale = if scale > 0.0 { scale } else { 1.0 };
    (100.0 / (1.0 + (-score / scale).exp())).clamp(0.0, 100.0)
}

/// Points for the bucket `magnitude` falls in. Bucket index is the number of
/// edges at or below the magnitude.
pub fn bucket_points(magnitude: f64, edges: &[f64; 4], points: &[f64; 5]) -> f64 {
    let idx = edges.iter().filter(|&&edge| magnitude >= edge).count();
    points[idx]
}

/// Near-game moves weigh more: 1.0 at or beyond the window, rising linearly to
/// `1 + late_boost` at tip-off.
pub fn time_decay(hours: Option<f64>, w: &SharpWeights) -> f64 {
    match hours {
        Some(h) if w.decay_window_hours > 0.0 && h < w.decay_window_hours => {
            1.0 + w.late_boost * (w.decay_window_hours - h) / w.decay_window_hours
        }
        _ => 1.0,
    }
}

fn consensus_ratio(input: &MovementInput, w: &SharpWeights) -> (f64, bool) {
    match (finite(input.books_count), finite(input.total_books)) {
        (Some(books), Some(total)) if total > 0.0 => ((books / total).clamp(0.0, 1.0), true),
        _ => (w.neutral_consensus, false),
    }
}

fn finite(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(price: f64, line: f64, hours: f64) -> MovementInput {
        MovementInput {
            price_change: Some(price),
            line_change: Some(line),
            hours_to_game: Some(hours),
            ..Default::default()
        }
    }

    #[test]
    fn test_bucket_points_edges_are_inclusive() {
        let w = SharpWeights::default();
        assert_eq!(bucket_points(4.99, &w.price_bucket_edges, &w.price_bucket_points), 0.0);
        assert_eq!(bucket_points(5.0, &w.price_bucket_edges, &w.price_bucket_points), 6.0);
        assert_eq!(bucket_points(25.0, &w.price_bucket_edges, &w.price_bucket_points), 24.0);
        assert_eq!(bucket_points(1.0, &w.line_bucket_edges, &w.line_bucket_points), 10.0);
    }

    #[test]
    fn test_time_decay() {
        let w = SharpWeights::default();
        assert_eq!(time_decay(None, &w), 1.0);
        assert_eq!(time_decay(Some(30.0), &w), 1.0);
        assert_eq!(time_decay(Some(24.0), &w), 1.0);
        assert_eq!(time_decay(Some(0.0), &w), 1.5);
        assert!((time_decay(Some(12.0), &w) - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_is_neutral() {
        let w = SharpWeights::default();
        let r = score_movement(&MovementInput::default(), &w);
        // Only the neutral consensus midpoint contributes.
        assert_eq!(r.sharp_pressure, 7.5);
        assert_eq!(r.trap_pressure, 0.0);
        assert_eq!(r.label, SharpLabel::Neutral);
        assert_eq!(r.recommendation, "PASS");
    }

    #[test]
    fn test_price_change_derived_from_prices() {
        let w = SharpWeights::default();
        let input = MovementInput {
            opening_price: Some(-105.0),
            current_price: Some(-120.0),
            ..Default::default()
        };
        let r = score_movement(&input, &w);
        // 15 cents → bucket 3, decay 1.0, plus juice-only penalty on the trap side.
        assert_eq!(r.sharp_pressure, 18.0 + 7.5);
        assert_eq!(r.trap_pressure, 6.0);
    }

    #[test]
    fn test_adverse_move_builds_trap_pressure() {
        let w = SharpWeights::default();
        let mut input = movement(-20.0, -1.0, 30.0);
        input.current_price = Some(-140.0);
        input.public_pct = Some(80.0);
        let r = score_movement(&input, &w);
        assert_eq!(r.trap_pressure, 18.0 + 10.0 + 10.0 + 10.0);
        assert_eq!(r.label, SharpLabel::Trap);
        assert_eq!(r.recommendation, "FADE");
        assert!(r.signals.contains(&"heavy_juice"));
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let w = SharpWeights::default();
        let input = MovementInput {
            price_change: Some(f64::NAN),
            hours_to_game: Some(f64::INFINITY),
            ..Default::default()
        };
        let r = score_movement(&input, &w);
        assert_eq!(r.time_decay, 1.0);
        assert_eq!(r.sharp_pressure, 7.5);
    }

    #[test]
    fn test_reverse_line_movement_bonus() {
        let w = SharpWeights::default();
        let mut input = movement(10.0, 0.5, 30.0);
        let base = score_movement(&input, &w).sharp_pressure;
        input.public_pct = Some(30.0);
        let rlm = score_movement(&input, &w);
        assert_eq!(rlm.sharp_pressure - base, w.rlm_bonus);
        assert!(rlm.signals.contains(&"reverse_line_movement"));
    }

    #[test]
    fn test_logistic_midpoint() {
        assert_eq!(logistic_pct(0.0, 15.0), 50.0);
        assert!(logistic_pct(100.0, 15.0) > 99.0);
        assert!(logistic_pct(-100.0, 15.0) < 1.0);
    }
}
