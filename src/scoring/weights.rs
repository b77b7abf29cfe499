//! Scoring configuration: compiled-in defaults, `[scoring]` TOML overrides,
//! and per-run overrides from the `scoring_weights` table.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::scoring::archetype::ArchetypeWeights;
use crate::scoring::market_signal::SignalWeights;
use crate::scoring::matchup::MatchupWeights;
use crate::scoring::sharp::SharpWeights;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub sharp: SharpWeights,
    pub matchup: MatchupWeights,
    pub signal: SignalWeights,
    pub archetype: ArchetypeWeights,
}

impl ScoringConfig {
    /// Apply `(dotted.key, value)` overrides on top of `self`.
    ///
    /// Keys address existing numeric fields only, e.g. `sharp.steam_bonus` or
    /// `sharp.price_bucket_points.2`. An override that does not resolve, or
    /// that leaves the config failing [`ScoringConfig::validate`], is skipped
    /// and its key returned.
    pub fn with_overrides(&self, overrides: &[(String, f64)]) -> (Self, Vec<String>) {
        let mut current = self.clone();
        let mut rejected = Vec::new();

        for (key, value) in overrides {
            match current.with_override(key, *value) {
                Ok(next) => current = next,
                Err(reason) => {
                    warn!(key = %key, value, reason = %reason, "Ignoring scoring weight");
                    rejected.push(key.clone());
                }
            }
        }

        (current, rejected)
    }

    /// Apply one override, refusing unknown keys and invalid results.
    pub fn with_override(&self, key: &str, value: f64) -> Result<Self, String> {
        let next =
            apply_one(self, key, value).ok_or_else(|| format!("Unknown scoring weight: {key}"))?;
        next.validate().map_err(|errors| errors.join("; "))?;
        Ok(next)
    }

    /// Cross-field invariants the engines rely on.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let sharp = &self.sharp;
        let matchup = &self.matchup;
        let signal = &self.signal;

        if sharp.decay_window_hours <= 0.0 {
            errors.push("sharp.decay_window_hours must be positive".to_string());
        }
        if sharp.logistic_scale <= 0.0 {
            errors.push("sharp.logistic_scale must be positive".to_string());
        }
        if !is_ascending(&sharp.price_bucket_edges) {
            errors.push("sharp.price_bucket_edges must be ascending".to_string());
        }
        if !is_ascending(&sharp.line_bucket_edges) {
            errors.push("sharp.line_bucket_edges must be ascending".to_string());
        }
        if sharp.trap_cutoff > sharp.sharp_cutoff {
            errors.push("sharp.trap_cutoff must not exceed sharp.sharp_cutoff".to_string());
        }

        if !matchup.confidence_floor.is_finite() || !matchup.confidence_ceiling.is_finite() {
            errors.push("matchup confidence bounds must be finite".to_string());
        } else if matchup.confidence_floor > matchup.confidence_ceiling {
            errors.push(format!(
                "matchup.confidence_floor ({}) must not exceed matchup.confidence_ceiling ({})",
                matchup.confidence_floor, matchup.confidence_ceiling
            ));
        }
        if matchup.sample_size < 1.0 {
            errors.push("matchup.sample_size must be at least 1".to_string());
        }

        if signal.overpriced_edge > signal.value_edge {
            errors.push("signal.overpriced_edge must not exceed signal.value_edge".to_string());
        }
        if signal.kelly.kelly_fraction < Decimal::ZERO || signal.kelly.max_stake_pct < Decimal::ZERO {
            errors.push("signal.kelly weights must not be negative".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_ascending(edges: &[f64]) -> bool {
    edges.windows(2).all(|pair| pair[0] < pair[1])
}

fn apply_one(config: &ScoringConfig, key: &str, value: f64) -> Option<ScoringConfig> {
    let number = serde_json::Number::from_f64(value)?;
    let mut tree = serde_json::to_value(config).ok()?;

    let mut node = &mut tree;
    for segment in key.split('.') {
        node = match node {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    // Decimal weights serialize as strings.
    let numeric = match node {
        Value::Number(_) => true,
        Value::String(s) => s.parse::<f64>().is_ok(),
        _ => false,
    };
    if !numeric {
        return None;
    }
    *node = Value::Number(number);

    serde_json::from_value(tree).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_scalar_override() {
        let (cfg, rejected) =
            ScoringConfig::default().with_overrides(&[("sharp.steam_bonus".to_string(), 11.0)]);
        assert!(rejected.is_empty());
        assert_eq!(cfg.sharp.steam_bonus, 11.0);
        assert_eq!(cfg.sharp.rlm_bonus, SharpWeights::default().rlm_bonus);
    }

    #[test]
    fn test_array_element_override() {
        let (cfg, _) = ScoringConfig::default()
            .with_overrides(&[("sharp.price_bucket_points.2".to_string(), 13.0)]);
        assert_eq!(cfg.sharp.price_bucket_points, [0.0, 6.0, 13.0, 18.0, 24.0]);
    }

    #[test]
    fn test_decimal_override() {
        let (cfg, rejected) = ScoringConfig::default()
            .with_overrides(&[("signal.kelly.kelly_fraction".to_string(), 0.5)]);
        assert!(rejected.is_empty());
        assert_eq!(cfg.signal.kelly.kelly_fraction, dec!(0.5));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let (cfg, rejected) = ScoringConfig::default().with_overrides(&[
            ("sharp.nope".to_string(), 1.0),
            ("sharp.price_bucket_points.9".to_string(), 1.0),
            ("sharp".to_string(), 1.0),
            ("matchup.min_games".to_string(), f64::NAN),
        ]);
        assert_eq!(rejected.len(), 4);
        assert_eq!(cfg, ScoringConfig::default());
    }

    #[test]
    fn test_with_override_reports_unknown_key() {
        let base = ScoringConfig::default();
        assert!(base.with_override("matchup.defense_weight", 0.1).is_ok());
        let err = base.with_override("matchup.defence_weight", 0.1).unwrap_err();
        assert!(err.contains("Unknown scoring weight"));
    }

    #[test]
    fn test_inverted_confidence_bounds_rejected() {
        let base = ScoringConfig::default();
        let err = base.with_override("matchup.confidence_floor", 99.0).unwrap_err();
        assert!(err.contains("confidence_floor"));

        let (cfg, rejected) =
            base.with_overrides(&[("matchup.confidence_floor".to_string(), 99.0)]);
        assert_eq!(rejected, vec!["matchup.confidence_floor".to_string()]);
        assert_eq!(cfg.matchup.confidence_floor, 30.0);

        // Raising the ceiling first makes room for the higher floor.
        let (cfg, rejected) = base.with_overrides(&[
            ("matchup.confidence_ceiling".to_string(), 100.0),
            ("matchup.confidence_floor".to_string(), 99.0),
        ]);
        assert!(rejected.is_empty());
        assert_eq!(cfg.matchup.confidence_floor, 99.0);
    }

    #[test]
    fn test_validate_catches_degenerate_weights() {
        assert!(ScoringConfig::default().validate().is_ok());

        let mut cfg = ScoringConfig::default();
        cfg.sharp.decay_window_hours = 0.0;
        cfg.sharp.logistic_scale = -1.0;
        cfg.sharp.price_bucket_edges = [5.0, 5.0, 15.0, 25.0];
        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
