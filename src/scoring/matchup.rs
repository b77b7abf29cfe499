//! Median matchup edge engine for player props.
//!
//! Projects a player's stat as the median of recent games, nudged by the
//! opponent's defensive rank and home court, then compares the projection
//! against the posted line.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::scoring::archetype::Archetype;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchupWeights {
    pub sample_size: f64,
    pub min_games: f64,
    pub defense_weight: f64,
    pub home_boost: f64,
    pub min_edge_pct: f64,
    pub min_hit_rate: f64,
    pub full_sample_bonus: f64,
    pub archetype_bonus: f64,
    pub confidence_floor: f64,
    pub confidence_ceiling: f64,
}

impl Default for MatchupWeights {
    fn default() -> Self {
        Self {
            sample_size: 10.0,
            min_games: 5.0,
            defense_weight: 0.06,
            home_boost: 0.02,
            min_edge_pct: 0.05,
            min_hit_rate: 0.55,
            full_sample_bonus: 5.0,
            archetype_bonus: 5.0,
            confidence_floor: 30.0,
            confidence_ceiling: 95.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupInput {
    /// Recent stat values, most recent game first.
    pub values: Vec<f64>,
    pub line: f64,
    #[serde(default)]
    pub stat: Option<String>,
    /// 1 = stingiest defense against this stat.
    #[serde(default, alias = "opponent_rank")]
    pub opponent_rank: Option<u32>,
    #[serde(default, alias = "team_count")]
    pub team_count: Option<u32>,
    #[serde(default, alias = "is_home")]
    pub is_home: Option<bool>,
    #[serde(default)]
    pub archetype: Option<Archetype>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PropPick {
    Over,
    Under,
    Pass,
}

impl std::fmt::Display for PropPick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Over => write!(f, "OVER"),
            Self::Under => write!(f, "UNDER"),
            Self::Pass => write!(f, "PASS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchupResult {
    pub median: f64,
    pub adjustment: f64,
    pub adjusted_median: f64,
    pub edge: f64,
    pub edge_pct: f64,
    pub over_rate: f64,
    pub under_rate: f64,
    /// Hit rate on the side the edge points to.
    pub hit_rate: f64,
    pub sample_size: usize,
    pub confidence: f64,
    pub recommendation: PropPick,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

const DEFAULT_TEAM_COUNT: u32 = 30;

pub fn score_prop(input: &MatchupInput, w: &MatchupWeights) -> MatchupResult {
    let take = w.sample_size.max(1.0) as usize;
    let sample: Vec<f64> = input
        .values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .take(take)
        .collect();
    let n = sample.len();
    let (lo, hi) = (
        w.confidence_floor.min(w.confidence_ceiling),
        w.confidence_floor.max(w.confidence_ceiling),
    );

    let median = median(&sample).unwrap_or(0.0);
    let adjustment = matchup_adjustment(input, w);
    let adjusted_median = median * (1.0 + adjustment);
    let line = if input.line.is_finite() { input.line } else { 0.0 };
    let edge = adjusted_median - line;
    let edge_pct = if line > 0.0 { edge / line } else { 0.0 };

    let (over_rate, under_rate) = if n == 0 {
        (0.0, 0.0)
    } else {
        let over = sample.iter().filter(|&&v| v > line).count() as f64;
        let under = sample.iter().filter(|&&v| v < line).count() as f64;
        (over / n as f64, under / n as f64)
    };
    let hit_rate = if edge >= 0.0 { over_rate } else { under_rate };

    if (n as f64) < w.min_games {
        return MatchupResult {
            median,
            adjustment,
            adjusted_median,
            edge,
            edge_pct,
            over_rate,
            under_rate,
            hit_rate,
            sample_size: n,
            confidence: lo,
            recommendation: PropPick::Pass,
            reason: Some("insufficient_sample"),
        };
    }

    let recommendation = if edge_pct >= w.min_edge_pct && over_rate >= w.min_hit_rate {
        PropPick::Over
    } else if edge_pct <= -w.min_edge_pct && under_rate >= w.min_hit_rate {
        PropPick::Under
    } else {
        PropPick::Pass
    };

    let mut confidence = 50.0 + edge_pct.abs() * 150.0 + (hit_rate - 0.5) * 60.0;
    if n >= take {
        confidence += w.full_sample_bonus;
    }
    let archetype_match = match (input.archetype, input.stat.as_deref()) {
        (Some(archetype), Some(stat)) => archetype.primary_stats().contains(&stat),
        _ => false,
    };
    if archetype_match {
        confidence += w.archetype_bonus;
    }
    let confidence = confidence.clamp(lo, hi);

    MatchupResult {
        median,
        adjustment,
        adjusted_median,
        edge,
        edge_pct,
        over_rate,
        under_rate,
        hit_rate,
        sample_size: n,
        confidence,
        recommendation,
        reason: None,
    }
}

/// Fractional projection adjustment from opponent rank and venue.
///
/// Rank 1 (stingiest) maps to `-defense_weight`, the last rank to
/// `+defense_weight`; an unknown rank contributes nothing.
pub fn matchup_adjustment(input: &MatchupInput, w: &MatchupWeights) -> f64 {
    let teams = input.team_count.unwrap_or(DEFAULT_TEAM_COUNT);
    let mut adj = 0.0;
    if let Some(rank) = input.opponent_rank {
        if teams > 1 {
            let rank = rank.clamp(1, teams) as f64;
            let mid = (teams as f64 + 1.0) / 2.0;
            let half = (teams as f64 - 1.0) / 2.0;
            adj += (rank - mid) / half * w.defense_weight;
        }
    }
    if input.is_home == Some(true) {
        adj += w.home_boost;
    }
    adj
}

/// Median; mean of the two middle values for even-sized samples.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// A single player-game stat line credited against the opponent.
#[derive(Debug, Clone)]
pub struct OpponentSample {
    pub opponent: String,
    pub game_id: String,
    pub value: f64,
}

/// Rank opponents by average stat allowed per game, 1 = fewest allowed.
///
/// Player lines from the same game are summed first, so the average is per
/// game rather than per player. Ties are broken by opponent name.
pub fn defense_ranks(samples: &[OpponentSample]) -> HashMap<String, u32> {
    let mut per_game: HashMap<(&str, &str), f64> = HashMap::new();
    for s in samples.iter().filter(|s| s.value.is_finite()) {
        *per_game
            .entry((s.opponent.as_str(), s.game_id.as_str()))
            .or_default() += s.value;
    }

    let mut per_team: HashMap<&str, (f64, u32)> = HashMap::new();
    for ((team, _), total) in per_game {
        let entry = per_team.entry(team).or_default();
        entry.0 += total;
        entry.1 += 1;
    }

    let mut averages: Vec<(&str, f64)> = per_team
        .into_iter()
        .map(|(team, (total, games))| (team, total / games as f64))
        .collect();
    averages.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    averages
        .into_iter()
        .enumerate()
        .map(|(i, (team, _))| (team.to_string(), i as u32 + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(values: &[f64], line: f64) -> MatchupInput {
        MatchupInput {
            values: values.to_vec(),
            line,
            ..Default::default()
        }
    }

    const TEN_GAMES: [f64; 10] = [30.0, 28.0, 26.0, 25.0, 24.0, 22.0, 20.0, 31.0, 27.0, 23.0];

    #[test]
    fn test_median() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_clear_over() {
        let w = MatchupWeights::default();
        let r = score_prop(&input(&TEN_GAMES, 22.5), &w);
        assert_eq!(r.median, 25.5);
        assert_eq!(r.recommendation, PropPick::Over);
        assert_eq!(r.over_rate, 0.8);
        // 50 + 0.1333*150 + 0.3*60 + 5
        assert!((r.confidence - 93.0).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_confidence_bounds_do_not_panic() {
        let w = MatchupWeights {
            confidence_floor: 99.0,
            ..Default::default()
        };
        let r = score_prop(&input(&[30.0; 10], 22.5), &w);
        assert_eq!(r.recommendation, PropPick::Over);
        assert!(r.confidence >= 95.0 && r.confidence <= 99.0);

        let thin = score_prop(&input(&[30.0; 2], 22.5), &w);
        assert_eq!(thin.confidence, 95.0);
    }

    #[test]
    fn test_clear_under() {
        let w = MatchupWeights::default();
        let r = score_prop(&input(&TEN_GAMES, 29.5), &w);
        assert_eq!(r.recommendation, PropPick::Under);
        assert_eq!(r.under_rate, 0.8);
    }

    #[test]
    fn test_insufficient_sample_passes_at_floor() {
        let w = MatchupWeights::default();
        let r = score_prop(&input(&[40.0, 41.0, 39.0], 20.5), &w);
        assert_eq!(r.recommendation, PropPick::Pass);
        assert_eq!(r.confidence, w.confidence_floor);
        assert_eq!(r.reason, Some("insufficient_sample"));
    }

    #[test]
    fn test_only_most_recent_games_count() {
        let w = MatchupWeights::default();
        let mut values = TEN_GAMES.to_vec();
        values.extend([0.0; 10]);
        let r = score_prop(&input(&values, 22.5), &w);
        assert_eq!(r.sample_size, 10);
        assert_eq!(r.median, 25.5);
    }

    #[test]
    fn test_defense_adjustment_range() {
        let w = MatchupWeights::default();
        let mut i = input(&TEN_GAMES, 22.5);
        i.opponent_rank = Some(30);
        assert!((matchup_adjustment(&i, &w) - 0.06).abs() < 1e-12);
        i.opponent_rank = Some(1);
        assert!((matchup_adjustment(&i, &w) + 0.06).abs() < 1e-12);
        i.opponent_rank = None;
        i.is_home = Some(true);
        assert!((matchup_adjustment(&i, &w) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_archetype_bonus_applies_to_primary_stat() {
        let w = MatchupWeights::default();
        let mut i = input(&TEN_GAMES, 25.5);
        let base = score_prop(&i, &w).confidence;
        i.stat = Some("points".to_string());
        i.archetype = Some(Archetype::PrimaryScorer);
        let boosted = score_prop(&i, &w).confidence;
        assert!((boosted - base - w.archetype_bonus).abs() < 1e-9);
    }

    #[test]
    fn test_defense_ranks_per_game_average() {
        let s = |team: &str, game: &str, value: f64| OpponentSample {
            opponent: team.to_string(),
            game_id: game.to_string(),
            value,
        };
        let samples = vec![
            s("BOS", "g1", 20.0),
            s("BOS", "g1", 10.0),
            s("BOS", "g2", 40.0),
            s("LAL", "g3", 50.0),
            s("MIA", "g4", 25.0),
        ];
        let ranks = defense_ranks(&samples);
        // MIA 25, BOS 35 (30 and 40), LAL 50
        assert_eq!(ranks["MIA"], 1);
        assert_eq!(ranks["BOS"], 2);
        assert_eq!(ranks["LAL"], 3);
    }
}
