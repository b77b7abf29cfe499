//! Player archetype classification from per-game averages.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeWeights {
    pub bench_minutes_max: f64,
    pub playmaker_assists_min: f64,
    pub primary_scorer_points_min: f64,
    pub glass_cleaner_rebounds_min: f64,
    pub floor_spacer_threes_min: f64,
    pub secondary_scorer_points_min: f64,
}

impl Default for ArchetypeWeights {
    fn default() -> Self {
        Self {
            bench_minutes_max: 15.0,
            playmaker_assists_min: 7.0,
            primary_scorer_points_min: 24.0,
            glass_cleaner_rebounds_min: 10.0,
            floor_spacer_threes_min: 2.5,
            secondary_scorer_points_min: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerAverages {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threes: f64,
    pub minutes: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Bench,
    Playmaker,
    PrimaryScorer,
    GlassCleaner,
    FloorSpacer,
    SecondaryScorer,
    RolePlayer,
}

impl Archetype {
    /// Stats this archetype's usage is built around.
    pub fn primary_stats(self) -> &'static [&'static str] {
        match self {
            Self::Playmaker => &["assists", "pra"],
            Self::PrimaryScorer => &["points", "pra"],
            Self::GlassCleaner => &["rebounds", "pra"],
            Self::FloorSpacer => &["threes", "points"],
            Self::SecondaryScorer => &["points"],
            Self::Bench | Self::RolePlayer => &[],
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).ok()
    }
}

impl std::fmt::Display for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Bench => "bench",
            Self::Playmaker => "playmaker",
            Self::PrimaryScorer => "primary_scorer",
            Self::GlassCleaner => "glass_cleaner",
            Self::FloorSpacer => "floor_spacer",
            Self::SecondaryScorer => "secondary_scorer",
            Self::RolePlayer => "role_player",
        };
        f.write_str(s)
    }
}

/// First matching rule wins; rules are checked in the order listed in
/// [`Archetype`]. Non-finite averages count as zero.
pub fn classify(avg: &PlayerAverages, w: &ArchetypeWeights) -> Archetype {
    let v = |x: f64| if x.is_finite() { x } else { 0.0 };

    if v(avg.minutes) < w.bench_minutes_max {
        Archetype::Bench
    } else if v(avg.assists) >= w.playmaker_assists_min {
        Archetype::Playmaker
    } else if v(avg.points) >= w.primary_scorer_points_min {
        Archetype::PrimaryScorer
    } else if v(avg.rebounds) >= w.glass_cleaner_rebounds_min {
        Archetype::GlassCleaner
    } else if v(avg.threes) >= w.floor_spacer_threes_min {
        Archetype::FloorSpacer
    } else if v(avg.points) >= w.secondary_scorer_points_min {
        Archetype::SecondaryScorer
    } else {
        Archetype::RolePlayer
    }
}
