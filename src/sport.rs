//! Supported leagues and their identifiers at each upstream provider.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nba,
    Nhl,
    Nfl,
    Mlb,
    Ncaab,
    Ncaaf,
}

impl Sport {
    pub const ALL: [Sport; 6] = [
        Sport::Nba,
        Sport::Nhl,
        Sport::Nfl,
        Sport::Mlb,
        Sport::Ncaab,
        Sport::Ncaaf,
    ];

    /// Sport key used by The Odds API.
    pub fn odds_key(self) -> &'static str {
        match self {
            Self::Nba => "basketball_nba",
            Self::Nhl => "icehockey_nhl",
            Self::Nfl => "americanfootball_nfl",
            Self::Mlb => "baseball_mlb",
            Self::Ncaab => "basketball_ncaab",
            Self::Ncaaf => "americanfootball_ncaaf",
        }
    }

    /// `{sport}/{league}` path segment used by ESPN's site API.
    pub fn espn_path(self) -> &'static str {
        match self {
            Self::Nba => "basketball/nba",
            Self::Nhl => "hockey/nhl",
            Self::Nfl => "football/nfl",
            Self::Mlb => "baseball/mlb",
            Self::Ncaab => "basketball/mens-college-basketball",
            Self::Ncaaf => "football/college-football",
        }
    }

    /// Number of teams in the league, used to normalise defense ranks.
    pub fn team_count(self) -> u32 {
        match self {
            Self::Nba => 30,
            Self::Nhl => 32,
            Self::Nfl => 32,
            Self::Mlb => 30,
            // College leagues are ranked against a nominal top-100 pool.
            Self::Ncaab | Self::Ncaaf => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nba => "nba",
            Self::Nhl => "nhl",
            Self::Nfl => "nfl",
            Self::Mlb => "mlb",
            Self::Ncaab => "ncaab",
            Self::Ncaaf => "ncaaf",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|sport| sport.as_str() == lower || sport.odds_key() == lower)
    }
}

impl std::fmt::Display for Sport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team-name match between providers ("Boston Bruins" vs "Bruins").
///
/// Names match when equal, or when the shorter name is the trailing words of
/// the longer one. A bare city ("Los Angeles") matches neither LA team.
pub fn team_matches(a: &str, b: &str) -> bool {
    let a = normalize_team(a);
    let b = normalize_team(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (long, short) = if a.len() > b.len() { (&a, &b) } else { (&b, &a) };
    long.strip_suffix(short.as_str())
        .is_some_and(|head| head.ends_with(' '))
}

fn normalize_team(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_short_and_odds_keys() {
        assert_eq!(Sport::parse("NBA"), Some(Sport::Nba));
        assert_eq!(Sport::parse("icehockey_nhl"), Some(Sport::Nhl));
        assert_eq!(Sport::parse("cricket"), None);
    }

    #[test]
    fn test_serde_lowercase() {
        let s: Sport = serde_json::from_str("\"nhl\"").unwrap();
        assert_eq!(s, Sport::Nhl);
        assert_eq!(serde_json::to_string(&Sport::Nfl).unwrap(), "\"nfl\"");
    }

    #[test]
    fn test_team_matches() {
        assert!(team_matches("Boston Bruins", "Bruins"));
        assert!(team_matches("Boston Celtics", "boston celtics"));
        assert!(!team_matches("Boston Celtics", "Lakers"));
        assert!(!team_matches("Boston Celtics", ""));
        assert!(team_matches("Toronto  Maple Leafs", "maple leafs"));
    }

    #[test]
    fn test_team_matches_needs_the_nickname() {
        assert!(!team_matches("Los Angeles Lakers", "Los Angeles"));
        assert!(!team_matches("Los Angeles Clippers", "Los Angeles"));
        assert!(!team_matches("Boston Celtics", "BOS"));
        assert!(!team_matches("Miami Heat", "eat"));
    }
}
