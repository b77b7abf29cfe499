//! NHL web API (`api-web.nhle.com`) player game logs.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::NhlConfig;
use crate::data::{GameLogSource, HttpFetcher, PlayerGame};
use crate::sport::Sport;

pub struct NhlClient {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
}

impl NhlClient {
    pub fn new(fetcher: Arc<HttpFetcher>, config: &NhlConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GameLogSource for NhlClient {
    async fn game_log(&self, player_id: &str) -> Result<Vec<PlayerGame>> {
        let url = format!("{}/v1/player/{}/game-log/now", self.base_url, player_id);
        let log: NhlGameLog = self
            .fetcher
            .get_json("nhl.gamelog", &url, &[])
            .await
            .with_context(|| format!("Failed to fetch NHL game log for player {player_id}"))?;

        Ok(log
            .game_log
            .into_iter()
            .filter_map(NhlGame::into_player_game)
            .collect())
    }

    fn sport(&self) -> Sport {
        Sport::Nhl
    }

    fn name(&self) -> &str {
        "nhl_gamelog"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NhlGameLog {
    #[serde(default)]
    game_log: Vec<NhlGame>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NhlGame {
    game_id: i64,
    game_date: String,
    #[serde(default)]
    home_road_flag: String,
    #[serde(default)]
    opponent_abbrev: String,
    #[serde(default)]
    opponent_common_name: Option<LocalizedName>,
    #[serde(default)]
    goals: f64,
    #[serde(default)]
    assists: f64,
    #[serde(default)]
    points: f64,
    #[serde(default)]
    shots: f64,
}

#[derive(Debug, Deserialize)]
struct LocalizedName {
    default: String,
}

impl NhlGame {
    fn into_player_game(self) -> Option<PlayerGame> {
        let date = NaiveDate::parse_from_str(&self.game_date, "%Y-%m-%d").ok()?;
        // Common names ("Panthers") match the nickname at the end of Odds API team names.
        let opponent = self
            .opponent_common_name
            .map(|n| n.default)
            .unwrap_or(self.opponent_abbrev);

        Some(PlayerGame {
            game_id: self.game_id.to_string(),
            date,
            opponent,
            is_home: self.home_road_flag == "H",
            stats: vec![
                ("goals", self.goals),
                ("assists", self.assists),
                ("points", self.points),
                ("shots", self.shots),
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_game_log() {
        let json = r#"{"gameLog": [
            {"gameId": 2023020601, "gameDate": "2024-01-05", "homeRoadFlag": "R",
             "opponentAbbrev": "FLA", "opponentCommonName": {"default": "Panthers"},
             "goals": 1, "assists": 2, "points": 3, "shots": 5},
            {"gameId": 2023020580, "gameDate": "not-a-date", "homeRoadFlag": "H",
             "opponentAbbrev": "TOR", "goals": 0, "assists": 0, "points": 0, "shots": 2}
        ]}"#;
        let log: NhlGameLog = serde_json::from_str(json).unwrap();
        let games: Vec<PlayerGame> = log
            .game_log
            .into_iter()
            .filter_map(NhlGame::into_player_game)
            .collect();

        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, "2023020601");
        assert_eq!(games[0].opponent, "Panthers");
        assert!(!games[0].is_home);
        assert!(games[0].stats.contains(&("shots", 5.0)));
    }
}
