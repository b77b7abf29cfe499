//! ESPN public APIs: league scoreboards and NBA athlete game logs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::EspnConfig;
use crate::data::{GameLogSource, HttpFetcher, PlayerGame};
use crate::sport::Sport;

pub struct EspnClient {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    web_base_url: String,
}

impl EspnClient {
    pub fn new(fetcher: Arc<HttpFetcher>, config: &EspnConfig) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            web_base_url: config.web_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn fetch_scoreboard(&self, sport: Sport, date: NaiveDate) -> Result<Vec<EspnEvent>> {
        let url = format!(
            "{}/apis/site/v2/sports/{}/scoreboard",
            self.base_url,
            sport.espn_path()
        );
        let query = [("dates", date.format("%Y%m%d").to_string())];
        let board: EspnScoreboard = self
            .fetcher
            .get_json("espn.scoreboard", &url, &query)
            .await
            .with_context(|| format!("Failed to fetch {sport} scoreboard for {date}"))?;
        Ok(board.events)
    }

    pub async fn fetch_nba_game_log(&self, athlete_id: &str) -> Result<Vec<PlayerGame>> {
        let url = format!(
            "{}/apis/common/v3/sports/basketball/nba/athletes/{}/gamelog",
            self.web_base_url, athlete_id
        );
        let log: EspnGameLog = self
            .fetcher
            .get_json("espn.gamelog", &url, &[])
            .await
            .with_context(|| format!("Failed to fetch game log for athlete {athlete_id}"))?;
        Ok(log.into_games())
    }
}

#[async_trait]
impl GameLogSource for EspnClient {
    async fn game_log(&self, player_id: &str) -> Result<Vec<PlayerGame>> {
        self.fetch_nba_game_log(player_id).await
    }

    fn sport(&self) -> Sport {
        Sport::Nba
    }

    fn name(&self) -> &str {
        "espn_nba_gamelog"
    }
}

// --- Scoreboard types ---

#[derive(Debug, Deserialize)]
struct EspnScoreboard {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnEvent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// ISO timestamp, minute precision (`2024-01-15T00:30Z`).
    pub date: String,
    #[serde(default)]
    pub competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnCompetition {
    #[serde(default)]
    pub competitors: Vec<EspnCompetitor>,
    pub status: EspnStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EspnCompetitor {
    pub team: EspnTeam,
    #[serde(default)]
    pub score: Option<String>,
    pub home_away: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EspnTeam {
    pub display_name: String,
    #[serde(default)]
    pub abbreviation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnStatus {
    #[serde(rename = "type")]
    pub type_detail: EspnStatusType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspnStatusType {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
}

impl EspnEvent {
    pub fn competitor(&self, home_away: &str) -> Option<&EspnCompetitor> {
        self.competitions
            .first()?
            .competitors
            .iter()
            .find(|c| c.home_away == home_away)
    }

    pub fn status(&self) -> Option<&EspnStatusType> {
        self.competitions.first().map(|c| &c.status.type_detail)
    }
}

impl EspnCompetitor {
    pub fn score_value(&self) -> Option<i64> {
        self.score.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

// --- Game log types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnGameLog {
    #[serde(default)]
    labels: Vec<String>,
    /// Game metadata keyed by event id.
    #[serde(default)]
    events: HashMap<String, EspnGameMeta>,
    #[serde(default)]
    season_types: Vec<EspnSeasonType>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnGameMeta {
    #[serde(default)]
    game_date: String,
    /// `@` for road games, `vs` at home.
    #[serde(default)]
    at_vs: String,
    #[serde(default)]
    opponent: Option<EspnTeam>,
}

#[derive(Debug, Deserialize)]
struct EspnSeasonType {
    #[serde(default)]
    categories: Vec<EspnCategory>,
}

#[derive(Debug, Deserialize)]
struct EspnCategory {
    #[serde(default)]
    events: Vec<EspnStatLine>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnStatLine {
    event_id: String,
    #[serde(default)]
    stats: Vec<String>,
}

impl EspnGameLog {
    fn into_games(self) -> Vec<PlayerGame> {
        let col = |label: &str| self.labels.iter().position(|l| l == label);
        let (min, threes, reb, ast, pts) = (col("MIN"), col("3PT"), col("REB"), col("AST"), col("PTS"));

        let mut games = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for line in self
            .season_types
            .iter()
            .flat_map(|s| &s.categories)
            .flat_map(|c| &c.events)
        {
            if !seen.insert(line.event_id.as_str()) {
                continue;
            }
            let Some(meta) = self.events.get(&line.event_id) else {
                continue;
            };
            let Some(date) = parse_date_prefix(&meta.game_date) else {
                continue;
            };

            let stat = |idx: Option<usize>| -> f64 {
                idx.and_then(|i| line.stats.get(i))
                    .map(|s| parse_stat(s))
                    .unwrap_or(0.0)
            };
            let (points, rebounds, assists) = (stat(pts), stat(reb), stat(ast));

            games.push(PlayerGame {
                game_id: line.event_id.clone(),
                date,
                opponent: meta
                    .opponent
                    .as_ref()
                    .map(|t| t.display_name.clone())
                    .unwrap_or_default(),
                is_home: meta.at_vs != "@",
                stats: vec![
                    ("points", points),
                    ("rebounds", rebounds),
                    ("assists", assists),
                    ("threes", stat(threes)),
                    ("minutes", stat(min)),
                    ("pra", points + rebounds + assists),
                ],
            });
        }

        games
    }
}

/// Leading `YYYY-MM-DD` of an ISO timestamp.
fn parse_date_prefix(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok()
}

/// Numeric box-score cell. Made-attempted cells (`3-7`) yield the made count.
fn parse_stat(cell: &str) -> f64 {
    let made = cell.split('-').next().unwrap_or(cell);
    made.trim().parse().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAMELOG: &str = r#"{
        "labels": ["MIN", "FG", "3PT", "REB", "AST", "PTS"],
        "events": {
            "401": {"gameDate": "2024-01-05T00:30:00.000+00:00", "atVs": "vs",
                    "opponent": {"displayName": "Miami Heat", "abbreviation": "MIA"}},
            "402": {"gameDate": "2024-01-07T00:00:00.000+00:00", "atVs": "@",
                    "opponent": {"displayName": "New York Knicks", "abbreviation": "NY"}}
        },
        "seasonTypes": [{
            "categories": [
                {"events": [
                    {"eventId": "401", "stats": ["36", "10-20", "3-7", "8", "5", "28"]},
                    {"eventId": "402", "stats": ["30", "7-15", "1-4", "10", "3", "17"]},
                    {"eventId": "999", "stats": ["30", "7-15", "1-4", "10", "3", "17"]}
                ]},
                {"events": [
                    {"eventId": "401", "stats": ["36", "10-20", "3-7", "8", "5", "28"]}
                ]}
            ]
        }]
    }"#;

    #[test]
    fn test_game_log_parsing() {
        let log: EspnGameLog = serde_json::from_str(GAMELOG).unwrap();
        let games = log.into_games();
        assert_eq!(games.len(), 2);

        let first = &games[0];
        assert_eq!(first.game_id, "401");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 5).unwrap());
        assert!(first.is_home);
        assert_eq!(first.opponent, "Miami Heat");
        assert!(first.stats.contains(&("threes", 3.0)));
        assert!(first.stats.contains(&("pra", 41.0)));

        assert!(!games[1].is_home);
    }

    #[test]
    fn test_parse_stat_cells() {
        assert_eq!(parse_stat("28"), 28.0);
        assert_eq!(parse_stat("3-7"), 3.0);
        assert_eq!(parse_stat("--"), 0.0);
    }

    #[test]
    fn test_scoreboard_helpers() {
        let json = r#"{"events": [{
            "id": "401", "name": "Miami Heat at Boston Celtics", "date": "2024-01-15T00:30Z",
            "competitions": [{
                "competitors": [
                    {"team": {"displayName": "Boston Celtics", "abbreviation": "BOS"}, "score": "112", "homeAway": "home"},
                    {"team": {"displayName": "Miami Heat", "abbreviation": "MIA"}, "score": "104", "homeAway": "away"}
                ],
                "status": {"type": {"description": "Final", "completed": true}}
            }]
        }]}"#;
        let board: EspnScoreboard = serde_json::from_str(json).unwrap();
        let event = &board.events[0];
        assert_eq!(event.competitor("home").unwrap().score_value(), Some(112));
        assert_eq!(event.competitor("away").unwrap().team.display_name, "Miami Heat");
        assert!(event.status().unwrap().completed);
    }
}
