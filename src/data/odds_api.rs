//! The Odds API v4 client: game lines and player prop markets.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::OddsApiConfig;
use crate::data::HttpFetcher;
use crate::sport::Sport;

pub struct OddsApiClient {
    fetcher: Arc<HttpFetcher>,
    base_url: String,
    api_key: String,
    regions: String,
    markets: Vec<String>,
    prop_markets: Vec<String>,
}

impl OddsApiClient {
    pub fn new(fetcher: Arc<HttpFetcher>, config: &OddsApiConfig, api_key: &str) -> Self {
        Self {
            fetcher,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            regions: config.regions.clone(),
            markets: config.markets.clone(),
            prop_markets: config.prop_markets.clone(),
        }
    }

    fn query(&self, markets: &[String]) -> Vec<(&'static str, String)> {
        vec![
            ("apiKey", self.api_key.clone()),
            ("regions", self.regions.clone()),
            ("markets", markets.join(",")),
            ("oddsFormat", "american".to_string()),
            ("dateFormat", "iso".to_string()),
        ]
    }

    /// Game lines (moneyline, spreads, totals) for every upcoming event.
    pub async fn fetch_odds(&self, sport: Sport) -> Result<Vec<OddsEvent>> {
        let url = format!("{}/v4/sports/{}/odds", self.base_url, sport.odds_key());
        self.fetcher
            .get_json("odds_api.odds", &url, &self.query(&self.markets))
            .await
            .with_context(|| format!("Failed to fetch {sport} odds"))
    }

    /// Upcoming events without prices.
    pub async fn fetch_events(&self, sport: Sport) -> Result<Vec<OddsEvent>> {
        let url = format!("{}/v4/sports/{}/events", self.base_url, sport.odds_key());
        let query = [
            ("apiKey", self.api_key.clone()),
            ("dateFormat", "iso".to_string()),
        ];
        self.fetcher
            .get_json("odds_api.events", &url, &query)
            .await
            .with_context(|| format!("Failed to fetch {sport} events"))
    }

    /// Player prop markets for one event. Props are only served per event.
    pub async fn fetch_event_props(&self, sport: Sport, event_id: &str) -> Result<OddsEvent> {
        let url = format!(
            "{}/v4/sports/{}/events/{}/odds",
            self.base_url,
            sport.odds_key(),
            event_id
        );
        self.fetcher
            .get_json("odds_api.event_odds", &url, &self.query(&self.prop_markets))
            .await
            .with_context(|| format!("Failed to fetch props for event {event_id}"))
    }
}

/// Stat name stored for an Odds API player market key.
pub fn prop_stat(market_key: &str) -> Option<&'static str> {
    let stat = match market_key {
        "player_points" => "points",
        "player_rebounds" => "rebounds",
        "player_assists" => "assists",
        "player_threes" => "threes",
        "player_points_rebounds_assists" => "pra",
        "player_shots_on_goal" => "shots",
        "player_goals" => "goals",
        "player_hockey_assists" => "assists",
        "player_hockey_points" => "points",
        _ => return None,
    };
    Some(stat)
}

// --- The Odds API Response Types ---

#[derive(Debug, Clone, Deserialize)]
pub struct OddsEvent {
    pub id: String,
    #[serde(default)]
    pub sport_key: String,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub home_team: String,
    #[serde(default)]
    pub away_team: String,
    #[serde(default)]
    pub bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bookmaker {
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markets: Vec<Market>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Market {
    pub key: String,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Outcome {
    /// Team name, or `Over` / `Under` for totals and props.
    pub name: String,
    /// American odds.
    pub price: f64,
    #[serde(default)]
    pub point: Option<f64>,
    /// Player name on prop markets.
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_odds_payload() {
        let json = r#"[{
            "id": "e1",
            "sport_key": "basketball_nba",
            "commence_time": "2030-01-15T00:30:00Z",
            "home_team": "Boston Celtics",
            "away_team": "Miami Heat",
            "bookmakers": [{
                "key": "draftkings",
                "title": "DraftKings",
                "markets": [{
                    "key": "spreads",
                    "outcomes": [
                        {"name": "Boston Celtics", "price": -110, "point": -5.5},
                        {"name": "Miami Heat", "price": -110, "point": 5.5}
                    ]
                }]
            }]
        }]"#;
        let events: Vec<OddsEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events.len(), 1);
        let market = &events[0].bookmakers[0].markets[0];
        assert_eq!(market.outcomes[0].price, -110.0);
        assert_eq!(market.outcomes[1].point, Some(5.5));
    }

    #[test]
    fn test_events_without_bookmakers() {
        let json = r#"[{"id": "e1", "commence_time": "2030-01-15T00:30:00Z",
            "home_team": "A", "away_team": "B"}]"#;
        let events: Vec<OddsEvent> = serde_json::from_str(json).unwrap();
        assert!(events[0].bookmakers.is_empty());
    }

    #[test]
    fn test_prop_stat_mapping() {
        assert_eq!(prop_stat("player_points_rebounds_assists"), Some("pra"));
        assert_eq!(prop_stat("player_shots_on_goal"), Some("shots"));
        assert_eq!(prop_stat("h2h"), None);
    }
}
