//! Ingestion against mocked upstream APIs.

use std::path::Path;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sharp_signals::config::{AppConfig, HttpConfig, Secrets};
use sharp_signals::data::HttpFetcher;
use sharp_signals::db::store::Table;
use sharp_signals::db::Store;
use sharp_signals::jobs::{run_job, Job, JobContext, JobParams};
use sharp_signals::sport::Sport;

fn fast_http() -> HttpConfig {
    HttpConfig {
        timeout_seconds: 5,
        max_retries: 2,
        retry_delay_ms: 10,
        requests_per_second: 100,
        burst_size: 100,
        batch_size: 5,
        batch_delay_ms: 0,
    }
}

async fn context(server: &MockServer, api_key: Option<&str>) -> JobContext {
    let mut config = AppConfig::from_file(Path::new("config/default.toml")).unwrap();
    config.http = fast_http();
    config.odds_api.base_url = server.uri();
    config.espn.base_url = server.uri();
    config.espn.web_base_url = server.uri();
    config.nhl.base_url = server.uri();

    let store = Store::new(":memory:").await.unwrap();
    let secrets = Secrets {
        odds_api_key: api_key.map(str::to_string),
    };
    JobContext::new(store, config, secrets).unwrap()
}

fn nba_only() -> JobParams {
    JobParams {
        sports: Some(vec![Sport::Nba]),
        days_back: Some(0),
    }
}

/// Per book: (favourite price, underdog price, favourite spread).
fn odds_payload(dk: (i64, i64, f64), fd: (i64, i64, f64)) -> serde_json::Value {
    let book = |key: &str, (fav, dog, point): (i64, i64, f64)| {
        json!({
            "key": key,
            "title": key,
            "markets": [{
                "key": "spreads",
                "outcomes": [
                    {"name": "Boston Celtics", "price": fav, "point": point},
                    {"name": "Miami Heat", "price": dog, "point": -point}
                ]
            }]
        })
    };
    json!([{
        "id": "evt-1",
        "sport_key": "basketball_nba",
        "commence_time": "2099-01-15T00:30:00Z",
        "home_team": "Boston Celtics",
        "away_team": "Miami Heat",
        "bookmakers": [book("draftkings", dk), book("fanduel", fd)]
    }])
}

async fn mount_odds(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/v4/sports/basketball_nba/odds"))
        .and(query_param("apiKey", "test-key"))
        .and(query_param("oddsFormat", "american"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

// ──────────────────────────────────────────
// Odds ingestion
// ──────────────────────────────────────────

#[tokio::test]
async fn ingesting_same_payload_twice_is_idempotent() {
    let server = MockServer::start().await;
    mount_odds(&server, odds_payload((-110, -110, -5.5), (-110, -110, -5.5))).await;
    let ctx = context(&server, Some("test-key")).await;

    let first = run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap();
    assert_eq!(first.fetched, 1);
    assert_eq!(first.upserted, 4);
    assert_eq!(ctx.store.count_rows(Table::LineMovements).await.unwrap(), 4);

    run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap();
    assert_eq!(ctx.store.count_rows(Table::LineMovements).await.unwrap(), 4);
    assert_eq!(ctx.store.count_rows(Table::JobRuns).await.unwrap(), 2);
}

#[tokio::test]
async fn later_ingest_moves_current_and_keeps_opening() {
    let server = MockServer::start().await;
    mount_odds(&server, odds_payload((-110, -110, -5.5), (-110, -110, -5.5))).await;
    let ctx = context(&server, Some("test-key")).await;
    run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap();

    server.reset().await;
    mount_odds(&server, odds_payload((-125, 105, -6.5), (-120, 100, -6.5))).await;
    run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap();

    let rows = ctx
        .store
        .upcoming_movements("2000-01-01T00:00:00Z")
        .await
        .unwrap();
    assert_eq!(rows.len(), 4);
    let dk = rows
        .iter()
        .find(|r| r.bookmaker == "draftkings" && r.outcome == "Boston Celtics")
        .unwrap();
    assert_eq!(dk.opening_price, -110);
    assert_eq!(dk.opening_point, Some(-5.5));
    assert_eq!(dk.current_price, -125);
    assert_eq!(dk.current_point, Some(-6.5));

    let report = run_job(&ctx, Job::ScoreMovements, &JobParams::default())
        .await
        .unwrap();
    assert_eq!(report.upserted, 2);
    let celtics = ctx
        .store
        .get_sharp_scores(None)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.outcome == "Boston Celtics")
        .unwrap();
    assert!(celtics.price_change > 0.0);
    assert_eq!(celtics.line_change, 1.0);
    assert_eq!(celtics.books_count, 2);
}

#[tokio::test]
async fn missing_api_key_fails_job_and_records_it() {
    let server = MockServer::start().await;
    let ctx = context(&server, None).await;

    let err = run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap_err();
    assert!(err.to_string().contains("ODDS_API_KEY"));

    let runs = ctx.store.get_recent_job_runs(5).await.unwrap();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].success);
}

#[tokio::test]
async fn upstream_failure_is_counted_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/sports/basketball_nba/odds"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid key"))
        .expect(1)
        .mount(&server)
        .await;
    let ctx = context(&server, Some("bad-key")).await;

    let report = run_job(&ctx, Job::IngestOdds, &nba_only()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.upserted, 0);
}

// ──────────────────────────────────────────
// Retry policy
// ──────────────────────────────────────────

#[tokio::test]
async fn server_error_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fast_http()).unwrap();
    let body: serde_json::Value = fetcher
        .get_json("test.flaky", &format!("{}/flaky", server.uri()), &[])
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fast_http()).unwrap();
    let result = fetcher
        .get_json::<serde_json::Value>("test.missing", &format!("{}/missing", server.uri()), &[])
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn retries_give_up_after_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&fast_http()).unwrap();
    let err = fetcher
        .get_json::<serde_json::Value>("test.down", &format!("{}/down", server.uri()), &[])
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("failed after 2 retries"));
}

// ──────────────────────────────────────────
// Scoreboards and game logs
// ──────────────────────────────────────────

#[tokio::test]
async fn scoreboard_upserts_games() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apis/site/v2/sports/basketball/nba/scoreboard"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [{
                "id": "401",
                "name": "Miami Heat at Boston Celtics",
                "date": "2024-01-15T00:30Z",
                "competitions": [{
                    "competitors": [
                        {"team": {"displayName": "Boston Celtics", "abbreviation": "BOS"}, "score": "112", "homeAway": "home"},
                        {"team": {"displayName": "Miami Heat", "abbreviation": "MIA"}, "score": "104", "homeAway": "away"}
                    ],
                    "status": {"type": {"description": "Final", "completed": true}}
                }]
            }]
        })))
        .mount(&server)
        .await;
    let ctx = context(&server, None).await;

    let params = JobParams {
        sports: Some(vec![Sport::Nba]),
        days_back: Some(1),
    };
    let report = run_job(&ctx, Job::IngestScoreboard, &params).await.unwrap();
    // Two dates requested, same game returned for both.
    assert_eq!(report.upserted, 2);
    let games = ctx.store.get_games("nba").await.unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].home_score, Some(112));
    assert!(games[0].completed);
}

#[tokio::test]
async fn nhl_game_logs_are_stored_per_stat() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/player/8478402/game-log/now"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "gameLog": [
                {"gameId": 2023020601, "gameDate": "2024-01-05", "homeRoadFlag": "H",
                 "opponentAbbrev": "FLA", "opponentCommonName": {"default": "Panthers"},
                 "goals": 1, "assists": 2, "points": 3, "shots": 5}
            ]
        })))
        .mount(&server)
        .await;
    let ctx = context(&server, None).await;

    let players = vec![sharp_signals::data::PlayerRef {
        id: "8478402".to_string(),
        name: "Connor McDavid".to_string(),
        team: "Edmonton Oilers".to_string(),
    }];
    let report = sharp_signals::jobs::ingest::ingest_game_logs(&ctx, Sport::Nhl, &players)
        .await
        .unwrap();
    assert_eq!(report.fetched, 1);
    assert_eq!(report.upserted, 4);
    assert_eq!(ctx.store.count_rows(Table::Players).await.unwrap(), 1);

    // A stored player is picked up by the refresh job.
    let params = JobParams {
        sports: Some(vec![Sport::Nhl]),
        days_back: None,
    };
    let refreshed = run_job(&ctx, Job::IngestGameLogs, &params).await.unwrap();
    assert_eq!(refreshed.fetched, 1);
    assert_eq!(ctx.store.count_rows(Table::PlayerGameLogs).await.unwrap(), 4);
}
