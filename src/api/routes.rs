//! Edge-function style JSON endpoints.
//!
//! Every POST route takes a JSON body (an empty body is read as `{}`) and
//! answers `{"success": true, ...}` or, through [`ApiError`],
//! `{"success": false, "error": "..."}`.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::data::PlayerRef;
use crate::db::timestamp;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{self, ingest, Job, JobContext, JobParams};
use crate::scoring::archetype::{self, PlayerAverages};
use crate::scoring::market_signal::{self, BookPrice};
use crate::scoring::matchup::{self, MatchupInput};
use crate::scoring::sharp::{self, MovementInput};
use crate::sport::Sport;

pub type ApiState = Arc<JobContext>;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/sharp-engine-v2", post(sharp_engine_handler))
        .route("/market-signal-engine", post(market_signal_handler))
        .route("/median-matchup-engine", post(matchup_handler))
        .route("/archetypes", post(archetypes_handler))
        .route("/ingest-odds", post(ingest_odds_handler))
        .route("/ingest-props", post(ingest_props_handler))
        .route("/ingest-scoreboard", post(ingest_scoreboard_handler))
        .route("/ingest-game-logs", post(ingest_game_logs_handler))
        .route("/grade-props", post(grade_props_handler))
        .route("/weights", post(weights_handler))
        .route("/sharp-scores", get(sharp_scores_handler))
        .route("/prop-edges", get(prop_edges_handler))
        .route("/games", get(games_handler))
        .route("/job-runs", get(job_runs_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: ApiState, bind: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{bind}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "API server listening");

    axum::serve(listener, router(state))
        .await
        .context("API server error")
}

// -- Helpers --

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(body)?)
}

fn respond<T: Serialize>(key: &str, payload: T) -> ApiResult<Json<Value>> {
    let payload = serde_json::to_value(payload).context("Failed to serialize response")?;
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert(key.to_string(), payload);
    Ok(Json(Value::Object(body)))
}

async fn run(state: &ApiState, job: Job, params: &JobParams) -> ApiResult<Json<Value>> {
    params
        .validate(&state.config.jobs)
        .map_err(ApiError::BadRequest)?;
    let report = jobs::run_job(state, job, params).await?;
    respond("report", report)
}

// -- Route Handlers --

async fn health_handler() -> Json<Value> {
    Json(serde_json::json!({
        "success": true,
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum SharpRequest {
    Analyze {
        #[serde(default, rename = "movementData", alias = "movement_data")]
        movement_data: MovementInput,
    },
    ScoreAll,
}

async fn sharp_engine_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    match parse_body(&body)? {
        SharpRequest::Analyze { movement_data } => {
            let scoring = state.effective_scoring().await?;
            respond("result", sharp::score_movement(&movement_data, &scoring.sharp))
        }
        SharpRequest::ScoreAll => run(&state, Job::ScoreMovements, &JobParams::default()).await,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum MarketSignalRequest {
    Analyze {
        #[serde(default)]
        prices: Vec<BookPrice>,
    },
}

async fn market_signal_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    let MarketSignalRequest::Analyze { prices } = parse_body(&body)?;
    let scoring = state.effective_scoring().await?;
    // No usable quote yields `result: null`.
    respond("result", market_signal::evaluate(&prices, &scoring.signal))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum MatchupRequest {
    Analyze { input: MatchupInput },
    ScoreAll,
}

async fn matchup_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    match parse_body(&body)? {
        MatchupRequest::Analyze { input } => {
            let scoring = state.effective_scoring().await?;
            respond("result", matchup::score_prop(&input, &scoring.matchup))
        }
        MatchupRequest::ScoreAll => run(&state, Job::ScoreProps, &JobParams::default()).await,
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ArchetypeRequest {
    Classify {
        #[serde(default)]
        averages: PlayerAverages,
    },
    ClassifyAll,
}

async fn archetypes_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    match parse_body(&body)? {
        ArchetypeRequest::Classify { averages } => {
            let scoring = state.effective_scoring().await?;
            let archetype = archetype::classify(&averages, &scoring.archetype);
            respond(
                "result",
                serde_json::json!({
                    "archetype": archetype,
                    "primaryStats": archetype.primary_stats(),
                }),
            )
        }
        ArchetypeRequest::ClassifyAll => {
            run(&state, Job::ClassifyArchetypes, &JobParams::default()).await
        }
    }
}

async fn ingest_odds_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    let params: JobParams = parse_body(&body)?;
    run(&state, Job::IngestOdds, &params).await
}

async fn ingest_props_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    let params: JobParams = parse_body(&body)?;
    run(&state, Job::IngestProps, &params).await
}

async fn ingest_scoreboard_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let params: JobParams = parse_body(&body)?;
    run(&state, Job::IngestScoreboard, &params).await
}

#[derive(Debug, Deserialize)]
struct GameLogsRequest {
    sport: Sport,
    /// Empty: refresh every player already stored for the sport.
    #[serde(default)]
    players: Vec<PlayerRef>,
}

async fn ingest_game_logs_handler(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let req: GameLogsRequest = parse_body(&body)?;
    if !ingest::supports_game_logs(req.sport) {
        return Err(ApiError::BadRequest(format!(
            "Game logs are not available for {}",
            req.sport
        )));
    }

    if req.players.is_empty() {
        let params = JobParams {
            sports: Some(vec![req.sport]),
            days_back: None,
        };
        return run(&state, Job::IngestGameLogs, &params).await;
    }

    let report = jobs::record(
        &state.store,
        Job::IngestGameLogs,
        ingest::ingest_game_logs(&state, req.sport, &req.players),
    )
    .await?;
    respond("report", report)
}

async fn grade_props_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    let params: JobParams = parse_body(&body)?;
    run(&state, Job::GradeProps, &params).await
}

#[derive(Debug, Deserialize)]
struct WeightRequest {
    key: Option<String>,
    value: Option<f64>,
}

/// Upsert one weight override and return the effective scoring config.
/// An empty body only reads the config. Overrides that would leave the
/// weights inconsistent are refused before anything is stored.
async fn weights_handler(State(state): State<ApiState>, body: Bytes) -> ApiResult<Json<Value>> {
    let req: WeightRequest = parse_body(&body)?;

    match (req.key, req.value) {
        (None, None) => {}
        (Some(key), Some(value)) => {
            if !value.is_finite() {
                return Err(ApiError::BadRequest("Weight value must be finite".to_string()));
            }
            state
                .effective_scoring()
                .await?
                .with_override(&key, value)
                .map_err(ApiError::BadRequest)?;
            state
                .store
                .upsert_weight(&key, value, &timestamp(Utc::now()))
                .await?;
            info!(key = %key, value, "Scoring weight updated");
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Both key and value are required".to_string(),
            ))
        }
    }

    respond("weights", state.effective_scoring().await?)
}

#[derive(Debug, Deserialize)]
struct SharpScoresQuery {
    label: Option<String>,
}

async fn sharp_scores_handler(
    State(state): State<ApiState>,
    query: Result<Query<SharpScoresQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query?;
    let scores = state.store.get_sharp_scores(q.label.as_deref()).await?;
    respond("scores", scores)
}

#[derive(Debug, Deserialize)]
struct PropEdgesQuery {
    date: Option<String>,
}

async fn prop_edges_handler(
    State(state): State<ApiState>,
    query: Result<Query<PropEdgesQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query?;
    let edges = state.store.get_prop_edges(q.date.as_deref()).await?;
    respond("edges", edges)
}

#[derive(Debug, Deserialize)]
struct GamesQuery {
    sport: Sport,
}

async fn games_handler(
    State(state): State<ApiState>,
    query: Result<Query<GamesQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query?;
    let games = state.store.get_games(q.sport.as_str()).await?;
    respond("games", games)
}

#[derive(Debug, Deserialize)]
struct JobRunsQuery {
    limit: Option<i64>,
}

async fn job_runs_handler(
    State(state): State<ApiState>,
    query: Result<Query<JobRunsQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query?;
    let runs = state
        .store
        .get_recent_job_runs(q.limit.unwrap_or(50).clamp(1, 500))
        .await?;
    respond("runs", runs)
}
