//! Ingestion jobs: upstream feeds into `line_movements`, `prop_lines`,
//! `games`, `players` and `player_game_logs`.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::data::espn::{EspnClient, EspnEvent};
use crate::data::nhl::NhlClient;
use crate::data::odds_api::{prop_stat, OddsApiClient, OddsEvent};
use crate::data::{GameLogSource, PlayerRef};
use crate::db::store::{GameLogRecord, GameRecord, MovementRecord, PlayerRecord, PropLineRecord};
use crate::db::timestamp;
use crate::jobs::{requested_sports, Job, JobContext, JobParams, JobReport};
use crate::sport::Sport;

const GAME_LOG_SPORTS: [Sport; 2] = [Sport::Nba, Sport::Nhl];

fn odds_client(ctx: &JobContext) -> Result<OddsApiClient> {
    let key = ctx
        .secrets
        .odds_api_key
        .as_deref()
        .context("ODDS_API_KEY is not set")?;
    Ok(OddsApiClient::new(ctx.fetcher.clone(), &ctx.config.odds_api, key))
}

pub async fn ingest_odds(ctx: &JobContext, params: &JobParams) -> Result<JobReport> {
    let client = odds_client(ctx)?;
    let mut report = JobReport::new(Job::IngestOdds);
    let now = timestamp(Utc::now());

    for sport in requested_sports(params, &ctx.config.odds_api.sports) {
        let events = match client.fetch_odds(sport).await {
            Ok(events) => events,
            Err(e) => {
                report.fail(format!("{sport} odds"), &e);
                continue;
            }
        };
        report.fetched += events.len();

        let mut rows = 0usize;
        for event in &events {
            for record in movement_records(sport, event, &now) {
                match ctx.store.upsert_movement(&record).await {
                    Ok(()) => rows += 1,
                    Err(e) => report.fail(format!("movement {}", record.event_id), &e),
                }
            }
        }
        report.upserted += rows;
        info!(sport = %sport, events = events.len(), rows, "Odds ingested");
    }

    Ok(report)
}

/// Flatten an event's bookmaker quotes into one row per (book, market, outcome).
/// Opening and current values are equal here; the upsert keeps the stored opening.
pub fn movement_records(sport: Sport, event: &OddsEvent, now: &str) -> Vec<MovementRecord> {
    let commence_time = timestamp(event.commence_time);
    let mut rows = Vec::new();

    for book in &event.bookmakers {
        for market in &book.markets {
            for outcome in &market.outcomes {
                let Some(price) = american_price(outcome.price) else {
                    continue;
                };
                let point = outcome.point.filter(|p| p.is_finite());
                rows.push(MovementRecord {
                    sport: sport.as_str().to_string(),
                    event_id: event.id.clone(),
                    commence_time: commence_time.clone(),
                    home_team: event.home_team.clone(),
                    away_team: event.away_team.clone(),
                    bookmaker: book.key.clone(),
                    market: market.key.clone(),
                    outcome: outcome.name.clone(),
                    opening_price: price,
                    opening_point: point,
                    current_price: price,
                    current_point: point,
                    first_seen_at: now.to_string(),
                    updated_at: now.to_string(),
                });
            }
        }
    }

    rows
}

fn american_price(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    let rounded = price.round() as i64;
    // American odds live outside (-100, 100) except for the even-money +100/-100.
    (rounded.abs() >= 100).then_some(rounded)
}

pub async fn ingest_props(ctx: &JobContext, params: &JobParams) -> Result<JobReport> {
    let client = odds_client(ctx)?;
    let mut report = JobReport::new(Job::IngestProps);
    let now = Utc::now();
    let now_ts = timestamp(now);

    for sport in requested_sports(params, &ctx.config.odds_api.sports) {
        let events = match client.fetch_events(sport).await {
            Ok(events) => events,
            Err(e) => {
                report.fail(format!("{sport} events"), &e);
                continue;
            }
        };
        let upcoming: Vec<&OddsEvent> = events.iter().filter(|e| e.commence_time > now).collect();
        report.skipped += events.len() - upcoming.len();

        let batches: Vec<&[&OddsEvent]> = upcoming.chunks(ctx.fetcher.batch_size()).collect();
        for (i, batch) in batches.iter().enumerate() {
            if i > 0 {
                ctx.fetcher.pause_between_batches().await;
            }
            for event in batch.iter() {
                let priced = match client.fetch_event_props(sport, &event.id).await {
                    Ok(priced) => priced,
                    Err(e) => {
                        report.fail(format!("props {}", event.id), &e);
                        continue;
                    }
                };
                report.fetched += 1;

                for record in prop_records(sport, &priced, &now_ts) {
                    match ctx.store.upsert_prop_line(&record).await {
                        Ok(()) => report.upserted += 1,
                        Err(e) => report.fail(format!("prop {}", record.player_name), &e),
                    }
                }
            }
        }
        info!(sport = %sport, events = upcoming.len(), "Props ingested");
    }

    Ok(report)
}

/// Pair Over/Under quotes into one row per (book, player, stat).
///
/// When a book posts the two sides at different points, the first side seen
/// sets the line and the mismatched side is dropped.
pub fn prop_records(sport: Sport, event: &OddsEvent, now: &str) -> Vec<PropLineRecord> {
    let commence_time = timestamp(event.commence_time);
    let mut rows: Vec<PropLineRecord> = Vec::new();
    let mut index: HashMap<(String, String, &'static str), usize> = HashMap::new();

    for book in &event.bookmakers {
        for market in &book.markets {
            let Some(stat) = prop_stat(&market.key) else {
                continue;
            };
            for outcome in &market.outcomes {
                let (Some(player), Some(line)) = (
                    outcome.description.as_deref().map(str::trim).filter(|p| !p.is_empty()),
                    outcome.point.filter(|p| p.is_finite()),
                ) else {
                    continue;
                };
                let price = american_price(outcome.price);
                let is_over = outcome.name.eq_ignore_ascii_case("over");
                if !is_over && !outcome.name.eq_ignore_ascii_case("under") {
                    continue;
                }

                let key = (book.key.clone(), player.to_string(), stat);
                let idx = *index.entry(key).or_insert_with(|| {
                    rows.push(PropLineRecord {
                        sport: sport.as_str().to_string(),
                        event_id: event.id.clone(),
                        commence_time: commence_time.clone(),
                        home_team: event.home_team.clone(),
                        away_team: event.away_team.clone(),
                        bookmaker: book.key.clone(),
                        player_name: player.to_string(),
                        stat: stat.to_string(),
                        line,
                        over_price: None,
                        under_price: None,
                        updated_at: now.to_string(),
                    });
                    rows.len() - 1
                });

                let row = &mut rows[idx];
                if row.line != line {
                    debug!(player, stat, book = %book.key, "Mismatched prop points, side dropped");
                    continue;
                }
                if is_over {
                    row.over_price = price;
                } else {
                    row.under_price = price;
                }
            }
        }
    }

    rows
}

pub async fn ingest_scoreboard(ctx: &JobContext, params: &JobParams) -> Result<JobReport> {
    let client = EspnClient::new(ctx.fetcher.clone(), &ctx.config.espn);
    let mut report = JobReport::new(Job::IngestScoreboard);
    let days_back = params.days_back.unwrap_or(ctx.config.jobs.default_days_back);
    let today = Utc::now().date_naive();
    let now = timestamp(Utc::now());

    for sport in requested_sports(params, &ctx.config.espn.sports) {
        for offset in 0..=days_back {
            let date = today - Duration::days(i64::from(offset));
            if offset > 0 {
                ctx.fetcher.pause_between_batches().await;
            }

            let events = match client.fetch_scoreboard(sport, date).await {
                Ok(events) => events,
                Err(e) => {
                    report.fail(format!("{sport} scoreboard {date}"), &e);
                    continue;
                }
            };
            report.fetched += events.len();

            for event in &events {
                let Some(game) = game_record(sport, event, &now) else {
                    report.skipped += 1;
                    continue;
                };
                match ctx.store.upsert_game(&game).await {
                    Ok(()) => report.upserted += 1,
                    Err(e) => report.fail(format!("game {}", game.event_id), &e),
                }
            }
            info!(sport = %sport, date = %date, games = events.len(), "Scoreboard ingested");
        }
    }

    Ok(report)
}

pub fn game_record(sport: Sport, event: &EspnEvent, now: &str) -> Option<GameRecord> {
    let home = event.competitor("home")?;
    let away = event.competitor("away")?;
    let start = parse_espn_time(&event.date)?;
    let status = event.status();

    Some(GameRecord {
        event_id: event.id.clone(),
        sport: sport.as_str().to_string(),
        name: event.name.clone(),
        start_time: timestamp(start),
        status: status.map(|s| s.description.clone()).unwrap_or_default(),
        completed: status.is_some_and(|s| s.completed),
        home_team: home.team.display_name.clone(),
        away_team: away.team.display_name.clone(),
        home_score: home.score_value(),
        away_score: away.score_value(),
        updated_at: now.to_string(),
    })
}

/// ESPN scoreboard dates omit seconds (`2024-01-15T00:30Z`).
pub fn parse_espn_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

fn game_log_source(ctx: &JobContext, sport: Sport) -> Option<Box<dyn GameLogSource>> {
    match sport {
        Sport::Nba => Some(Box::new(EspnClient::new(ctx.fetcher.clone(), &ctx.config.espn))),
        Sport::Nhl => Some(Box::new(NhlClient::new(ctx.fetcher.clone(), &ctx.config.nhl))),
        _ => None,
    }
}

pub fn supports_game_logs(sport: Sport) -> bool {
    GAME_LOG_SPORTS.contains(&sport)
}

/// Pull game logs for an explicit player list.
pub async fn ingest_game_logs(
    ctx: &JobContext,
    sport: Sport,
    players: &[PlayerRef],
) -> Result<JobReport> {
    let mut report = JobReport::new(Job::IngestGameLogs);
    load_game_logs(ctx, sport, players, &mut report).await?;
    Ok(report)
}

/// Re-pull game logs for every player already known in `players`.
pub async fn refresh_game_logs(ctx: &JobContext, params: &JobParams) -> Result<JobReport> {
    let mut report = JobReport::new(Job::IngestGameLogs);
    for sport in requested_sports(params, &GAME_LOG_SPORTS) {
        if !supports_game_logs(sport) {
            report.skipped += 1;
            continue;
        }
        let players: Vec<PlayerRef> = ctx
            .store
            .get_players(sport.as_str())
            .await?
            .into_iter()
            .map(|p| PlayerRef {
                id: p.player_id,
                name: p.name,
                team: p.team,
            })
            .collect();
        load_game_logs(ctx, sport, &players, &mut report).await?;
    }
    Ok(report)
}

async fn load_game_logs(
    ctx: &JobContext,
    sport: Sport,
    players: &[PlayerRef],
    report: &mut JobReport,
) -> Result<()> {
    let source = game_log_source(ctx, sport)
        .with_context(|| format!("No game log source for {sport}"))?;
    // Rows are filed under the league the source serves.
    let sport = source.sport();
    debug!(source = source.name(), %sport, players = players.len(), "Loading game logs");
    let now = timestamp(Utc::now());

    for (i, batch) in players.chunks(ctx.fetcher.batch_size()).enumerate() {
        if i > 0 {
            ctx.fetcher.pause_between_batches().await;
        }
        for player in batch {
            let player_row = PlayerRecord {
                sport: sport.as_str().to_string(),
                player_id: player.id.clone(),
                name: player.name.clone(),
                team: player.team.clone(),
                updated_at: now.clone(),
            };
            if let Err(e) = ctx.store.upsert_player(&player_row).await {
                report.fail(format!("player {}", player.name), &e);
                continue;
            }

            let games = match source.game_log(&player.id).await {
                Ok(games) => games,
                Err(e) => {
                    report.fail(format!("{} log for {}", source.name(), player.name), &e);
                    continue;
                }
            };
            report.fetched += 1;

            let mut rows = 0usize;
            for game in &games {
                for &(stat, value) in &game.stats {
                    let log = GameLogRecord {
                        sport: sport.as_str().to_string(),
                        player_id: player.id.clone(),
                        player_name: player.name.clone(),
                        game_id: game.game_id.clone(),
                        game_date: game.date.format("%Y-%m-%d").to_string(),
                        opponent: game.opponent.clone(),
                        is_home: game.is_home,
                        stat: stat.to_string(),
                        value,
                    };
                    match ctx.store.upsert_game_log(&log).await {
                        Ok(()) => rows += 1,
                        Err(e) => report.fail(format!("log {} {}", player.name, game.game_id), &e),
                    }
                }
            }
            report.upserted += rows;
            debug!(player = %player.name, games = games.len(), rows, "Game log stored");
        }
    }

    info!(sport = %sport, players = players.len(), "Game logs ingested");
    Ok(())
}
