//! Scoring jobs: read stored rows, run the pure engines, upsert results.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::db::store::{ArchetypeRecord, MovementRecord, PropEdgeRecord, PropLineRecord, SharpScoreRecord};
use crate::db::timestamp;
use crate::jobs::{Job, JobContext, JobReport};
use crate::scoring::archetype::{self, Archetype, PlayerAverages};
use crate::scoring::market_signal::{self, BookPrice};
use crate::scoring::matchup::{self, MatchupInput, OpponentSample};
use crate::scoring::sharp::{self, MovementInput};
use crate::sport::{team_matches, Sport};

// === Line movements ===

/// Book-level rows for one (event, market, outcome) reduced to engine inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementAggregate {
    pub price_change: f64,
    pub line_change: f64,
    pub books_count: usize,
    pub total_books: usize,
    pub hours_to_game: Option<f64>,
    pub current_price: i64,
    pub opening_price: i64,
}

impl MovementAggregate {
    pub fn to_input(&self) -> MovementInput {
        MovementInput {
            price_change: Some(self.price_change),
            line_change: Some(self.line_change),
            hours_to_game: self.hours_to_game,
            books_count: Some(self.books_count as f64),
            total_books: Some(self.total_books as f64),
            current_price: Some(self.current_price as f64),
            opening_price: Some(self.opening_price as f64),
            public_pct: None,
        }
    }
}

/// Signed line move in favour of `m.outcome`.
pub fn line_move(m: &MovementRecord) -> f64 {
    let (Some(open), Some(cur)) = (m.opening_point, m.current_point) else {
        return 0.0;
    };
    match m.market.as_str() {
        "spreads" => open - cur,
        "totals" if m.outcome.eq_ignore_ascii_case("over") => cur - open,
        "totals" => open - cur,
        _ => 0.0,
    }
}

pub fn aggregate(members: &[&MovementRecord], now: DateTime<Utc>) -> Option<MovementAggregate> {
    let first = members.first()?;
    let n = members.len() as f64;

    let price_deltas: Vec<f64> = members
        .iter()
        .map(|m| crate::scoring::odds::price_delta(m.opening_price as f64, m.current_price as f64))
        .collect();
    let price_change = price_deltas.iter().sum::<f64>() / n;
    let line_change = members.iter().map(|m| line_move(m)).sum::<f64>() / n;
    let books_count = price_deltas.iter().filter(|d| **d > 0.0).count();

    let hours_to_game = DateTime::parse_from_rfc3339(&first.commence_time)
        .ok()
        .map(|start| (start.with_timezone(&Utc) - now).num_seconds() as f64 / 3600.0);

    let mean_price = |f: fn(&MovementRecord) -> i64| -> i64 {
        (members.iter().map(|m| f(m) as f64).sum::<f64>() / n).round() as i64
    };

    Some(MovementAggregate {
        price_change,
        line_change,
        books_count,
        total_books: members.len(),
        hours_to_game,
        current_price: mean_price(|m| m.current_price),
        opening_price: mean_price(|m| m.opening_price),
    })
}

type GroupKey<'a> = (&'a str, &'a str, &'a str);

pub async fn score_movements(ctx: &JobContext) -> Result<JobReport> {
    let scoring = ctx.effective_scoring().await?;
    let mut report = JobReport::new(Job::ScoreMovements);
    let now = Utc::now();
    let scored_at = timestamp(now);

    let rows = ctx.store.upcoming_movements(&scored_at).await?;
    report.fetched = rows.len();

    let mut groups: BTreeMap<GroupKey, Vec<&MovementRecord>> = BTreeMap::new();
    // (event, market, book) -> quotes at that book, for the opposite side's price
    let mut by_book: HashMap<GroupKey, Vec<&MovementRecord>> = HashMap::new();
    for row in &rows {
        groups
            .entry((row.event_id.as_str(), row.market.as_str(), row.outcome.as_str()))
            .or_default()
            .push(row);
        by_book
            .entry((row.event_id.as_str(), row.market.as_str(), row.bookmaker.as_str()))
            .or_default()
            .push(row);
    }

    for ((event_id, market, outcome), members) in &groups {
        let Some(agg) = aggregate(members, now) else {
            report.skipped += 1;
            continue;
        };
        let result = sharp::score_movement(&agg.to_input(), &scoring.sharp);

        let prices: Vec<BookPrice> = members
            .iter()
            .map(|m| BookPrice {
                book: m.bookmaker.clone(),
                price: m.current_price,
                opposite_price: opposite_price(&by_book, m),
            })
            .collect();
        let signal = market_signal::evaluate(&prices, &scoring.signal);

        let first = members[0];
        let record = SharpScoreRecord {
            event_id: event_id.to_string(),
            market: market.to_string(),
            outcome: outcome.to_string(),
            sport: first.sport.clone(),
            commence_time: first.commence_time.clone(),
            ses: result.ses,
            sharp_pct: result.sharp_pct,
            sharp_pressure: result.sharp_pressure,
            trap_pressure: result.trap_pressure,
            label: result.label.to_string(),
            recommendation: result.recommendation.to_string(),
            price_change: agg.price_change,
            line_change: agg.line_change,
            books_count: agg.books_count as i64,
            total_books: agg.total_books as i64,
            hours_to_game: agg.hours_to_game,
            current_price: agg.current_price,
            opening_price: agg.opening_price,
            fair_probability: signal.as_ref().map(|s| s.fair_probability.to_string()),
            edge: signal.as_ref().map(|s| s.edge.to_string()),
            juice_tier: signal.as_ref().map(|s| s.juice_tier.to_string()),
            signal: signal.as_ref().map(|s| s.signal.to_string()),
            scored_at: scored_at.clone(),
        };

        match ctx.store.upsert_sharp_score(&record).await {
            Ok(()) => report.upserted += 1,
            Err(e) => report.fail(format!("score {event_id}/{market}/{outcome}"), &e),
        }
    }

    info!(groups = groups.len(), upserted = report.upserted, "Movements scored");
    Ok(report)
}

/// Current price of the other side at the same book, for two-way markets only.
fn opposite_price(
    by_book: &HashMap<GroupKey, Vec<&MovementRecord>>,
    m: &MovementRecord,
) -> Option<i64> {
    let quotes = by_book.get(&(m.event_id.as_str(), m.market.as_str(), m.bookmaker.as_str()))?;
    let mut others = quotes.iter().filter(|q| q.outcome != m.outcome);
    match (others.next(), others.next()) {
        (Some(other), None) => Some(other.current_price),
        _ => None,
    }
}

// === Player props ===

/// Median line across books, the typical consensus for a prop.
pub fn consensus_line(lines: &[&PropLineRecord]) -> Option<f64> {
    let values: Vec<f64> = lines.iter().map(|l| l.line).collect();
    matchup::median(&values)
}

/// Opponent and home flag for a player on `team`, from the event's two sides.
pub fn opponent_for(team: &str, home_team: &str, away_team: &str) -> (Option<String>, Option<bool>) {
    if team_matches(home_team, team) {
        (Some(away_team.to_string()), Some(true))
    } else if team_matches(away_team, team) {
        (Some(home_team.to_string()), Some(false))
    } else {
        (None, None)
    }
}

fn lookup_rank(ranks: &HashMap<String, u32>, opponent: &str) -> Option<u32> {
    if let Some(rank) = ranks.get(opponent) {
        return Some(*rank);
    }
    // A loose match only counts when it is unique.
    let mut found = ranks.iter().filter(|(team, _)| team_matches(opponent, team));
    match (found.next(), found.next()) {
        (Some((_, rank)), None) => Some(*rank),
        _ => None,
    }
}

pub async fn score_props(ctx: &JobContext) -> Result<JobReport> {
    let scoring = ctx.effective_scoring().await?;
    let mut report = JobReport::new(Job::ScoreProps);
    let now = Utc::now();
    let scored_at = timestamp(now);

    let lines = ctx.store.upcoming_prop_lines(&scored_at).await?;
    report.fetched = lines.len();

    let mut groups: BTreeMap<(&str, &str, &str, &str), Vec<&PropLineRecord>> = BTreeMap::new();
    for line in &lines {
        groups
            .entry((
                line.sport.as_str(),
                line.event_id.as_str(),
                line.player_name.as_str(),
                line.stat.as_str(),
            ))
            .or_default()
            .push(line);
    }

    let mut rank_cache: HashMap<(Sport, String), HashMap<String, u32>> = HashMap::new();
    let sample = scoring.matchup.sample_size.max(1.0) as i64;

    for ((sport_key, event_id, player_name, stat), members) in &groups {
        let Some(sport) = Sport::parse(sport_key) else {
            report.skipped += 1;
            continue;
        };
        let Some(line) = consensus_line(members) else {
            report.skipped += 1;
            continue;
        };
        let Some(player) = ctx.store.find_player_by_name(sport.as_str(), player_name).await? else {
            debug!(player = %player_name, "No game log history for prop player");
            report.skipped += 1;
            continue;
        };

        let first = members[0];
        let game_date = first.commence_time.get(..10).unwrap_or_default().to_string();
        let values = ctx
            .store
            .recent_stat_values(sport.as_str(), &player.player_id, stat, &game_date, sample)
            .await?;

        let (opponent, is_home) = opponent_for(&player.team, &first.home_team, &first.away_team);

        let cache_key = (sport, stat.to_string());
        if !rank_cache.contains_key(&cache_key) {
            let samples: Vec<OpponentSample> = ctx
                .store
                .opponent_stat_rows(sport.as_str(), stat)
                .await?
                .into_iter()
                .map(|r| OpponentSample {
                    opponent: r.opponent,
                    game_id: r.game_id,
                    value: r.value,
                })
                .collect();
            rank_cache.insert(cache_key.clone(), matchup::defense_ranks(&samples));
        }
        let opponent_rank = opponent
            .as_deref()
            .and_then(|o| rank_cache.get(&cache_key).and_then(|ranks| lookup_rank(ranks, o)));

        let archetype = ctx
            .store
            .get_archetype(sport.as_str(), &player.player_id)
            .await?
            .as_deref()
            .and_then(Archetype::parse);

        let input = MatchupInput {
            values,
            line,
            stat: Some(stat.to_string()),
            opponent_rank,
            team_count: Some(sport.team_count()),
            is_home,
            archetype,
        };
        let result = matchup::score_prop(&input, &scoring.matchup);

        let record = PropEdgeRecord {
            sport: sport.as_str().to_string(),
            player_name: player_name.to_string(),
            stat: stat.to_string(),
            game_date,
            event_id: event_id.to_string(),
            line,
            median: result.median,
            adjusted_median: result.adjusted_median,
            edge: result.edge,
            edge_pct: result.edge_pct,
            hit_rate: result.hit_rate,
            sample_size: result.sample_size as i64,
            opponent,
            defense_rank: opponent_rank.map(i64::from),
            confidence: result.confidence,
            recommendation: result.recommendation.to_string(),
            result: None,
            scored_at: scored_at.clone(),
        };
        match ctx.store.upsert_prop_edge(&record).await {
            Ok(()) => report.upserted += 1,
            Err(e) => report.fail(format!("prop edge {player_name} {stat}"), &e),
        }
    }

    info!(props = groups.len(), upserted = report.upserted, "Props scored");
    Ok(report)
}

// === Archetypes ===

pub async fn classify_archetypes(ctx: &JobContext) -> Result<JobReport> {
    let scoring = ctx.effective_scoring().await?;
    let mut report = JobReport::new(Job::ClassifyArchetypes);
    let now = timestamp(Utc::now());
    let games = i64::from(ctx.config.jobs.archetype_games.max(1));
    let sport = Sport::Nba.as_str();

    let players = ctx.store.get_players(sport).await?;
    report.fetched = players.len();

    for player in &players {
        let logs = ctx.store.recent_game_logs(sport, &player.player_id, games).await?;
        let rows = logs
            .iter()
            .map(|l| (l.game_id.as_str(), l.stat.as_str(), l.value));
        let Some((averages, played)) = averages_from_logs(rows) else {
            report.skipped += 1;
            continue;
        };
        let archetype = archetype::classify(&averages, &scoring.archetype);

        let record = ArchetypeRecord {
            sport: sport.to_string(),
            player_id: player.player_id.clone(),
            player_name: player.name.clone(),
            archetype: archetype.to_string(),
            points: averages.points,
            rebounds: averages.rebounds,
            assists: averages.assists,
            threes: averages.threes,
            minutes: averages.minutes,
            games: played as i64,
            updated_at: now.clone(),
        };
        match ctx.store.upsert_archetype(&record).await {
            Ok(()) => report.upserted += 1,
            Err(e) => report.fail(format!("archetype {}", player.name), &e),
        }
    }

    info!(players = players.len(), upserted = report.upserted, "Archetypes classified");
    Ok(report)
}

/// Per-game averages from `(game_id, stat, value)` rows. `None` without games.
pub fn averages_from_logs<'a>(
    rows: impl Iterator<Item = (&'a str, &'a str, f64)>,
) -> Option<(PlayerAverages, usize)> {
    let mut games = std::collections::HashSet::new();
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for (game_id, stat, value) in rows {
        games.insert(game_id);
        if value.is_finite() {
            *totals.entry(stat).or_default() += value;
        }
    }
    if games.is_empty() {
        return None;
    }
    let n = games.len() as f64;
    let avg = |stat: &str| totals.get(stat).copied().unwrap_or(0.0) / n;

    Some((
        PlayerAverages {
            points: avg("points"),
            rebounds: avg("rebounds"),
            assists: avg("assists"),
            threes: avg("threes"),
            minutes: avg("minutes"),
        },
        games.len(),
    ))
}

// === Grading ===

/// WIN / LOSS / PUSH for a settled pick; `None` for PASS or unknown picks.
pub fn grade(recommendation: &str, line: f64, actual: f64) -> Option<&'static str> {
    let over = match recommendation {
        "OVER" => true,
        "UNDER" => false,
        _ => return None,
    };
    Some(if actual == line {
        "PUSH"
    } else if (actual > line) == over {
        "WIN"
    } else {
        "LOSS"
    })
}

pub async fn grade_props(ctx: &JobContext) -> Result<JobReport> {
    let mut report = JobReport::new(Job::GradeProps);
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();

    let pending = ctx.store.ungraded_prop_edges(&today).await?;
    report.fetched = pending.len();

    for edge in &pending {
        let actual = ctx
            .store
            .stat_near_date(
                &edge.sport,
                &edge.player_name,
                &edge.stat,
                &edge.game_date,
                edge.opponent.as_deref(),
            )
            .await?;
        let Some(result) = actual.and_then(|a| grade(&edge.recommendation, edge.line, a)) else {
            report.skipped += 1;
            continue;
        };
        match ctx
            .store
            .set_prop_result(&edge.sport, &edge.player_name, &edge.stat, &edge.game_date, result)
            .await
        {
            Ok(()) => report.upserted += 1,
            Err(e) => report.fail(format!("grade {} {}", edge.player_name, edge.stat), &e),
        }
    }

    info!(pending = pending.len(), graded = report.upserted, "Props graded");
    Ok(report)
}
