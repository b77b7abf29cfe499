use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::sport::team_matches;

pub struct Store {
    pool: SqlitePool,
}

// --- Row types ---

/// One priced line at one book. Opening price/point are kept from the first
/// observation; current values follow the latest fetch.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MovementRecord {
    pub sport: String,
    pub event_id: String,
    pub commence_time: String,
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub market: String,
    pub outcome: String,
    pub opening_price: i64,
    pub opening_point: Option<f64>,
    pub current_price: i64,
    pub current_point: Option<f64>,
    pub first_seen_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SharpScoreRecord {
    pub event_id: String,
    pub market: String,
    pub outcome: String,
    pub sport: String,
    pub commence_time: String,
    pub ses: f64,
    pub sharp_pct: f64,
    pub sharp_pressure: f64,
    pub trap_pressure: f64,
    pub label: String,
    pub recommendation: String,
    pub price_change: f64,
    pub line_change: f64,
    pub books_count: i64,
    pub total_books: i64,
    pub hours_to_game: Option<f64>,
    pub current_price: i64,
    pub opening_price: i64,
    pub fair_probability: Option<String>,
    pub edge: Option<String>,
    pub juice_tier: Option<String>,
    pub signal: Option<String>,
    pub scored_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PropLineRecord {
    pub sport: String,
    pub event_id: String,
    pub commence_time: String,
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub player_name: String,
    pub stat: String,
    pub line: f64,
    pub over_price: Option<i64>,
    pub under_price: Option<i64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GameRecord {
    pub event_id: String,
    pub sport: String,
    pub name: String,
    pub start_time: String,
    pub status: String,
    pub completed: bool,
    pub home_team: String,
    pub away_team: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlayerRecord {
    pub sport: String,
    pub player_id: String,
    pub name: String,
    pub team: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GameLogRecord {
    pub sport: String,
    pub player_id: String,
    pub player_name: String,
    pub game_id: String,
    /// `YYYY-MM-DD`
    pub game_date: String,
    pub opponent: String,
    pub is_home: bool,
    pub stat: String,
    pub value: f64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PropEdgeRecord {
    pub sport: String,
    pub player_name: String,
    pub stat: String,
    pub game_date: String,
    pub event_id: String,
    pub line: f64,
    pub median: f64,
    pub adjusted_median: f64,
    pub edge: f64,
    pub edge_pct: f64,
    pub hit_rate: f64,
    pub sample_size: i64,
    pub opponent: Option<String>,
    pub defense_rank: Option<i64>,
    pub confidence: f64,
    pub recommendation: String,
    pub result: Option<String>,
    pub scored_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArchetypeRecord {
    pub sport: String,
    pub player_id: String,
    pub player_name: String,
    pub archetype: String,
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threes: f64,
    pub minutes: f64,
    pub games: i64,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRunRecord {
    pub id: String,
    pub job: String,
    pub started_at: String,
    pub finished_at: String,
    pub success: bool,
    pub rows_processed: i64,
    pub error: Option<String>,
    pub details: Option<String>,
}

/// Stat value credited against an opponent, for defense rankings.
#[derive(Debug, Clone, FromRow)]
pub struct OpponentStatRow {
    pub opponent: String,
    pub game_id: String,
    pub value: f64,
}

impl Store {
    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to :memory: is its own database, so keep exactly one alive.
        let pool_options = if database_path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // sqlx executes one statement per call
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- Line movements ---

    pub async fn upsert_movement(&self, m: &MovementRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO line_movements (sport, event_id, commence_time, home_team, away_team, bookmaker, market, outcome,
                 opening_price, opening_point, current_price, current_point, first_seen_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id, bookmaker, market, outcome) DO UPDATE SET
                 commence_time = excluded.commence_time,
                 current_price = excluded.current_price,
                 current_point = excluded.current_point,
                 updated_at = excluded.updated_at",
        )
        .bind(&m.sport)
        .bind(&m.event_id)
        .bind(&m.commence_time)
        .bind(&m.home_team)
        .bind(&m.away_team)
        .bind(&m.bookmaker)
        .bind(&m.market)
        .bind(&m.outcome)
        .bind(m.opening_price)
        .bind(m.opening_point)
        .bind(m.current_price)
        .bind(m.current_point)
        .bind(&m.first_seen_at)
        .bind(&m.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert line movement")?;
        Ok(())
    }

    /// Movements for events starting after `after` (RFC3339), grouped order.
    pub async fn upcoming_movements(&self, after: &str) -> Result<Vec<MovementRecord>> {
        let rows = sqlx::query_as::<_, MovementRecord>(
            "SELECT sport, event_id, commence_time, home_team, away_team, bookmaker, market, outcome,
                    opening_price, opening_point, current_price, current_point, first_seen_at, updated_at
             FROM line_movements
             WHERE commence_time > ?
             ORDER BY event_id, market, outcome, bookmaker",
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch upcoming movements")?;
        Ok(rows)
    }

    // --- Sharp scores ---

    pub async fn upsert_sharp_score(&self, s: &SharpScoreRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO sharp_scores (event_id, market, outcome, sport, commence_time, ses, sharp_pct, sharp_pressure,
                 trap_pressure, label, recommendation, price_change, line_change, books_count, total_books,
                 hours_to_game, current_price, opening_price, fair_probability, edge, juice_tier, signal, scored_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id, market, outcome) DO UPDATE SET
                 commence_time = excluded.commence_time,
                 ses = excluded.ses,
                 sharp_pct = excluded.sharp_pct,
                 sharp_pressure = excluded.sharp_pressure,
                 trap_pressure = excluded.trap_pressure,
                 label = excluded.label,
                 recommendation = excluded.recommendation,
                 price_change = excluded.price_change,
                 line_change = excluded.line_change,
                 books_count = excluded.books_count,
                 total_books = excluded.total_books,
                 hours_to_game = excluded.hours_to_game,
                 current_price = excluded.current_price,
                 opening_price = excluded.opening_price,
                 fair_probability = excluded.fair_probability,
                 edge = excluded.edge,
                 juice_tier = excluded.juice_tier,
                 signal = excluded.signal,
                 scored_at = excluded.scored_at",
        )
        .bind(&s.event_id)
        .bind(&s.market)
        .bind(&s.outcome)
        .bind(&s.sport)
        .bind(&s.commence_time)
        .bind(s.ses)
        .bind(s.sharp_pct)
        .bind(s.sharp_pressure)
        .bind(s.trap_pressure)
        .bind(&s.label)
        .bind(&s.recommendation)
        .bind(s.price_change)
        .bind(s.line_change)
        .bind(s.books_count)
        .bind(s.total_books)
        .bind(s.hours_to_game)
        .bind(s.current_price)
        .bind(s.opening_price)
        .bind(&s.fair_probability)
        .bind(&s.edge)
        .bind(&s.juice_tier)
        .bind(&s.signal)
        .bind(&s.scored_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert sharp score")?;
        Ok(())
    }

    pub async fn get_sharp_scores(&self, label: Option<&str>) -> Result<Vec<SharpScoreRecord>> {
        let rows = sqlx::query_as::<_, SharpScoreRecord>(
            "SELECT * FROM sharp_scores WHERE (? IS NULL OR label = ?) ORDER BY ses DESC",
        )
        .bind(label)
        .bind(label)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch sharp scores")?;
        Ok(rows)
    }

    // --- Prop lines ---

    pub async fn upsert_prop_line(&self, p: &PropLineRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO prop_lines (sport, event_id, commence_time, home_team, away_team, bookmaker, player_name, stat,
                 line, over_price, under_price, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id, bookmaker, player_name, stat) DO UPDATE SET
                 commence_time = excluded.commence_time,
                 line = excluded.line,
                 over_price = excluded.over_price,
                 under_price = excluded.under_price,
                 updated_at = excluded.updated_at",
        )
        .bind(&p.sport)
        .bind(&p.event_id)
        .bind(&p.commence_time)
        .bind(&p.home_team)
        .bind(&p.away_team)
        .bind(&p.bookmaker)
        .bind(&p.player_name)
        .bind(&p.stat)
        .bind(p.line)
        .bind(p.over_price)
        .bind(p.under_price)
        .bind(&p.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert prop line")?;
        Ok(())
    }

    pub async fn upcoming_prop_lines(&self, after: &str) -> Result<Vec<PropLineRecord>> {
        let rows = sqlx::query_as::<_, PropLineRecord>(
            "SELECT sport, event_id, commence_time, home_team, away_team, bookmaker, player_name, stat,
                    line, over_price, under_price, updated_at
             FROM prop_lines
             WHERE commence_time > ?
             ORDER BY event_id, player_name, stat, bookmaker",
        )
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch upcoming prop lines")?;
        Ok(rows)
    }

    // --- Games ---

    pub async fn upsert_game(&self, g: &GameRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO games (event_id, sport, name, start_time, status, completed, home_team, away_team,
                 home_score, away_score, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(event_id) DO UPDATE SET
                 start_time = excluded.start_time,
                 status = excluded.status,
                 completed = excluded.completed,
                 home_score = excluded.home_score,
                 away_score = excluded.away_score,
                 updated_at = excluded.updated_at",
        )
        .bind(&g.event_id)
        .bind(&g.sport)
        .bind(&g.name)
        .bind(&g.start_time)
        .bind(&g.status)
        .bind(g.completed)
        .bind(&g.home_team)
        .bind(&g.away_team)
        .bind(g.home_score)
        .bind(g.away_score)
        .bind(&g.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert game")?;
        Ok(())
    }

    pub async fn get_games(&self, sport: &str) -> Result<Vec<GameRecord>> {
        let rows = sqlx::query_as::<_, GameRecord>(
            "SELECT * FROM games WHERE sport = ? ORDER BY start_time",
        )
        .bind(sport)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch games")?;
        Ok(rows)
    }

    // --- Players and game logs ---

    pub async fn upsert_player(&self, p: &PlayerRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO players (sport, player_id, name, team, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(sport, player_id) DO UPDATE SET
                 name = excluded.name,
                 team = excluded.team,
                 updated_at = excluded.updated_at",
        )
        .bind(&p.sport)
        .bind(&p.player_id)
        .bind(&p.name)
        .bind(&p.team)
        .bind(&p.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert player")?;
        Ok(())
    }

    pub async fn get_players(&self, sport: &str) -> Result<Vec<PlayerRecord>> {
        let rows = sqlx::query_as::<_, PlayerRecord>(
            "SELECT * FROM players WHERE sport = ? ORDER BY name",
        )
        .bind(sport)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch players")?;
        Ok(rows)
    }

    pub async fn find_player_by_name(&self, sport: &str, name: &str) -> Result<Option<PlayerRecord>> {
        let row = sqlx::query_as::<_, PlayerRecord>(
            "SELECT * FROM players WHERE sport = ? AND name = ? COLLATE NOCASE LIMIT 1",
        )
        .bind(sport)
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up player")?;
        Ok(row)
    }

    pub async fn upsert_game_log(&self, g: &GameLogRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO player_game_logs (sport, player_id, player_name, game_id, game_date, opponent, is_home, stat, value)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sport, player_id, game_id, stat) DO UPDATE SET
                 player_name = excluded.player_name,
                 game_date = excluded.game_date,
                 opponent = excluded.opponent,
                 is_home = excluded.is_home,
                 value = excluded.value",
        )
        .bind(&g.sport)
        .bind(&g.player_id)
        .bind(&g.player_name)
        .bind(&g.game_id)
        .bind(&g.game_date)
        .bind(&g.opponent)
        .bind(g.is_home)
        .bind(&g.stat)
        .bind(g.value)
        .execute(&self.pool)
        .await
        .context("Failed to upsert game log")?;
        Ok(())
    }

    /// Most recent values of `stat` strictly before `before_date`, newest first.
    pub async fn recent_stat_values(
        &self,
        sport: &str,
        player_id: &str,
        stat: &str,
        before_date: &str,
        limit: i64,
    ) -> Result<Vec<f64>> {
        let rows: Vec<(f64,)> = sqlx::query_as(
            "SELECT value FROM player_game_logs
             WHERE sport = ? AND player_id = ? AND stat = ? AND game_date < ?
             ORDER BY game_date DESC
             LIMIT ?",
        )
        .bind(sport)
        .bind(player_id)
        .bind(stat)
        .bind(before_date)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent stat values")?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }

    /// Rows of `player_id`'s most recent `games` games (all stats).
    pub async fn recent_game_logs(
        &self,
        sport: &str,
        player_id: &str,
        games: i64,
    ) -> Result<Vec<GameLogRecord>> {
        let rows = sqlx::query_as::<_, GameLogRecord>(
            "SELECT sport, player_id, player_name, game_id, game_date, opponent, is_home, stat, value
             FROM player_game_logs
             WHERE sport = ? AND player_id = ? AND game_id IN (
                 SELECT game_id FROM player_game_logs
                 WHERE sport = ? AND player_id = ?
                 GROUP BY game_id
                 ORDER BY MAX(game_date) DESC
                 LIMIT ?
             )
             ORDER BY game_date DESC",
        )
        .bind(sport)
        .bind(player_id)
        .bind(sport)
        .bind(player_id)
        .bind(games)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent game logs")?;
        Ok(rows)
    }

    pub async fn opponent_stat_rows(&self, sport: &str, stat: &str) -> Result<Vec<OpponentStatRow>> {
        let rows = sqlx::query_as::<_, OpponentStatRow>(
            "SELECT opponent, game_id, value FROM player_game_logs WHERE sport = ? AND stat = ?",
        )
        .bind(sport)
        .bind(stat)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch opponent stat rows")?;
        Ok(rows)
    }

    /// Value of `stat` for the player's game dated within a day of `date`.
    ///
    /// Provider dates can sit a day off the prop's UTC date, so the window is
    /// three days wide. When `opponent` is known only games against that team
    /// count; otherwise the window must hold a single game. Two candidates at
    /// the same distance from `date` are ambiguous and yield `None`.
    pub async fn stat_near_date(
        &self,
        sport: &str,
        player_name: &str,
        stat: &str,
        date: &str,
        opponent: Option<&str>,
    ) -> Result<Option<f64>> {
        let rows: Vec<(f64, String, f64)> = sqlx::query_as(
            "SELECT ABS(julianday(game_date) - julianday(?)) AS distance, opponent, value
             FROM player_game_logs
             WHERE sport = ? AND player_name = ? COLLATE NOCASE AND stat = ?
               AND game_date BETWEEN date(?, '-1 day') AND date(?, '+1 day')
             ORDER BY distance ASC, game_date ASC",
        )
        .bind(date)
        .bind(sport)
        .bind(player_name)
        .bind(stat)
        .bind(date)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch stat near date")?;

        let candidates: Vec<(f64, f64)> = rows
            .into_iter()
            .filter(|(_, opp, _)| opponent.map_or(true, |o| team_matches(o, opp)))
            .map(|(distance, _, value)| (distance, value))
            .collect();

        let picked = match (opponent, candidates.as_slice()) {
            (_, [(_, value)]) => Some(*value),
            (Some(_), [(nearest, value), (next, _), ..]) if nearest < next => Some(*value),
            _ => None,
        };
        Ok(picked)
    }

    // --- Prop edges ---

    /// Upsert a scored prop. A previously graded `result` is left untouched.
    pub async fn upsert_prop_edge(&self, e: &PropEdgeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO prop_edges (sport, player_name, stat, game_date, event_id, line, median, adjusted_median,
                 edge, edge_pct, hit_rate, sample_size, opponent, defense_rank, confidence, recommendation, result, scored_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sport, player_name, stat, game_date) DO UPDATE SET
                 event_id = excluded.event_id,
                 line = excluded.line,
                 median = excluded.median,
                 adjusted_median = excluded.adjusted_median,
                 edge = excluded.edge,
                 edge_pct = excluded.edge_pct,
                 hit_rate = excluded.hit_rate,
                 sample_size = excluded.sample_size,
                 opponent = excluded.opponent,
                 defense_rank = excluded.defense_rank,
                 confidence = excluded.confidence,
                 recommendation = excluded.recommendation,
                 scored_at = excluded.scored_at",
        )
        .bind(&e.sport)
        .bind(&e.player_name)
        .bind(&e.stat)
        .bind(&e.game_date)
        .bind(&e.event_id)
        .bind(e.line)
        .bind(e.median)
        .bind(e.adjusted_median)
        .bind(e.edge)
        .bind(e.edge_pct)
        .bind(e.hit_rate)
        .bind(e.sample_size)
        .bind(&e.opponent)
        .bind(e.defense_rank)
        .bind(e.confidence)
        .bind(&e.recommendation)
        .bind(&e.result)
        .bind(&e.scored_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert prop edge")?;
        Ok(())
    }

    /// Picks (not PASS) without a result, for games dated before `before_date`.
    pub async fn ungraded_prop_edges(&self, before_date: &str) -> Result<Vec<PropEdgeRecord>> {
        let rows = sqlx::query_as::<_, PropEdgeRecord>(
            "SELECT * FROM prop_edges
             WHERE result IS NULL AND recommendation != 'PASS' AND game_date < ?
             ORDER BY game_date",
        )
        .bind(before_date)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch ungraded prop edges")?;
        Ok(rows)
    }

    pub async fn set_prop_result(
        &self,
        sport: &str,
        player_name: &str,
        stat: &str,
        game_date: &str,
        result: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE prop_edges SET result = ?
             WHERE sport = ? AND player_name = ? AND stat = ? AND game_date = ?",
        )
        .bind(result)
        .bind(sport)
        .bind(player_name)
        .bind(stat)
        .bind(game_date)
        .execute(&self.pool)
        .await
        .context("Failed to set prop result")?;
        Ok(())
    }

    pub async fn get_prop_edges(&self, game_date: Option<&str>) -> Result<Vec<PropEdgeRecord>> {
        let rows = sqlx::query_as::<_, PropEdgeRecord>(
            "SELECT * FROM prop_edges WHERE (? IS NULL OR game_date = ?) ORDER BY confidence DESC",
        )
        .bind(game_date)
        .bind(game_date)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch prop edges")?;
        Ok(rows)
    }

    // --- Archetypes ---

    pub async fn upsert_archetype(&self, a: &ArchetypeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO player_archetypes (sport, player_id, player_name, archetype, points, rebounds, assists,
                 threes, minutes, games, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(sport, player_id) DO UPDATE SET
                 player_name = excluded.player_name,
                 archetype = excluded.archetype,
                 points = excluded.points,
                 rebounds = excluded.rebounds,
                 assists = excluded.assists,
                 threes = excluded.threes,
                 minutes = excluded.minutes,
                 games = excluded.games,
                 updated_at = excluded.updated_at",
        )
        .bind(&a.sport)
        .bind(&a.player_id)
        .bind(&a.player_name)
        .bind(&a.archetype)
        .bind(a.points)
        .bind(a.rebounds)
        .bind(a.assists)
        .bind(a.threes)
        .bind(a.minutes)
        .bind(a.games)
        .bind(&a.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert archetype")?;
        Ok(())
    }

    pub async fn get_archetype(&self, sport: &str, player_id: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT archetype FROM player_archetypes WHERE sport = ? AND player_id = ?",
        )
        .bind(sport)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch archetype")?;
        Ok(row.map(|r| r.0))
    }

    // --- Scoring weights ---

    /// Stored overrides in write order, the order they were validated in.
    pub async fn get_weights(&self) -> Result<Vec<(String, f64)>> {
        let rows: Vec<(String, f64)> =
            sqlx::query_as("SELECT key, value FROM scoring_weights ORDER BY updated_at, key")
                .fetch_all(&self.pool)
                .await
                .context("Failed to fetch scoring weights")?;
        Ok(rows)
    }

    pub async fn upsert_weight(&self, key: &str, value: f64, updated_at: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO scoring_weights (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert scoring weight")?;
        Ok(())
    }

    // --- Job history ---

    pub async fn insert_job_run(&self, run: &JobRunRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_runs (id, job, started_at, finished_at, success, rows_processed, error, details)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&run.id)
        .bind(&run.job)
        .bind(&run.started_at)
        .bind(&run.finished_at)
        .bind(run.success)
        .bind(run.rows_processed)
        .bind(&run.error)
        .bind(&run.details)
        .execute(&self.pool)
        .await
        .context("Failed to insert job run")?;
        Ok(())
    }

    pub async fn get_recent_job_runs(&self, limit: i64) -> Result<Vec<JobRunRecord>> {
        let rows = sqlx::query_as::<_, JobRunRecord>(
            "SELECT * FROM job_runs ORDER BY finished_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch job runs")?;
        Ok(rows)
    }

    pub async fn count_rows(&self, table: Table) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table.name()))
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {}", table.name()))?;
        Ok(row.0)
    }
}

/// Tables that can be counted, kept closed so no caller-supplied text reaches SQL.
#[derive(Debug, Clone, Copy)]
pub enum Table {
    LineMovements,
    SharpScores,
    PropLines,
    Games,
    Players,
    PlayerGameLogs,
    PropEdges,
    PlayerArchetypes,
    JobRuns,
}

impl Table {
    fn name(self) -> &'static str {
        match self {
            Self::LineMovements => "line_movements",
            Self::SharpScores => "sharp_scores",
            Self::PropLines => "prop_lines",
            Self::Games => "games",
            Self::Players => "players",
            Self::PlayerGameLogs => "player_game_logs",
            Self::PropEdges => "prop_edges",
            Self::PlayerArchetypes => "player_archetypes",
            Self::JobRuns => "job_runs",
        }
    }
}
