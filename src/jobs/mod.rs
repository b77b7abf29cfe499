//! ETL jobs. Each one fetches, normalizes, scores and upserts, then records a
//! `job_runs` row whether it succeeded or not.

pub mod ingest;
pub mod score;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, JobsConfig, Secrets};
use crate::data::HttpFetcher;
use crate::db::store::{JobRunRecord, Store};
use crate::db::timestamp;
use crate::scoring::ScoringConfig;
use crate::sport::Sport;

/// Everything a job needs. Shared by the CLI runner and the HTTP handlers.
pub struct JobContext {
    pub store: Arc<Store>,
    pub config: Arc<AppConfig>,
    pub secrets: Arc<Secrets>,
    pub fetcher: Arc<HttpFetcher>,
}

impl JobContext {
    pub fn new(store: Store, config: AppConfig, secrets: Secrets) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.http)?;
        Ok(Self {
            store: Arc::new(store),
            config: Arc::new(config),
            secrets: Arc::new(secrets),
            fetcher: Arc::new(fetcher),
        })
    }

    /// Configured scoring weights with `scoring_weights` rows applied on top.
    pub async fn effective_scoring(&self) -> Result<ScoringConfig> {
        let overrides = self.store.get_weights().await?;
        let (scoring, rejected) = self.config.scoring.with_overrides(&overrides);
        if !rejected.is_empty() {
            warn!(keys = ?rejected, "Unknown scoring weight keys ignored");
        }
        Ok(scoring)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    IngestOdds,
    IngestProps,
    IngestScoreboard,
    IngestGameLogs,
    ScoreMovements,
    ScoreProps,
    ClassifyArchetypes,
    GradeProps,
}

impl Job {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IngestOdds => "ingest_odds",
            Self::IngestProps => "ingest_props",
            Self::IngestScoreboard => "ingest_scoreboard",
            Self::IngestGameLogs => "ingest_game_logs",
            Self::ScoreMovements => "score_movements",
            Self::ScoreProps => "score_props",
            Self::ClassifyArchetypes => "classify_archetypes",
            Self::GradeProps => "grade_props",
        }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional knobs shared by the CLI and HTTP triggers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobParams {
    #[serde(default)]
    pub sports: Option<Vec<Sport>>,
    #[serde(default)]
    pub days_back: Option<u32>,
}

impl JobParams {
    /// Reject requests the configured limits do not allow.
    pub fn validate(&self, jobs: &JobsConfig) -> std::result::Result<(), String> {
        match self.days_back {
            Some(days) if days > jobs.max_days_back => Err(format!(
                "days_back must be at most {} (got {days})",
                jobs.max_days_back
            )),
            _ => Ok(()),
        }
    }
}

/// Summary of one job run, returned to callers and stored in `job_runs.details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobReport {
    pub job: String,
    /// Upstream items (events, games, players, rows) examined.
    pub fetched: usize,
    pub upserted: usize,
    /// Items dropped during normalization or with nothing to score.
    pub skipped: usize,
    /// Upstream calls or writes that failed and were passed over.
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl JobReport {
    pub fn new(job: Job) -> Self {
        Self {
            job: job.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Count a per-item failure and keep going.
    pub fn fail(&mut self, what: impl Into<String>, error: &anyhow::Error) {
        let what = what.into();
        warn!(job = %self.job, item = %what, error = %format!("{error:#}"), "Item failed, skipping");
        self.failed += 1;
        self.details.push(format!("{what}: {error:#}"));
    }
}

pub async fn run_job(ctx: &JobContext, job: Job, params: &JobParams) -> Result<JobReport> {
    record(&ctx.store, job, async {
        match job {
            Job::IngestOdds => ingest::ingest_odds(ctx, params).await,
            Job::IngestProps => ingest::ingest_props(ctx, params).await,
            Job::IngestScoreboard => ingest::ingest_scoreboard(ctx, params).await,
            Job::IngestGameLogs => ingest::refresh_game_logs(ctx, params).await,
            Job::ScoreMovements => score::score_movements(ctx).await,
            Job::ScoreProps => score::score_props(ctx).await,
            Job::ClassifyArchetypes => score::classify_archetypes(ctx).await,
            Job::GradeProps => score::grade_props(ctx).await,
        }
    })
    .await
}

/// Run `work` and write its outcome to `job_runs`. A failed history write is
/// logged but never masks the job's own result.
pub async fn record<F>(store: &Store, job: Job, work: F) -> Result<JobReport>
where
    F: Future<Output = Result<JobReport>>,
{
    let started_at = timestamp(Utc::now());
    info!(job = %job, "Job started");

    let result = work.await;

    let mut run = JobRunRecord {
        id: Uuid::new_v4().to_string(),
        job: job.as_str().to_string(),
        started_at,
        finished_at: timestamp(Utc::now()),
        success: result.is_ok(),
        rows_processed: 0,
        error: None,
        details: None,
    };

    match &result {
        Ok(report) => {
            run.rows_processed = report.upserted as i64;
            run.details = serde_json::to_string(report).ok();
            info!(
                job = %job,
                fetched = report.fetched,
                upserted = report.upserted,
                skipped = report.skipped,
                failed = report.failed,
                "Job finished"
            );
        }
        Err(e) => {
            run.error = Some(format!("{e:#}"));
            error!(job = %job, error = %format!("{e:#}"), "Job failed");
        }
    }

    if let Err(e) = store.insert_job_run(&run).await {
        warn!(job = %job, error = %e, "Failed to record job run");
    }

    result
}

/// Sports a job should cover: the explicit request, else the configured list.
pub(crate) fn requested_sports(params: &JobParams, configured: &[Sport]) -> Vec<Sport> {
    match &params.sports {
        Some(sports) if !sports.is_empty() => sports.clone(),
        _ => configured.to_vec(),
    }
}
