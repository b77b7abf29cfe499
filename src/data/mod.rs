//! Upstream HTTP clients.
//!
//! Every request goes through [`HttpFetcher`], which applies the shared rate
//! limit, per-request timeout and linear retry policy.

pub mod espn;
pub mod nhl;
pub mod odds_api;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::sport::Sport;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Client errors are final; server errors and transport failures
    /// (including timeouts) are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => {
                !status.is_client_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FetchError::Transport(e) => !e.is_decode(),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Arc<Limiter>,
    max_retries: u32,
    retry_delay: Duration,
    batch_size: usize,
    batch_delay: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("sharp-signals/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            limiter: create_rate_limiter(config),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Sleep between two batches of upstream calls.
    pub async fn pause_between_batches(&self) {
        if !self.batch_delay.is_zero() {
            tokio::time::sleep(self.batch_delay).await;
        }
    }

    /// GET `url` and decode the JSON body, retrying transient failures.
    ///
    /// `label` names the call in logs and errors; `url` is never logged
    /// because query strings may carry an API key.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        label: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut attempt = 0u32;

        loop {
            match self.get_once(url, query).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() {
                        return Err(anyhow::Error::new(e)
                            .context(format!("{label}: non-retryable failure")));
                    }
                    if attempt > self.max_retries {
                        return Err(anyhow::Error::new(e)
                            .context(format!("{label}: failed after {} retries", self.max_retries)));
                    }

                    let backoff = self.retry_delay * attempt;
                    warn!(
                        call = label,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, FetchError> {
        self.limiter.until_ready().await;

        let resp = self.client.get(url).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                body: truncate(&body, 200),
            });
        }

        if let Some(remaining) = resp
            .headers()
            .get("x-requests-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(remaining, "Upstream quota");
        }

        Ok(resp.json::<T>().await?)
    }
}

fn create_rate_limiter(config: &HttpConfig) -> Arc<Limiter> {
    let rps = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);

    let quota = Quota::per_second(rps).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// A player to pull game logs for, keyed by the provider's athlete id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub team: String,
}

/// One game from a player's log, already reduced to named numeric stats.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerGame {
    pub game_id: String,
    pub date: NaiveDate,
    pub opponent: String,
    pub is_home: bool,
    pub stats: Vec<(&'static str, f64)>,
}

/// Per-sport provider of player game logs.
#[async_trait]
pub trait GameLogSource: Send + Sync {
    /// Full game log for the current season, in provider order.
    async fn game_log(&self, player_id: &str) -> Result<Vec<PlayerGame>>;

    fn sport(&self) -> Sport;

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}
