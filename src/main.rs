use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use sharp_signals::api;
use sharp_signals::config::AppConfig;
use sharp_signals::db::Store;
use sharp_signals::jobs::{self, Job, JobContext, JobParams};
use sharp_signals::monitoring::logger;
use sharp_signals::sport::Sport;

#[derive(Debug, Parser)]
#[command(name = "sharp-signals", version, about = "Sharp money and player prop signal engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,
    /// Run one job to completion and print its report, for cron triggers.
    Run {
        #[arg(value_enum)]
        job: Job,
        /// Days of scoreboards to pull, counting back from today.
        #[arg(long)]
        days_back: Option<u32>,
        /// Restrict to a sport; repeatable.
        #[arg(long = "sport", value_parser = parse_sport)]
        sports: Vec<Sport>,
    },
}

fn parse_sport(s: &str) -> Result<Sport, String> {
    Sport::parse(s).ok_or_else(|| format!("unknown sport: {s}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load()?;

    logger::init_logging(&config.monitoring)?;

    tracing::info!(
        database = %config.database.path,
        odds_api_key = secrets.odds_api_key.is_some(),
        "sharp-signals starting"
    );

    let store = Store::new(&config.database.path).await?;
    let bind = config.server.bind.clone();
    let port = config.server.port;
    let ctx = Arc::new(JobContext::new(store, config, secrets)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve(ctx, &bind, port).await,
        Command::Run {
            job,
            days_back,
            sports,
        } => {
            let params = JobParams {
                sports: (!sports.is_empty()).then_some(sports),
                days_back,
            };
            params
                .validate(&ctx.config.jobs)
                .map_err(anyhow::Error::msg)?;
            let report = jobs::run_job(&ctx, job, &params).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
