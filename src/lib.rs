//! Sports-betting signal engine: upstream odds and stat ingestion, sharp and
//! matchup scoring, and the JSON API that serves the results.

pub mod api;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod jobs;
pub mod monitoring;
pub mod scoring;
pub mod sport;
