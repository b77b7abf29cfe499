//! Pure scoring functions. Nothing in here performs I/O; every engine takes
//! its weights explicitly.

pub mod archetype;
pub mod kelly;
pub mod market_signal;
pub mod matchup;
pub mod odds;
pub mod sharp;
pub mod weights;

pub use weights::ScoringConfig;
