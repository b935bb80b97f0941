//! Trust/weight engine.
//!
//! Converts settled round outcomes into smoothed per-miner trust scores
//! (written back through the registry, the single owner of the score
//! table) and emits normalized weight snapshots for the chain-submission
//! collaborator.

pub mod engine;
pub mod error;
pub mod snapshot;

pub use engine::{ScoreChange, TrustEngine};
pub use error::WeightError;
pub use snapshot::{MinerWeight, WeightSnapshot};
