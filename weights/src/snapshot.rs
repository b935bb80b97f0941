//! Normalized weight snapshots.

use serde::{Deserialize, Serialize};

use attest_types::{MinerId, Timestamp};

/// One miner's share of the reward weight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerWeight {
    pub miner: MinerId,
    pub weight: f64,
}

/// A point-in-time mapping of active miners to normalized weights.
///
/// Weights are non-negative and sum to 1.0 whenever at least one miner
/// is active; the snapshot is empty otherwise. Read-only to consumers —
/// the chain submitter formats it for on-chain delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub taken_at: Timestamp,
    pub weights: Vec<MinerWeight>,
}

impl WeightSnapshot {
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn weight_of(&self, miner: &MinerId) -> Option<f64> {
        self.weights
            .iter()
            .find(|w| w.miner == *miner)
            .map(|w| w.weight)
    }

    /// Invariant check: non-negative weights summing to 1.0 (within
    /// floating tolerance), or empty.
    pub fn is_normalized(&self) -> bool {
        if self.weights.is_empty() {
            return true;
        }
        self.weights.iter().all(|w| w.weight >= 0.0) && (self.total() - 1.0).abs() < 1e-9
    }
}
