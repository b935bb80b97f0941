//! The trust engine: exponentially-weighted score updates and snapshot
//! emission.
//!
//! Scores live in the registry; this engine computes what they should
//! become. Each round delta is folded in as
//! `new = α·clamp(old + delta, 0, 1) + (1-α)·old`, so a single round can
//! move a score by at most α regardless of how extreme the delta is,
//! while sustained behavior shifts the score at rate α per round.

use std::collections::{HashSet, VecDeque};

use attest_consensus::RoundOutcome;
use attest_registry::MinerRegistry;
use attest_types::{ClaimId, MinerId, Timestamp, ValidatorParams};

use crate::error::WeightError;
use crate::snapshot::{MinerWeight, WeightSnapshot};

/// Default capacity of the applied-round dedup set.
const APPLIED_ROUNDS_CAPACITY: usize = 8_192;

/// Bounded FIFO set of round ids whose deltas were already applied.
///
/// When full, the oldest entry is evicted; the capacity is far larger
/// than the number of rounds that can be in flight, so eviction never
/// re-opens a live round to double application.
struct AppliedRounds {
    set: HashSet<ClaimId>,
    order: VecDeque<ClaimId>,
    capacity: usize,
}

impl AppliedRounds {
    fn new(capacity: usize) -> Self {
        Self {
            set: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn contains(&self, id: &ClaimId) -> bool {
        self.set.contains(id)
    }

    fn insert(&mut self, id: ClaimId) {
        if self.set.contains(&id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        self.set.insert(id);
        self.order.push_back(id);
    }
}

/// One miner's score movement from an applied round.
#[derive(Clone, Debug)]
pub struct ScoreChange {
    pub miner: MinerId,
    pub old: f64,
    pub new: f64,
}

/// Applies round outcomes to the registry's score table and emits
/// normalized weight snapshots.
pub struct TrustEngine {
    alpha: f64,
    applied: AppliedRounds,
}

impl TrustEngine {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            applied: AppliedRounds::new(APPLIED_ROUNDS_CAPACITY),
        }
    }

    pub fn from_params(params: &ValidatorParams) -> Self {
        Self::new(params.trust_alpha)
    }

    fn smooth(&self, old: f64, delta: f64) -> f64 {
        let sample = (old + delta).clamp(0.0, 1.0);
        (self.alpha * sample + (1.0 - self.alpha) * old).clamp(0.0, 1.0)
    }

    /// Apply a settled round's deltas. Applying the same round twice is
    /// rejected; miners that left the registry mid-round are skipped.
    pub fn apply_round(
        &mut self,
        registry: &mut MinerRegistry,
        outcome: &RoundOutcome,
    ) -> Result<Vec<ScoreChange>, WeightError> {
        if self.applied.contains(&outcome.claim_id) {
            return Err(WeightError::RoundAlreadyApplied(outcome.claim_id));
        }

        let mut changes = Vec::with_capacity(outcome.deltas.len());
        for delta in &outcome.deltas {
            let Some(old) = registry.score(&delta.miner) else {
                tracing::warn!(
                    claim = %outcome.claim_id.short(),
                    miner = %delta.miner.short(),
                    "skipping delta for deregistered miner"
                );
                continue;
            };
            let new = self.smooth(old, delta.delta);
            registry.set_score(&delta.miner, new)?;
            changes.push(ScoreChange {
                miner: delta.miner,
                old,
                new,
            });
        }

        self.applied.insert(outcome.claim_id);
        Ok(changes)
    }

    /// Apply a one-off penalty for an attributable transport fault
    /// (forged nonce). Goes through the same smoothing as round deltas.
    pub fn apply_fault(
        &mut self,
        registry: &mut MinerRegistry,
        miner: &MinerId,
        penalty: f64,
    ) -> Result<f64, WeightError> {
        let old = registry
            .score(miner)
            .ok_or(attest_registry::RegistryError::UnknownMiner(*miner))?;
        let new = self.smooth(old, -penalty);
        registry.set_score(miner, new)?;
        Ok(new)
    }

    /// Emit a normalized snapshot over the currently active miners.
    ///
    /// Zero total score falls back to uniform weighting so reward
    /// distribution stays live even when every miner has been penalized
    /// to the floor; no active miners yields an empty snapshot.
    pub fn emit_snapshot(&self, registry: &MinerRegistry, now: Timestamp) -> WeightSnapshot {
        let active = registry.active_miners();
        if active.is_empty() {
            return WeightSnapshot {
                taken_at: now,
                weights: Vec::new(),
            };
        }

        let total: f64 = active.iter().map(|m| m.score).sum();
        let weights = if total > 0.0 {
            active
                .iter()
                .map(|m| MinerWeight {
                    miner: m.id,
                    weight: m.score / total,
                })
                .collect()
        } else {
            let uniform = 1.0 / active.len() as f64;
            active
                .iter()
                .map(|m| MinerWeight {
                    miner: m.id,
                    weight: uniform,
                })
                .collect()
        };

        WeightSnapshot {
            taken_at: now,
            weights,
        }
    }
}
