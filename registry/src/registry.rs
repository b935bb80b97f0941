//! Miner membership, trust scores, staleness, and dispatch selection.

use std::collections::{HashMap, HashSet};

use rand::Rng;

use attest_messages::MinerEndpoint;
use attest_types::{MinerId, Timestamp, ValidatorParams};

use crate::error::RegistryError;

/// Score assigned to a newly discovered miner. Neutral: neither favored
/// nor starved by selection.
pub const INITIAL_SCORE: f64 = 0.5;

// ---------------------------------------------------------------------------
// Miner record
// ---------------------------------------------------------------------------

/// Per-miner metadata tracked by the [`MinerRegistry`].
#[derive(Clone, Debug)]
pub struct MinerRecord {
    pub id: MinerId,
    /// `"ip:port"` the miner serves verification requests on.
    pub address: String,
    /// Registration stake as reported by the discovery feed.
    pub stake: u64,
    /// Trust score, clamped to [0,1] on every update.
    pub score: f64,
    /// Last valid reply or discovery sighting.
    pub last_seen: Timestamp,
    /// Inactive miners are excluded from selection but keep their score.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The single owned table of known miners, keyed by identity.
pub struct MinerRegistry {
    miners: HashMap<MinerId, MinerRecord>,
    /// Floor on effective selection weight.
    selection_floor: f64,
    /// Miners unseen for longer than this are marked inactive.
    stale_after_ms: u64,
}

impl MinerRegistry {
    pub fn new(selection_floor: f64, stale_after_ms: u64) -> Self {
        Self {
            miners: HashMap::new(),
            selection_floor,
            stale_after_ms,
        }
    }

    pub fn from_params(params: &ValidatorParams) -> Self {
        Self::new(params.selection_floor, params.stale_after_ms)
    }

    pub fn len(&self) -> usize {
        self.miners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.miners.is_empty()
    }

    pub fn get(&self, id: &MinerId) -> Option<&MinerRecord> {
        self.miners.get(id)
    }

    /// Current trust score, if the miner is known.
    pub fn score(&self, id: &MinerId) -> Option<f64> {
        self.miners.get(id).map(|m| m.score)
    }

    /// All currently active miners.
    pub fn active_miners(&self) -> Vec<&MinerRecord> {
        self.miners.values().filter(|m| m.active).collect()
    }

    pub fn active_count(&self) -> usize {
        self.miners.values().filter(|m| m.active).count()
    }

    // -- Membership ---------------------------------------------------------

    /// Reconcile membership against the periodic discovery feed.
    ///
    /// Discovered miners are upserted (address and stake refreshed, new
    /// miners start at [`INITIAL_SCORE`]) and marked seen. Miners unseen
    /// past the staleness threshold are marked inactive; their score is
    /// retained so a returning miner resumes its history.
    pub fn reconcile(&mut self, discovered: &[MinerEndpoint], now: Timestamp) {
        for endpoint in discovered {
            match self.miners.get_mut(&endpoint.id) {
                Some(record) => {
                    record.address = endpoint.address.clone();
                    record.stake = endpoint.stake;
                    record.last_seen = now;
                    record.active = true;
                }
                None => {
                    tracing::debug!(miner = %endpoint.id.short(), address = %endpoint.address, "discovered miner");
                    self.miners.insert(
                        endpoint.id,
                        MinerRecord {
                            id: endpoint.id,
                            address: endpoint.address.clone(),
                            stake: endpoint.stake,
                            score: INITIAL_SCORE,
                            last_seen: now,
                            active: true,
                        },
                    );
                }
            }
        }

        for record in self.miners.values_mut() {
            if record.active && record.last_seen.elapsed_since(now) > self.stale_after_ms {
                tracing::info!(miner = %record.id.short(), "miner marked inactive (stale)");
                record.active = false;
            }
        }
    }

    /// Refresh a miner's last-seen timestamp after a valid reply.
    pub fn mark_seen(&mut self, id: &MinerId, now: Timestamp) -> Result<(), RegistryError> {
        let record = self
            .miners
            .get_mut(id)
            .ok_or(RegistryError::UnknownMiner(*id))?;
        record.last_seen = now;
        record.active = true;
        Ok(())
    }

    // -- Scores -------------------------------------------------------------

    /// Apply a bounded score delta; the result is clamped to [0,1].
    pub fn update_score(&mut self, id: &MinerId, delta: f64) -> Result<f64, RegistryError> {
        let record = self
            .miners
            .get_mut(id)
            .ok_or(RegistryError::UnknownMiner(*id))?;
        record.score = (record.score + delta).clamp(0.0, 1.0);
        Ok(record.score)
    }

    /// Overwrite a miner's score (clamped). Used by the trust engine to
    /// write back smoothed values.
    pub fn set_score(&mut self, id: &MinerId, score: f64) -> Result<f64, RegistryError> {
        let record = self
            .miners
            .get_mut(id)
            .ok_or(RegistryError::UnknownMiner(*id))?;
        record.score = score.clamp(0.0, 1.0);
        Ok(record.score)
    }

    // -- Selection ----------------------------------------------------------

    /// Select up to `n` distinct active miners by weighted random
    /// sampling without replacement.
    ///
    /// Each candidate's effective weight is `max(score, floor)`: the
    /// floor keeps low-trust miners selectable (a blacklisted miner can
    /// recover) and keeps the dispatch set unpredictable to any single
    /// adversary. Returns fewer than `n` records when the eligible pool
    /// is smaller.
    pub fn select(&self, n: usize, excluding: &HashSet<MinerId>) -> Vec<MinerRecord> {
        self.select_with_rng(n, excluding, &mut rand::thread_rng())
    }

    /// [`select`](Self::select) with a caller-supplied RNG, for
    /// deterministic tests.
    pub fn select_with_rng<R: Rng>(
        &self,
        n: usize,
        excluding: &HashSet<MinerId>,
        rng: &mut R,
    ) -> Vec<MinerRecord> {
        let mut candidates: Vec<&MinerRecord> = self
            .miners
            .values()
            .filter(|m| m.active && !excluding.contains(&m.id))
            .collect();

        let mut selected = Vec::with_capacity(n.min(candidates.len()));
        while selected.len() < n && !candidates.is_empty() {
            let total: f64 = candidates
                .iter()
                .map(|m| m.score.max(self.selection_floor))
                .sum();
            let mut roll = rng.gen::<f64>() * total;
            let mut chosen = candidates.len() - 1;
            for (i, candidate) in candidates.iter().enumerate() {
                roll -= candidate.score.max(self.selection_floor);
                if roll <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            selected.push(candidates.swap_remove(chosen).clone());
        }
        selected
    }
}
