//! Response aggregator — fan-in point for all verification responses.
//!
//! Owns the table of live rounds, admits verified responses as they
//! arrive, finalizes on quorum, expires on deadline, and hands each
//! settled round's outcome to the trust engine exactly once. Events are
//! buffered and drained by the node loop, the same way the rest of the
//! system surfaces state changes.

use std::collections::HashMap;

use attest_messages::Evidence;
use attest_types::{Claim, ClaimId, MinerId, Timestamp, ValidatorParams};

use crate::error::ConsensusError;
use crate::round::{AdmittedResponse, ConsensusRound, RoundPhase, Verdict};
use crate::scoring::{round_deltas, MinerDelta};
use crate::verdict::AgreementRule;

/// Events emitted by the aggregator for the node to process.
#[derive(Clone, Debug)]
pub enum RoundEvent {
    /// Quorum reached — verdict fixed.
    Finalized { claim_id: ClaimId, verdict: Verdict },
    /// Deadline elapsed without quorum.
    Expired { claim_id: ClaimId },
    /// Deltas computed; the round is finished and removed.
    Settled { claim_id: ClaimId },
}

/// The terminal result of one round, consumed by the trust engine.
#[derive(Clone, Debug)]
pub struct RoundOutcome {
    pub claim_id: ClaimId,
    pub opened_at: Timestamp,
    /// True when the round finalized with a verdict, false when it
    /// expired (quorum unreachable).
    pub finalized: bool,
    pub verdict: Option<Verdict>,
    pub deltas: Vec<MinerDelta>,
}

/// Collects responses across all live rounds and resolves them.
pub struct ResponseAggregator {
    rounds: HashMap<ClaimId, ConsensusRound>,
    rule: Box<dyn AgreementRule>,
    params: ValidatorParams,
    pending_events: Vec<RoundEvent>,
}

impl ResponseAggregator {
    pub fn new(params: ValidatorParams, rule: Box<dyn AgreementRule>) -> Self {
        Self {
            rounds: HashMap::new(),
            rule,
            params,
            pending_events: Vec::new(),
        }
    }

    /// Open a round for a dispatched claim.
    pub fn open_round(
        &mut self,
        claim: Claim,
        dispatched: Vec<MinerId>,
        now: Timestamp,
    ) -> Result<(), ConsensusError> {
        let claim_id = claim.id;
        if self.rounds.contains_key(&claim_id) {
            return Err(ConsensusError::DuplicateRound(claim_id));
        }
        tracing::debug!(
            claim = %claim_id.short(),
            miners = dispatched.len(),
            rule = self.rule.name(),
            "round opened"
        );
        self.rounds
            .insert(claim_id, ConsensusRound::new(claim, dispatched, now));
        Ok(())
    }

    pub fn round(&self, claim_id: &ClaimId) -> Option<&ConsensusRound> {
        self.rounds.get(claim_id)
    }

    pub fn live_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Admit a transport-verified response into its round.
    ///
    /// Returns the verdict when this admission completed the quorum.
    pub fn admit(
        &mut self,
        claim_id: ClaimId,
        miner: MinerId,
        evidence: Vec<Evidence>,
        confidence: f64,
        now: Timestamp,
    ) -> Result<Option<Verdict>, ConsensusError> {
        let round = self
            .rounds
            .get_mut(&claim_id)
            .ok_or(ConsensusError::UnknownRound(claim_id))?;

        let bucket = self.rule.bucket(&round.claim, &evidence, confidence);
        let latency_ms = round.opened_at().elapsed_since(now);
        round.admit(AdmittedResponse {
            miner,
            evidence,
            confidence,
            latency_ms,
            bucket,
        })?;

        if round.phase() != RoundPhase::Open {
            // Straggler into a finalized round: admitted for scoring,
            // verdict untouched.
            return Ok(None);
        }

        match round.try_finalize()? {
            Some(verdict) => {
                let verdict = verdict.clone();
                tracing::info!(
                    claim = %claim_id.short(),
                    supporters = verdict.supporters.len(),
                    confidence = verdict.mean_confidence,
                    "round finalized"
                );
                self.pending_events.push(RoundEvent::Finalized {
                    claim_id,
                    verdict: verdict.clone(),
                });
                Ok(Some(verdict))
            }
            None => Ok(None),
        }
    }

    /// Record a transport timeout for a dispatched miner.
    pub fn note_timeout(
        &mut self,
        claim_id: ClaimId,
        miner: MinerId,
    ) -> Result<(), ConsensusError> {
        let round = self
            .rounds
            .get_mut(&claim_id)
            .ok_or(ConsensusError::UnknownRound(claim_id))?;
        round.note_timeout(miner)
    }

    /// Record an attributable transport fault for a dispatched miner
    /// (penalty applied by the caller at admission time).
    pub fn note_fault(&mut self, claim_id: ClaimId, miner: MinerId) -> Result<(), ConsensusError> {
        let round = self
            .rounds
            .get_mut(&claim_id)
            .ok_or(ConsensusError::UnknownRound(claim_id))?;
        round.note_fault(miner)
    }

    /// Resolve every round that is due: expire open rounds past their
    /// deadline, then settle terminal rounds whose deadline passed or
    /// whose dispatch set is fully resolved. Settled rounds are removed
    /// and their outcomes returned for the trust engine.
    pub fn settle_due(&mut self, now: Timestamp) -> Vec<RoundOutcome> {
        let due: Vec<ClaimId> = self
            .rounds
            .iter()
            .filter(|(_, round)| {
                if round.deadline_passed(now) {
                    return true;
                }
                round.is_terminal() && round.all_resolved()
            })
            .map(|(id, _)| *id)
            .collect();

        let mut outcomes = Vec::with_capacity(due.len());
        for claim_id in due {
            let mut round = self
                .rounds
                .remove(&claim_id)
                .expect("round present under held key");

            if !round.is_terminal() {
                round
                    .expire()
                    .expect("open round can always expire");
                tracing::warn!(claim = %claim_id.short(), "round expired without quorum");
                self.pending_events.push(RoundEvent::Expired { claim_id });
            }

            let deltas = round_deltas(&round, &self.params);
            round.mark_settled();
            self.pending_events.push(RoundEvent::Settled { claim_id });

            outcomes.push(RoundOutcome {
                claim_id,
                opened_at: round.opened_at(),
                finalized: round.phase() == RoundPhase::Finalized,
                verdict: round.verdict().cloned(),
                deltas,
            });
        }
        outcomes
    }

    /// Drain pending events for the node to process.
    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        std::mem::take(&mut self.pending_events)
    }
}
