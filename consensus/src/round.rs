//! The consensus round state machine.
//!
//! `Open → Finalized | Expired`, exactly one terminal transition. The
//! verdict is fixed the moment quorum is reached and never changes; the
//! round then stays admissible for stragglers until it settles, so a
//! correct-but-slow response can still be scored against the fixed
//! verdict.

use std::collections::HashMap;

use attest_messages::Evidence;
use attest_types::{Claim, MinerId, Timestamp};

use crate::error::ConsensusError;
use crate::verdict::Bucket;

/// Lifecycle phase of a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accumulating responses, no verdict yet.
    Open,
    /// Quorum reached — verdict fixed.
    Finalized,
    /// Deadline elapsed without quorum.
    Expired,
}

/// A response accepted into a round.
#[derive(Clone, Debug)]
pub struct AdmittedResponse {
    pub miner: MinerId,
    pub evidence: Vec<Evidence>,
    pub confidence: f64,
    /// Milliseconds between round open and admission.
    pub latency_ms: u64,
    /// Agreement bucket assigned at admission.
    pub bucket: Bucket,
}

/// The verdict of a finalized round: the winning bucket and who
/// supported it at finalization time.
#[derive(Clone, Debug)]
pub struct Verdict {
    pub bucket: Bucket,
    /// Evidence payload of the earliest supporting response.
    pub evidence: Vec<Evidence>,
    /// Miners in the winning bucket when quorum was reached.
    pub supporters: Vec<MinerId>,
    /// Mean miner-reported confidence across the supporters.
    pub mean_confidence: f64,
}

/// One claim's bounded verification lifecycle.
#[derive(Clone, Debug)]
pub struct ConsensusRound {
    pub claim: Claim,
    /// Miners a request was issued to, in dispatch order.
    pub dispatched: Vec<MinerId>,
    opened_at: Timestamp,
    phase: RoundPhase,
    responses: Vec<AdmittedResponse>,
    /// Miners resolved as no-response by the transport.
    timeouts: Vec<MinerId>,
    /// Miners resolved by an attributable transport fault. Their penalty
    /// is applied at admission time; settling adds nothing on top.
    faults: Vec<MinerId>,
    verdict: Option<Verdict>,
    settled: bool,
}

impl ConsensusRound {
    pub fn new(claim: Claim, dispatched: Vec<MinerId>, opened_at: Timestamp) -> Self {
        Self {
            claim,
            dispatched,
            opened_at,
            phase: RoundPhase::Open,
            responses: Vec::new(),
            timeouts: Vec::new(),
            faults: Vec::new(),
            verdict: None,
            settled: false,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        self.verdict.as_ref()
    }

    pub fn responses(&self) -> &[AdmittedResponse] {
        &self.responses
    }

    pub fn timeouts(&self) -> &[MinerId] {
        &self.timeouts
    }

    pub fn faults(&self) -> &[MinerId] {
        &self.faults
    }

    /// Whether a terminal phase has been reached.
    pub fn is_terminal(&self) -> bool {
        self.phase != RoundPhase::Open
    }

    /// Whether deltas for this round have been computed.
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Whether every dispatched miner has either responded or timed out.
    pub fn all_resolved(&self) -> bool {
        self.responses.len() + self.timeouts.len() + self.faults.len() >= self.dispatched.len()
    }

    pub fn deadline_passed(&self, now: Timestamp) -> bool {
        self.claim.deadline.is_past(now)
    }

    fn is_resolved(&self, miner: &MinerId) -> bool {
        self.responses.iter().any(|r| r.miner == *miner)
            || self.timeouts.iter().any(|m| m == miner)
            || self.faults.iter().any(|m| m == miner)
    }

    /// Admit a verified response.
    ///
    /// Allowed while the round is `Open`, and after `Finalized` up to
    /// settling (stragglers score against the fixed verdict). An
    /// `Expired` round no longer admits anything.
    pub fn admit(&mut self, response: AdmittedResponse) -> Result<(), ConsensusError> {
        if self.phase == RoundPhase::Expired || self.settled {
            return Err(ConsensusError::RoundClosed(self.claim.id));
        }
        if !self.dispatched.contains(&response.miner) {
            return Err(ConsensusError::NotDispatched {
                claim: self.claim.id,
                miner: response.miner,
            });
        }
        if self.is_resolved(&response.miner) {
            return Err(ConsensusError::DuplicateResponse {
                claim: self.claim.id,
                miner: response.miner,
            });
        }
        self.responses.push(response);
        Ok(())
    }

    /// Record that a dispatched miner's request timed out.
    pub fn note_timeout(&mut self, miner: MinerId) -> Result<(), ConsensusError> {
        if self.settled {
            return Err(ConsensusError::RoundClosed(self.claim.id));
        }
        if !self.dispatched.contains(&miner) {
            return Err(ConsensusError::NotDispatched {
                claim: self.claim.id,
                miner,
            });
        }
        if self.is_resolved(&miner) {
            return Err(ConsensusError::DuplicateResponse {
                claim: self.claim.id,
                miner,
            });
        }
        self.timeouts.push(miner);
        Ok(())
    }

    /// Record that a dispatched miner resolved with an attributable
    /// transport fault (penalty already applied by the caller).
    pub fn note_fault(&mut self, miner: MinerId) -> Result<(), ConsensusError> {
        if self.settled {
            return Err(ConsensusError::RoundClosed(self.claim.id));
        }
        if !self.dispatched.contains(&miner) {
            return Err(ConsensusError::NotDispatched {
                claim: self.claim.id,
                miner,
            });
        }
        if self.is_resolved(&miner) {
            return Err(ConsensusError::DuplicateResponse {
                claim: self.claim.id,
                miner,
            });
        }
        self.faults.push(miner);
        Ok(())
    }

    /// Count of responses per bucket, in admission order of first
    /// appearance.
    pub fn bucket_counts(&self) -> HashMap<Bucket, usize> {
        let mut counts = HashMap::new();
        for response in &self.responses {
            *counts.entry(response.bucket).or_insert(0) += 1;
        }
        counts
    }

    /// Check quorum and finalize if some bucket has reached it. Returns
    /// the verdict when this call performed the transition.
    pub fn try_finalize(&mut self) -> Result<Option<&Verdict>, ConsensusError> {
        if self.phase != RoundPhase::Open {
            return Err(ConsensusError::AlreadyTerminal(self.claim.id));
        }
        let quorum = self.claim.quorum.max(1);
        let winning = self
            .bucket_counts()
            .into_iter()
            .find(|(_, count)| *count >= quorum)
            .map(|(bucket, _)| bucket);

        let Some(bucket) = winning else {
            return Ok(None);
        };

        let supporters: Vec<&AdmittedResponse> = self
            .responses
            .iter()
            .filter(|r| r.bucket == bucket)
            .collect();
        let mean_confidence =
            supporters.iter().map(|r| r.confidence).sum::<f64>() / supporters.len() as f64;

        self.verdict = Some(Verdict {
            bucket,
            evidence: supporters[0].evidence.clone(),
            supporters: supporters.iter().map(|r| r.miner).collect(),
            mean_confidence,
        });
        self.phase = RoundPhase::Finalized;
        Ok(self.verdict.as_ref())
    }

    /// Force the expired transition after the deadline.
    pub fn expire(&mut self) -> Result<(), ConsensusError> {
        if self.phase != RoundPhase::Open {
            return Err(ConsensusError::AlreadyTerminal(self.claim.id));
        }
        self.phase = RoundPhase::Expired;
        Ok(())
    }

    /// Mark the round's deltas as computed; further admissions and
    /// repeat settles are rejected.
    pub(crate) fn mark_settled(&mut self) {
        self.settled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_types::PublicKey;

    fn miner(byte: u8) -> MinerId {
        MinerId(PublicKey([byte; 32]))
    }

    fn round(quorum: usize, dispatched: u8) -> ConsensusRound {
        let claim = Claim::new("s", vec![], quorum, 30_000, Timestamp::from_millis(0));
        ConsensusRound::new(claim, (1..=dispatched).map(miner).collect(), Timestamp::from_millis(0))
    }

    fn admitted(byte: u8, bucket: u8, latency_ms: u64) -> AdmittedResponse {
        AdmittedResponse {
            miner: miner(byte),
            evidence: vec![],
            confidence: 0.9,
            latency_ms,
            bucket: [bucket; 32],
        }
    }

    #[test]
    fn finalizes_exactly_at_quorum() {
        let mut round = round(3, 5);
        round.admit(admitted(1, 7, 10)).unwrap();
        round.admit(admitted(2, 7, 20)).unwrap();
        assert!(round.try_finalize().unwrap().is_none());
        assert_eq!(round.phase(), RoundPhase::Open);

        round.admit(admitted(3, 7, 30)).unwrap();
        let verdict = round.try_finalize().unwrap().expect("quorum reached");
        assert_eq!(verdict.supporters.len(), 3);
        assert_eq!(round.phase(), RoundPhase::Finalized);
    }

    #[test]
    fn disagreeing_buckets_do_not_sum_toward_quorum() {
        let mut round = round(3, 5);
        round.admit(admitted(1, 7, 10)).unwrap();
        round.admit(admitted(2, 8, 10)).unwrap();
        round.admit(admitted(3, 9, 10)).unwrap();
        assert!(round.try_finalize().unwrap().is_none());
    }

    #[test]
    fn terminal_transition_happens_once() {
        let mut round = round(1, 2);
        round.admit(admitted(1, 7, 10)).unwrap();
        assert!(round.try_finalize().unwrap().is_some());

        assert!(matches!(
            round.try_finalize(),
            Err(ConsensusError::AlreadyTerminal(_))
        ));
        assert!(matches!(
            round.expire(),
            Err(ConsensusError::AlreadyTerminal(_))
        ));
    }

    #[test]
    fn straggler_admitted_after_finalize_does_not_move_verdict() {
        let mut round = round(2, 4);
        round.admit(admitted(1, 7, 10)).unwrap();
        round.admit(admitted(2, 7, 20)).unwrap();
        round.try_finalize().unwrap().unwrap();
        let bucket_before = round.verdict().unwrap().bucket;
        let supporters_before = round.verdict().unwrap().supporters.len();

        // Even a flood of disagreeing stragglers is admitted for scoring
        // but cannot touch the verdict.
        round.admit(admitted(3, 8, 100)).unwrap();
        round.admit(admitted(4, 8, 110)).unwrap();
        assert_eq!(round.verdict().unwrap().bucket, bucket_before);
        assert_eq!(round.verdict().unwrap().supporters.len(), supporters_before);
    }

    #[test]
    fn expired_round_rejects_admissions() {
        let mut round = round(3, 3);
        round.expire().unwrap();
        assert!(matches!(
            round.admit(admitted(1, 7, 10)),
            Err(ConsensusError::RoundClosed(_))
        ));
    }

    #[test]
    fn non_dispatched_miner_rejected() {
        let mut round = round(3, 2);
        assert!(matches!(
            round.admit(admitted(9, 7, 10)),
            Err(ConsensusError::NotDispatched { .. })
        ));
    }

    #[test]
    fn duplicate_resolution_rejected() {
        let mut round = round(3, 3);
        round.admit(admitted(1, 7, 10)).unwrap();
        assert!(matches!(
            round.admit(admitted(1, 8, 20)),
            Err(ConsensusError::DuplicateResponse { .. })
        ));
        assert!(matches!(
            round.note_timeout(miner(1)),
            Err(ConsensusError::DuplicateResponse { .. })
        ));

        round.note_timeout(miner(2)).unwrap();
        assert!(matches!(
            round.admit(admitted(2, 7, 30)),
            Err(ConsensusError::DuplicateResponse { .. })
        ));
    }

    #[test]
    fn all_resolved_counts_responses_and_timeouts() {
        let mut round = round(2, 3);
        assert!(!round.all_resolved());
        round.admit(admitted(1, 7, 10)).unwrap();
        round.note_timeout(miner(2)).unwrap();
        assert!(!round.all_resolved());
        round.admit(admitted(3, 7, 15)).unwrap();
        assert!(round.all_resolved());
    }

    #[test]
    fn mean_confidence_covers_supporters_only() {
        let mut round = round(2, 3);
        round
            .admit(AdmittedResponse {
                confidence: 1.0,
                ..admitted(1, 7, 10)
            })
            .unwrap();
        round
            .admit(AdmittedResponse {
                confidence: 0.4,
                ..admitted(2, 8, 10)
            })
            .unwrap();
        round
            .admit(AdmittedResponse {
                confidence: 0.5,
                ..admitted(3, 7, 10)
            })
            .unwrap();
        let verdict = round.try_finalize().unwrap().unwrap();
        assert!((verdict.mean_confidence - 0.75).abs() < 1e-12);
    }
}
