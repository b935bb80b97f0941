//! Round scoring — converts a settled round into per-miner score deltas.
//!
//! The penalty ladder: active disagreement costs more than silence, and
//! silence costs more than nothing. Correct responses earn more the
//! faster they arrive, capped and floored so a slow correct answer still
//! beats no answer.

use attest_types::{MinerId, ValidatorParams};

use crate::round::{ConsensusRound, RoundPhase};

/// How a dispatched miner's participation resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Response in the verdict bucket.
    Agreed { latency_ms: u64 },
    /// Response in a losing bucket of a finalized round.
    Disagreed,
    /// No response within the round.
    TimedOut,
    /// Responded, but the round expired without a verdict.
    NoVerdict,
    /// Resolved by an attributable transport fault; the penalty was
    /// applied at admission time, so the settle delta is zero.
    Faulted,
}

/// The score delta assigned to one miner for one round.
#[derive(Clone, Debug)]
pub struct MinerDelta {
    pub miner: MinerId,
    pub resolution: Resolution,
    /// Bounded delta in [-1, 1]; the trust engine smooths it.
    pub delta: f64,
}

/// Positive delta for a correct response: the cap at zero latency,
/// decaying linearly to the configured floor fraction at the deadline.
fn agree_delta(latency_ms: u64, window_ms: u64, params: &ValidatorParams) -> f64 {
    let floor = params.agree_reward_cap * params.agree_reward_floor_bps as f64 / 10_000.0;
    if window_ms == 0 {
        return params.agree_reward_cap;
    }
    let speed = 1.0 - (latency_ms as f64 / window_ms as f64).clamp(0.0, 1.0);
    floor + (params.agree_reward_cap - floor) * speed
}

/// Compute deltas for every dispatched miner of a terminal round.
///
/// Finalized: agree → positive by latency; disagree → disagreement
/// penalty; unresolved or timed out → timeout penalty. Expired: only
/// timeout penalties are applied — miners that did respond get a zero
/// delta (there is no verdict to judge them against).
pub fn round_deltas(round: &ConsensusRound, params: &ValidatorParams) -> Vec<MinerDelta> {
    let window_ms = round.opened_at().elapsed_since(round.claim.deadline);
    let mut deltas = Vec::with_capacity(round.dispatched.len());

    match round.phase() {
        RoundPhase::Open => {
            // Callers settle only terminal rounds; an open round yields
            // nothing rather than guessing.
            return deltas;
        }
        RoundPhase::Finalized => {
            let verdict = round
                .verdict()
                .expect("finalized round always carries a verdict");
            for response in round.responses() {
                if response.bucket == verdict.bucket {
                    deltas.push(MinerDelta {
                        miner: response.miner,
                        resolution: Resolution::Agreed {
                            latency_ms: response.latency_ms,
                        },
                        delta: agree_delta(response.latency_ms, window_ms, params),
                    });
                } else {
                    deltas.push(MinerDelta {
                        miner: response.miner,
                        resolution: Resolution::Disagreed,
                        delta: -params.disagree_penalty,
                    });
                }
            }
        }
        RoundPhase::Expired => {
            for response in round.responses() {
                deltas.push(MinerDelta {
                    miner: response.miner,
                    resolution: Resolution::NoVerdict,
                    delta: 0.0,
                });
            }
        }
    }

    for miner in round.faults() {
        deltas.push(MinerDelta {
            miner: *miner,
            resolution: Resolution::Faulted,
            delta: 0.0,
        });
    }

    // Explicit transport timeouts and miners still unresolved at settle
    // time are both "never answered".
    for miner in round.timeouts() {
        deltas.push(MinerDelta {
            miner: *miner,
            resolution: Resolution::TimedOut,
            delta: -params.timeout_penalty,
        });
    }
    let resolved: Vec<MinerId> = deltas.iter().map(|d| d.miner).collect();
    for miner in &round.dispatched {
        if !resolved.contains(miner) {
            deltas.push(MinerDelta {
                miner: *miner,
                resolution: Resolution::TimedOut,
                delta: -params.timeout_penalty,
            });
        }
    }

    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::AdmittedResponse;
    use attest_types::{Claim, PublicKey, Timestamp};

    fn miner(byte: u8) -> MinerId {
        MinerId(PublicKey([byte; 32]))
    }

    fn params() -> ValidatorParams {
        ValidatorParams::defaults()
    }

    fn round(quorum: usize, dispatched: u8) -> ConsensusRound {
        let claim = Claim::new("s", vec![], quorum, 30_000, Timestamp::from_millis(0));
        ConsensusRound::new(
            claim,
            (1..=dispatched).map(miner).collect(),
            Timestamp::from_millis(0),
        )
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

    fn delta_for(deltas: &[MinerDelta], byte: u8) -> &MinerDelta {
        deltas.iter().find(|d| d.miner == miner(byte)).unwrap()
    }

    #[test]
    fn faster_agreement_earns_more() {
        let p = params();
        let fast = agree_delta(0, 30_000, &p);
        let mid = agree_delta(15_000, 30_000, &p);
        let slow = agree_delta(30_000, 30_000, &p);
        assert!(fast > mid && mid > slow);
        assert!((fast - p.agree_reward_cap).abs() < 1e-12);
        let floor = p.agree_reward_cap * p.agree_reward_floor_bps as f64 / 10_000.0;
        assert!((slow - floor).abs() < 1e-12);
    }

    #[test]
    fn latency_beyond_window_is_clamped_to_floor() {
        let p = params();
        assert_eq!(agree_delta(60_000, 30_000, &p), agree_delta(30_000, 30_000, &p));
    }

    #[test]
    fn finalized_round_scores_every_dispatched_miner() {
        let p = params();
        let mut r = round(2, 5);
        r.admit(admitted(1, 7, 1_000)).unwrap();
        r.admit(admitted(2, 7, 2_000)).unwrap();
        r.try_finalize().unwrap().unwrap();
        r.admit(admitted(3, 8, 3_000)).unwrap();
        r.note_timeout(miner(4)).unwrap();
        // miner 5 is still unresolved at settle time.

        let deltas = round_deltas(&r, &p);
        assert_eq!(deltas.len(), 5);

        assert!(delta_for(&deltas, 1).delta > 0.0);
        assert!(delta_for(&deltas, 1).delta > delta_for(&deltas, 2).delta);
        assert_eq!(delta_for(&deltas, 3).delta, -p.disagree_penalty);
        assert_eq!(delta_for(&deltas, 4).delta, -p.timeout_penalty);
        assert_eq!(delta_for(&deltas, 5).delta, -p.timeout_penalty);
        assert_eq!(delta_for(&deltas, 5).resolution, Resolution::TimedOut);
    }

    #[test]
    fn disagreement_costs_more_than_timeout() {
        let p = params();
        assert!(p.disagree_penalty > p.timeout_penalty);
        let mut r = round(1, 2);
        r.admit(admitted(1, 7, 100)).unwrap();
        r.try_finalize().unwrap().unwrap();
        r.admit(admitted(2, 9, 200)).unwrap();
        let deltas = round_deltas(&r, &p);
        assert!(delta_for(&deltas, 2).delta < -p.timeout_penalty);
    }

    #[test]
    fn expired_round_penalizes_only_silence() {
        let p = params();
        let mut r = round(3, 3);
        r.admit(admitted(1, 7, 100)).unwrap();
        r.expire().unwrap();

        let deltas = round_deltas(&r, &p);
        assert_eq!(delta_for(&deltas, 1).delta, 0.0);
        assert_eq!(delta_for(&deltas, 1).resolution, Resolution::NoVerdict);
        assert_eq!(delta_for(&deltas, 2).delta, -p.timeout_penalty);
        assert_eq!(delta_for(&deltas, 3).delta, -p.timeout_penalty);
    }

    #[test]
    fn open_round_yields_no_deltas() {
        let r = round(3, 3);
        assert!(round_deltas(&r, &params()).is_empty());
    }

    #[test]
    fn faulted_miner_settles_with_zero_delta() {
        let p = params();
        let mut r = round(1, 2);
        r.admit(admitted(1, 7, 100)).unwrap();
        r.try_finalize().unwrap().unwrap();
        r.note_fault(miner(2)).unwrap();

        let deltas = round_deltas(&r, &p);
        let faulted = delta_for(&deltas, 2);
        assert_eq!(faulted.resolution, Resolution::Faulted);
        assert_eq!(faulted.delta, 0.0);
    }
}
