//! Protocol parameters governing dispatch, scoring, and weight emission.

use serde::{Deserialize, Serialize};

/// Tunable parameters for the validator core.
///
/// Defaults are the operating values; [`ValidatorParams::fast_defaults`]
/// shrinks every interval for tests and local development. Fields left
/// out of a config file fall back to their defaults individually.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorParams {
    /// Default number of mutually agreeing responses required to finalize
    /// a round (claims may carry their own quorum).
    pub required_quorum: usize,

    /// Dispatch redundancy in basis points over the quorum
    /// (15000 = select 1.5x quorum miners to absorb non-response).
    pub redundancy_bps: u32,

    /// Per-request transport timeout in milliseconds.
    pub request_timeout_ms: u64,

    /// Default round deadline window for claims that do not specify one.
    pub round_window_ms: u64,

    /// EWMA smoothing factor for trust score updates.
    pub trust_alpha: f64,

    /// Maximum positive delta for a correct response (earned at zero
    /// latency, decaying linearly toward the deadline).
    pub agree_reward_cap: f64,

    /// Fraction of the cap still earned by a correct response that
    /// arrives at the deadline, in basis points.
    pub agree_reward_floor_bps: u32,

    /// Penalty for a response that disagrees with the finalized verdict.
    pub disagree_penalty: f64,

    /// Penalty for never responding within the round deadline.
    pub timeout_penalty: f64,

    /// Maximum penalty, applied to malformed or unverifiable responses.
    pub malformed_penalty: f64,

    /// Floor on a miner's effective selection weight. Keeps low-trust
    /// miners selectable and selection unpredictable to an adversary.
    pub selection_floor: f64,

    /// Miners unseen for longer than this are marked inactive.
    pub stale_after_ms: u64,

    /// How long an expired request nonce is remembered as a tombstone,
    /// so a late honest reply is not mistaken for a forgery.
    pub nonce_tombstone_ms: u64,

    /// Claim dispatch cadence.
    pub dispatch_tick_ms: u64,

    /// Round deadline reconciliation cadence.
    pub reconcile_tick_ms: u64,

    /// Weight snapshot emission cadence (slower than dispatch: weight
    /// updates are batched, not per-claim).
    pub snapshot_interval_ms: u64,

    /// Peer discovery refresh cadence.
    pub discovery_interval_ms: u64,

    /// Maximum number of queued claims.
    pub max_queue_depth: usize,
}

impl ValidatorParams {
    pub fn defaults() -> Self {
        Self {
            required_quorum: 3,
            redundancy_bps: 15_000,
            request_timeout_ms: 8_000,
            round_window_ms: 30_000,
            trust_alpha: 0.1,
            agree_reward_cap: 0.3,
            agree_reward_floor_bps: 2_500,
            disagree_penalty: 0.2,
            timeout_penalty: 0.05,
            malformed_penalty: 1.0,
            selection_floor: 0.05,
            stale_after_ms: 600_000,
            nonce_tombstone_ms: 120_000,
            dispatch_tick_ms: 500,
            reconcile_tick_ms: 250,
            snapshot_interval_ms: 60_000,
            discovery_interval_ms: 30_000,
            max_queue_depth: 1_024,
        }
    }

    /// Compressed timelines for tests and local development.
    pub fn fast_defaults() -> Self {
        Self {
            request_timeout_ms: 200,
            round_window_ms: 500,
            stale_after_ms: 2_000,
            nonce_tombstone_ms: 1_000,
            dispatch_tick_ms: 20,
            reconcile_tick_ms: 10,
            snapshot_interval_ms: 100,
            discovery_interval_ms: 100,
            ..Self::defaults()
        }
    }

    /// Number of miners to select for a claim with the given quorum.
    pub fn dispatch_count(&self, quorum: usize) -> usize {
        let redundant = (quorum as u64 * self.redundancy_bps as u64).div_ceil(10_000);
        (redundant as usize).max(quorum)
    }
}

impl Default for ValidatorParams {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_count_applies_redundancy_margin() {
        let params = ValidatorParams::defaults();
        assert_eq!(params.dispatch_count(3), 5); // ceil(3 * 1.5)
        assert_eq!(params.dispatch_count(4), 6);
        assert_eq!(params.dispatch_count(1), 2);
    }

    #[test]
    fn dispatch_count_never_below_quorum() {
        let params = ValidatorParams {
            redundancy_bps: 10_000,
            ..ValidatorParams::defaults()
        };
        assert_eq!(params.dispatch_count(3), 3);
    }

    #[test]
    fn partial_overrides_keep_remaining_defaults() {
        let parsed: ValidatorParams =
            serde_json::from_str(r#"{"required_quorum": 7}"#).unwrap();
        assert_eq!(parsed.required_quorum, 7);
        assert_eq!(parsed.trust_alpha, ValidatorParams::defaults().trust_alpha);
    }

    #[test]
    fn fast_defaults_keep_scoring_parameters() {
        let fast = ValidatorParams::fast_defaults();
        let slow = ValidatorParams::defaults();
        assert_eq!(fast.trust_alpha, slow.trust_alpha);
        assert_eq!(fast.required_quorum, slow.required_quorum);
        assert!(fast.round_window_ms < slow.round_window_ms);
    }
}
