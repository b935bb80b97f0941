//! Property tests for the core identifier and time types.

use attest_types::{Claim, ClaimId, MinerId, Timestamp, ValidatorParams};
use proptest::prelude::*;

proptest! {
    #[test]
    fn claim_id_parse_round_trips(bytes in prop::array::uniform32(any::<u8>())) {
        let id = ClaimId::new(bytes);
        let parsed: ClaimId = id.to_string().parse().unwrap();
        prop_assert_eq!(id, parsed);
    }

    #[test]
    fn miner_id_parse_round_trips(bytes in prop::array::uniform32(any::<u8>())) {
        let id = MinerId(attest_types::PublicKey(bytes));
        let parsed: MinerId = id.to_string().parse().unwrap();
        prop_assert_eq!(id, parsed);
    }

    #[test]
    fn dispatch_count_bounds(quorum in 1usize..100, redundancy_bps in 10_000u32..40_000) {
        let params = ValidatorParams { redundancy_bps, ..ValidatorParams::defaults() };
        let k = params.dispatch_count(quorum);
        // At least the quorum, at most quorum * redundancy rounded up.
        prop_assert!(k >= quorum);
        let upper = (quorum as u64 * redundancy_bps as u64 + 9_999) / 10_000;
        prop_assert!(k as u64 <= upper.max(quorum as u64));
    }

    #[test]
    fn claim_deadline_is_never_before_submission(
        window in 0u64..10_000_000,
        now_ms in 0u64..u64::MAX / 2,
    ) {
        let now = Timestamp::from_millis(now_ms);
        let claim = Claim::new("s", vec![], 3, window, now);
        prop_assert!(claim.deadline >= claim.submitted_at);
    }
}
