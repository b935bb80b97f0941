//! Consensus rounds: the bounded lifecycle of dispatching one claim and
//! resolving it into a verdict and per-miner score deltas.
//!
//! The round is an explicit state machine (`Open → Finalized | Expired`)
//! with a single enforced terminal transition, testable without any
//! networking. Agreement between responses is a pluggable comparator;
//! the default buckets responses by a normalized hash of their evidence.

pub mod aggregator;
pub mod error;
pub mod round;
pub mod scoring;
pub mod verdict;

pub use aggregator::{ResponseAggregator, RoundEvent, RoundOutcome};
pub use error::ConsensusError;
pub use round::{AdmittedResponse, ConsensusRound, RoundPhase, Verdict};
pub use scoring::{round_deltas, MinerDelta, Resolution};
pub use verdict::{AgreementRule, ConfidenceThresholdRule, EvidenceHashRule};
