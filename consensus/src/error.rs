use attest_types::{ClaimId, MinerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("no round open for claim {0}")]
    UnknownRound(ClaimId),

    #[error("a round for claim {0} is already open")]
    DuplicateRound(ClaimId),

    #[error("round {0} is closed")]
    RoundClosed(ClaimId),

    #[error("miner {miner} was not dispatched for claim {claim}")]
    NotDispatched { claim: ClaimId, miner: MinerId },

    #[error("miner {miner} already resolved for claim {claim}")]
    DuplicateResponse { claim: ClaimId, miner: MinerId },

    #[error("round {0} already reached a terminal phase")]
    AlreadyTerminal(ClaimId),
}
