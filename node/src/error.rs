use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("transport error: {0}")]
    Transport(#[from] attest_transport::TransportError),

    #[error("registry error: {0}")]
    Registry(#[from] attest_registry::RegistryError),

    #[error("consensus error: {0}")]
    Consensus(#[from] attest_consensus::ConsensusError),

    #[error("weight error: {0}")]
    Weights(#[from] attest_weights::WeightError),

    #[error("config error: {0}")]
    Config(String),

    #[error("claim queue is full")]
    QueueFull,

    #[error("claim {0} is already queued")]
    DuplicateClaim(attest_types::ClaimId),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("discovery error: {0}")]
    Discovery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
