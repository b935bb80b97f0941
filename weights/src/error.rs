use attest_registry::RegistryError;
use attest_types::ClaimId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("round {0} has already been applied")]
    RoundAlreadyApplied(ClaimId),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}
