use attest_types::MinerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("miner {0} is not registered")]
    UnknownMiner(MinerId),

    #[error("no eligible miners to select from")]
    NoEligibleMiners,
}
