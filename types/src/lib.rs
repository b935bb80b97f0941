//! Fundamental types shared across the attest validator core.

pub mod claim;
pub mod error;
pub mod keys;
pub mod miner;
pub mod params;
pub mod time;

pub use claim::{Claim, ClaimId, Nonce};
pub use error::TypesError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use miner::MinerId;
pub use params::ValidatorParams;
pub use time::Timestamp;
