//! Shared parsing error type for the core identifier types.

use thiserror::Error;

/// Errors from parsing identifiers (miner ids, claim ids, nonces) from text.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
