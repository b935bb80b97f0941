//! Transport error taxonomy.
//!
//! [`TransportError::Timeout`] and connection failures are the
//! non-fault outcomes: the peer simply did not answer. Malformed or
//! unverifiable replies are faults attributable to the dialed miner and
//! draw the maximum penalty.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("frame of {0} bytes exceeds maximum")]
    FrameTooLarge(usize),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("response signature does not verify")]
    BadSignature,

    #[error("signed response references a nonce that was never issued to its signer")]
    ForgedNonce,

    #[error("response arrived after its request expired")]
    LateResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this failure should draw the maximum penalty for the
    /// miner the request was dialed to. Every response arrives over a
    /// connection the validator opened, so garbage on that connection is
    /// attributable to the dial target. Silence and connection failures
    /// are not faults, and a late reply to an already-expired request is
    /// dropped without penalty (the timeout penalty already covered it).
    pub fn is_attributable_fault(&self) -> bool {
        matches!(
            self,
            TransportError::ForgedNonce
                | TransportError::BadSignature
                | TransportError::Malformed(_)
                | TransportError::FrameTooLarge(_)
        )
    }
}
