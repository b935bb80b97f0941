//! Claims and the identifiers attached to their verification lifecycle.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;
use crate::time::Timestamp;

type Blake2b256 = Blake2b<U32>;

/// Unique identifier of a claim: Blake2b-256 over the statement text and
/// submission timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClaimId(pub [u8; 32]);

impl ClaimId {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the id from the claim's immutable fields.
    pub fn derive(statement: &str, submitted_at: Timestamp) -> Self {
        let mut hasher = Blake2b256::new();
        hasher.update(statement.as_bytes());
        hasher.update(submitted_at.as_millis().to_le_bytes());
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated form for log output: first 8 hex chars.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for ClaimId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TypesError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            }
        })?;
        Ok(ClaimId(arr))
    }
}

/// Per-request nonce tying a miner's response to the exact request it
/// answers. 16 random bytes, generated at dispatch time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce(pub [u8; 16]);

impl Nonce {
    pub fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// A factual statement submitted for verification.
///
/// Immutable once queued. The id binds the statement to its submission
/// time, so resubmitting the same text later opens a distinct round.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    /// The statement to verify.
    pub statement: String,
    /// Optional preferred sources forwarded to miners as a hint.
    pub sources: Vec<String>,
    pub submitted_at: Timestamp,
    /// Number of mutually agreeing responses required to finalize.
    pub quorum: usize,
    /// Hard deadline for the consensus round (absolute).
    pub deadline: Timestamp,
}

impl Claim {
    /// Build a claim submitted `now`, with the round deadline `window_ms`
    /// from submission.
    pub fn new(
        statement: impl Into<String>,
        sources: Vec<String>,
        quorum: usize,
        window_ms: u64,
        now: Timestamp,
    ) -> Self {
        let statement = statement.into();
        let id = ClaimId::derive(&statement, now);
        Self {
            id,
            statement,
            sources,
            submitted_at: now,
            quorum,
            deadline: now.plus_millis(window_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_id_depends_on_statement_and_time() {
        let t = Timestamp::from_millis(1_000);
        let a = ClaimId::derive("the sky is blue", t);
        let b = ClaimId::derive("the sky is green", t);
        let c = ClaimId::derive("the sky is blue", Timestamp::from_millis(2_000));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, ClaimId::derive("the sky is blue", t));
    }

    #[test]
    fn claim_new_sets_deadline_from_window() {
        let now = Timestamp::from_millis(5_000);
        let claim = Claim::new("water boils at 100C", vec![], 3, 30_000, now);
        assert_eq!(claim.deadline, Timestamp::from_millis(35_000));
        assert_eq!(claim.quorum, 3);
        assert_eq!(claim.id, ClaimId::derive("water boils at 100C", now));
    }

    #[test]
    fn claim_id_display_round_trip() {
        let id = ClaimId::derive("x", Timestamp::EPOCH);
        let parsed: ClaimId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
