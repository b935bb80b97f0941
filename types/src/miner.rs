//! Miner identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;
use crate::keys::PublicKey;

/// Stable identity of a miner: its Ed25519 public key.
///
/// Everything outside the registry refers to miners by this id; the
/// registry alone owns the mutable per-miner record behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MinerId(pub PublicKey);

impl MinerId {
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    /// Abbreviated form for log output: first 8 hex chars.
    pub fn short(&self) -> String {
        hex::encode(&self.0 .0[..4])
    }
}

impl fmt::Display for MinerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0 .0))
    }
}

impl FromStr for MinerId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
        let arr: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            TypesError::InvalidLength {
                expected: 32,
                got: bytes.len(),
            }
        })?;
        Ok(MinerId(PublicKey(arr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_from_str_round_trip() {
        let id = MinerId(PublicKey([0x5A; 32]));
        let parsed: MinerId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn short_is_eight_hex_chars() {
        let id = MinerId(PublicKey([0xFF; 32]));
        assert_eq!(id.short(), "ffffffff");
    }

    #[test]
    fn bad_hex_rejected() {
        assert!(matches!(
            "zz".parse::<MinerId>(),
            Err(TypesError::InvalidHex(_))
        ));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(matches!(
            "ab".parse::<MinerId>(),
            Err(TypesError::InvalidLength {
                expected: 32,
                got: 1
            })
        ));
    }
}
