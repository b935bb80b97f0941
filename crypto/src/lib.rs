//! Cryptographic primitives for the attest validator.
//!
//! Ed25519 for request/response authentication, Blake2b-256 for claim ids,
//! evidence normalization hashes, and selection scores.

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private, random_nonce};
pub use sign::{sign_message, verify_signature};
