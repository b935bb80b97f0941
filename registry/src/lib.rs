//! Miner registry: the single owned table of miner identities, network
//! addresses, and trust scores.
//!
//! Every other component refers to miners by id and goes through a
//! registry handle for score reads and writes. Selection is weighted
//! random with a floor probability so low-trust miners stay reachable
//! and no adversary can predict the dispatch set.

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{MinerRecord, MinerRegistry, INITIAL_SCORE};
