//! Peer discovery feed.
//!
//! The registry reconciles membership against whatever this trait
//! returns; the wire format of the real feed is owned by the external
//! collaborator. [`StaticDiscovery`] serves the fixed bootstrap list
//! from configuration.

use std::str::FromStr;

use attest_messages::MinerEndpoint;
use attest_types::MinerId;

use crate::config::MinerEntry;
use crate::error::NodeError;

/// Source of `(miner id, address, stake)` records.
pub trait PeerDiscovery: Send + Sync {
    fn fetch(&self) -> Result<Vec<MinerEndpoint>, NodeError>;
}

/// Discovery backed by a fixed list, typically from the config file.
pub struct StaticDiscovery {
    endpoints: Vec<MinerEndpoint>,
}

impl StaticDiscovery {
    pub fn new(endpoints: Vec<MinerEndpoint>) -> Self {
        Self { endpoints }
    }

    /// Parse config-file miner entries into endpoints.
    pub fn from_entries(entries: &[MinerEntry]) -> Result<Self, NodeError> {
        let endpoints = entries
            .iter()
            .map(|entry| {
                let id = MinerId::from_str(&entry.id)
                    .map_err(|e| NodeError::Config(format!("miner id {:?}: {e}", entry.id)))?;
                Ok(MinerEndpoint {
                    id,
                    address: entry.address.clone(),
                    stake: entry.stake,
                })
            })
            .collect::<Result<Vec<_>, NodeError>>()?;
        Ok(Self { endpoints })
    }
}

impl PeerDiscovery for StaticDiscovery {
    fn fetch(&self) -> Result<Vec<MinerEndpoint>, NodeError> {
        Ok(self.endpoints.clone())
    }
}
