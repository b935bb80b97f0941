//! Weight snapshot hand-off.
//!
//! The chain-submission collaborator consumes snapshots; this module
//! only defines the seam and a local JSON file sink so a validator can
//! run (and be inspected) without the chain side.

use std::path::PathBuf;

use attest_weights::WeightSnapshot;

use crate::error::NodeError;

/// Receives each emitted weight snapshot.
pub trait SnapshotSink: Send + Sync {
    fn submit(&self, snapshot: &WeightSnapshot) -> Result<(), NodeError>;
}

/// Writes the latest snapshot as pretty JSON into the data directory.
///
/// The write goes to a temp file first and is renamed into place, so a
/// reader never sees a half-written snapshot.
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(data_dir: &std::path::Path) -> Self {
        Self {
            path: data_dir.join("weights.json"),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SnapshotSink for JsonFileSink {
    fn submit(&self, snapshot: &WeightSnapshot) -> Result<(), NodeError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| NodeError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_types::{MinerId, PublicKey, Timestamp};
    use attest_weights::MinerWeight;

    #[test]
    fn writes_readable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let snapshot = WeightSnapshot {
            taken_at: Timestamp::from_millis(42),
            weights: vec![MinerWeight {
                miner: MinerId(PublicKey([1; 32])),
                weight: 1.0,
            }],
        };
        sink.submit(&snapshot).unwrap();

        let raw = std::fs::read(sink.path()).unwrap();
        let back: WeightSnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back.taken_at, Timestamp::from_millis(42));
        assert!(back.is_normalized());
    }

    #[test]
    fn resubmission_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        for ms in [1u64, 2] {
            let snapshot = WeightSnapshot {
                taken_at: Timestamp::from_millis(ms),
                weights: vec![],
            };
            sink.submit(&snapshot).unwrap();
        }
        let raw = std::fs::read(sink.path()).unwrap();
        let back: WeightSnapshot = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back.taken_at, Timestamp::from_millis(2));
    }
}
