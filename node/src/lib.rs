//! The attest validator node — wires the registry, aggregator, trust
//! engine, and transport into the daemon loop that drives consensus
//! rounds.

pub mod claim_queue;
pub mod config;
pub mod discovery;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod submit;
pub mod validator;

pub use claim_queue::ClaimQueue;
pub use config::ValidatorConfig;
pub use discovery::{PeerDiscovery, StaticDiscovery};
pub use error::NodeError;
pub use metrics::NodeMetrics;
pub use shutdown::ShutdownController;
pub use submit::{JsonFileSink, SnapshotSink};
pub use validator::ValidatorNode;
