//! Validator configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use attest_types::ValidatorParams;

use crate::NodeError;

/// Configuration for a validator node.
///
/// Can be loaded from a TOML file via [`ValidatorConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Data directory for weight snapshots and local state.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Hex-encoded 32-byte seed for the validator's signing identity.
    /// A random identity is generated when absent.
    #[serde(default)]
    pub identity_seed: Option<String>,

    /// Protocol parameters. Absent sections fall back to defaults.
    #[serde(default)]
    pub params: ValidatorParams,

    /// Bootstrap miner list for the static discovery source:
    /// `(hex miner id, "ip:port", stake)` per entry.
    #[serde(default)]
    pub miners: Vec<MinerEntry>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to register Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,
}

/// One bootstrap miner entry as written in the config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinerEntry {
    /// Hex-encoded Ed25519 public key.
    pub id: String,
    /// `"ip:port"` the miner serves on.
    pub address: String,
    #[serde(default)]
    pub stake: u64,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./attest_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ValidatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("ValidatorConfig is always serializable to TOML")
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            identity_seed: None,
            params: ValidatorParams::defaults(),
            miners: Vec::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
