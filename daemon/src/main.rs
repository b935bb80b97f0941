//! Attest daemon — entry point for running a validator node.

use attest_node::{ValidatorConfig, ValidatorNode};
use attest_transport::TcpTransport;
use attest_types::{Claim, Timestamp};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "attest-daemon", about = "Attest claim-verification validator daemon")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "ATTEST_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for weight snapshots and local state.
    #[arg(long, env = "ATTEST_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "ATTEST_LOG_LEVEL")]
    log_level: String,

    /// Emit JSON-formatted logs.
    #[arg(long, env = "ATTEST_LOG_JSON")]
    log_json: bool,

    /// Enable Prometheus metrics registration.
    #[arg(long, env = "ATTEST_ENABLE_METRICS")]
    metrics: bool,

    /// Path to a JSON file of claims to enqueue at startup
    /// (array of {statement, sources?, quorum?}).
    #[arg(long, env = "ATTEST_CLAIMS_FILE")]
    claims: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the validator node.
    Run,
}

/// One claim as written in the startup claims file.
#[derive(Deserialize)]
struct ClaimEntry {
    statement: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    quorum: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    attest_utils::init_tracing_with(&cli.log_level, cli.log_json);

    let mut config = if let Some(ref config_path) = cli.config {
        match ValidatorConfig::from_toml_file(&config_path.display().to_string()) {
            Ok(cfg) => {
                tracing::info!("Loaded config from {}", config_path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!("Failed to load config file: {e}, using defaults");
                ValidatorConfig::default()
            }
        }
    } else {
        ValidatorConfig::default()
    };

    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.log_level = cli.log_level.clone();
    config.enable_metrics = cli.metrics || config.enable_metrics;

    match cli.command {
        Command::Run => {
            tracing::info!(
                "Starting attest validator (data dir: {}, {} bootstrap miners)",
                config.data_dir.display(),
                config.miners.len(),
            );

            let mut node = ValidatorNode::new(config, TcpTransport)?;
            node.start().await?;

            if let Some(ref claims_path) = cli.claims {
                enqueue_claims_file(&node, claims_path).await?;
            }

            node.shutdown.wait_for_signal().await;
            tracing::info!("Shutdown signal received — stopping node");
            node.stop().await?;

            tracing::info!("attest daemon exited cleanly");
        }
    }

    Ok(())
}

/// Enqueue every claim from a JSON file, using the node's defaults for
/// missing quorum values.
async fn enqueue_claims_file(
    node: &ValidatorNode<TcpTransport>,
    path: &PathBuf,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(path)?;
    let entries: Vec<ClaimEntry> = serde_json::from_str(&raw)?;
    let count = entries.len();

    for entry in entries {
        let claim = match entry.quorum {
            Some(quorum) => Claim::new(
                entry.statement,
                entry.sources,
                quorum,
                node.config.params.round_window_ms,
                Timestamp::now(),
            ),
            None => node.make_claim(entry.statement, entry.sources),
        };
        if let Err(e) = node.submit_claim(claim).await {
            tracing::warn!(error = %e, "failed to enqueue claim from file");
        }
    }

    tracing::info!("Enqueued {count} claims from {}", path.display());
    Ok(())
}
