//! # CLI Interface
//!
//! Command-line arguments for `trust-node`, built with `clap` derive. Every
//! runtime option also reads from a `TRUST_*` environment variable so the
//! node can be configured from a container manifest without flags.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use trust_protocol::config::{DEFAULT_DATA_DIR, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT};

/// Trust Vault node.
///
/// Runs the vault program over a local ledger and serves it through a
/// JSON-RPC gateway, a WebSocket event stream and Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "trust-node",
    about = "Trust Vault node",
    version,
    propagate_version = true
)]
pub struct TrustNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory and generate the administrator keypair.
    Init(InitArgs),
    /// Query the status of a running node.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database and the admin key.
    #[arg(long, short = 'd', env = "TRUST_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Interface to bind both listeners on.
    #[arg(long, env = "TRUST_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "TRUST_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TRUST_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Hex-encoded Ed25519 administrator secret key.
    ///
    /// Overrides `admin.key` in the data directory. Handy for throwaway
    /// devnets; keep real keys in the file.
    #[arg(long, env = "TRUST_ADMIN_KEY")]
    pub admin_key: Option<String>,

    /// Reject `requestAirdrop` calls.
    #[arg(long, env = "TRUST_DISABLE_AIRDROP")]
    pub disable_airdrop: bool,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "TRUST_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    /// Seconds between ledger scans that refresh the vault gauges.
    #[arg(long, env = "TRUST_GAUGE_INTERVAL", default_value_t = 15)]
    pub gauge_interval_secs: u64,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    #[arg(long, short = 'd', env = "TRUST_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Overwrite an existing admin key.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Base URL of the running node.
    #[arg(long, env = "TRUST_RPC_URL", default_value = "http://127.0.0.1:8899")]
    pub rpc_url: String,
}
