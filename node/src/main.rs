// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trust Vault Node
//!
//! Entry point for the `trust-node` binary. Parses CLI arguments, opens the
//! ledger, bootstraps the program configuration and serves the HTTP/WS API
//! and the metrics endpoint.
//!
//! Subcommands:
//!
//! - `run`: start the node
//! - `init`: create the data directory and the admin key
//! - `status`: query a running node's `/status`
//! - `version`: print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;

use trust_contracts::VaultProgram;
use trust_protocol::config::PROTOCOL_VERSION;
use trust_protocol::{Bank, Clock, Keypair, LedgerDb, SystemClock};

use cli::{Commands, TrustNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// Broadcast channel capacity for live event streaming. Slow subscribers
/// past this many events start missing some (and are told so).
const EVENT_CHANNEL_CAPACITY: usize = 256;

const ADMIN_KEY_FILE: &str = "admin.key";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TrustNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, LogFormat::from_str_lossy(&args.log_format));

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        airdrop = !args.disable_airdrop,
        "starting trust-node"
    );

    // --- Admin key ---
    let admin = load_admin_key(&args.data_dir, args.admin_key.as_deref())?;
    tracing::info!(admin = %admin.pubkey(), "admin key loaded");

    // --- Ledger ---
    let db_path = args.data_dir.join("ledger");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create ledger directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open ledger at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), accounts = db.account_count(), "ledger opened");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let bank = Arc::new(Bank::new(db, VaultProgram::new(), clock));

    // --- Program configuration ---
    api::bootstrap_program_config(&bank, &admin).context("failed to bootstrap program config")?;

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    if let Err(e) = node_metrics.observe_ledger(bank.db()) {
        tracing::warn!("initial ledger scan failed: {}", e);
    }

    // --- Event broadcast ---
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        network: "devnet".to_string(),
        bank: Arc::clone(&bank),
        event_tx,
        metrics: Arc::clone(&node_metrics),
        airdrop_enabled: !args.disable_airdrop,
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("{}:{}", args.host, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("{}:{}", args.host, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Vault gauges ---
    let gauge_bank = Arc::clone(&bank);
    let gauge_metrics = Arc::clone(&node_metrics);
    let interval_secs = args.gauge_interval_secs.max(1);
    let gauge_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            let bank = Arc::clone(&gauge_bank);
            let metrics = Arc::clone(&gauge_metrics);
            match tokio::task::spawn_blocking(move || metrics.observe_ledger(bank.db())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("ledger scan failed: {}", e),
                Err(e) => tracing::warn!("ledger scan task panicked: {}", e),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    gauge_loop.abort();
    bank.db().flush().context("failed to flush ledger")?;
    tracing::info!("trust-node stopped");
    Ok(())
}

/// The admin key comes from the flag/env when given, else from the data
/// directory.
fn load_admin_key(data_dir: &Path, override_hex: Option<&str>) -> Result<Keypair> {
    if let Some(hex_key) = override_hex {
        return Keypair::from_hex(hex_key.trim()).context("invalid --admin-key");
    }
    let key_path = data_dir.join(ADMIN_KEY_FILE);
    let contents = std::fs::read_to_string(&key_path).with_context(|| {
        format!(
            "failed to read {} (run `trust-node init` first)",
            key_path.display()
        )
    })?;
    Keypair::from_hex(contents.trim())
        .with_context(|| format!("invalid admin key in {}", key_path.display()))
}

/// Creates the data directory and writes a fresh admin keypair.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("trust_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path: PathBuf = data_dir.join(ADMIN_KEY_FILE);
    if key_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to replace it",
            key_path.display()
        );
    }

    let keypair = Keypair::generate();
    std::fs::write(&key_path, keypair.secret_key_hex())
        .with_context(|| format!("failed to write admin key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(
        admin = %keypair.pubkey(),
        key_path = %key_path.display(),
        "admin keypair generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Admin key      : {}", key_path.display());
    println!("  Admin address  : {}", keypair.pubkey());

    Ok(())
}

/// Queries a running node's status endpoint and prints the body.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let body = http_get(&args.rpc_url, "/status").await?;
    println!("{}", body);
    Ok(())
}

/// Plain HTTP/1.1 GET over a tokio socket; `status` is the only client call
/// the binary makes.
async fn http_get(base_url: &str, path: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let authority = base_url
        .strip_prefix("http://")
        .unwrap_or(base_url)
        .trim_end_matches('/');
    if authority.starts_with("https://") {
        bail!("https is not supported by `status`; use plain http");
    }
    let host = authority.split(':').next().unwrap_or(authority);
    let addr = if authority.contains(':') {
        authority.to_string()
    } else {
        format!("{}:80", authority)
    };

    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );
    stream.write_all(request.as_bytes()).await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    // Everything after the first blank line is the body.
    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());
    Ok(body)
}

fn print_version() {
    println!("trust-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol   {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
