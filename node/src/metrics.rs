//! # Prometheus Metrics
//!
//! Operational metrics for the node, scraped at `/metrics` on the metrics
//! port. Everything lives in a dedicated [`prometheus::Registry`] with the
//! `trust` prefix.
//!
//! Transaction counters are labelled by instruction name (`deposit`,
//! `mature_close`, `system_transfer`, ...) and failures additionally by a
//! short reason (`NotMatureYet`, `already_processed`, ...). Both label sets
//! are bounded by the instruction set and the error taxonomy.
//!
//! The vault gauges are recomputed from the ledger by [`NodeMetrics::observe_ledger`],
//! which the node runs on startup and then on a timer.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use trust_contracts::pda::rewards_pool_address;
use trust_contracts::{AccountRecord, VaultConfig, VaultStatus, PROGRAM_ID};
use trust_protocol::{DbError, LedgerDb};

/// All metric handles for the node. Handles are internally reference
/// counted, so cloning is cheap.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub transactions_processed_total: IntCounterVec,
    pub transactions_failed_total: IntCounterVec,
    pub transaction_latency_seconds: Histogram,
    pub active_vaults: IntGauge,
    pub custody_lamports: IntGauge,
    pub rewards_pool_lamports: IntGauge,
    pub airdrops_total: IntCounter,
    pub airdropped_lamports_total: IntCounter,
    pub websocket_clients: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("trust".into()), None)?;

        let transactions_processed_total = IntCounterVec::new(
            Opts::new("transactions_processed_total", "Committed transactions by instruction"),
            &["instruction"],
        )?;
        registry.register(Box::new(transactions_processed_total.clone()))?;

        let transactions_failed_total = IntCounterVec::new(
            Opts::new("transactions_failed_total", "Rejected transactions by instruction and reason"),
            &["instruction", "reason"],
        )?;
        registry.register(Box::new(transactions_failed_total.clone()))?;

        let transaction_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "transaction_latency_seconds",
                "Time from RPC receipt to commit or rejection",
            )
            .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(transaction_latency_seconds.clone()))?;

        let active_vaults = IntGauge::new("active_vaults", "Vaults in the Active state")?;
        registry.register(Box::new(active_vaults.clone()))?;

        let custody_lamports = IntGauge::new(
            "custody_lamports",
            "Lamports held by all custody accounts, reserves included",
        )?;
        registry.register(Box::new(custody_lamports.clone()))?;

        let rewards_pool_lamports =
            IntGauge::new("rewards_pool_lamports", "Lamports held by the rewards pool")?;
        registry.register(Box::new(rewards_pool_lamports.clone()))?;

        let airdrops_total = IntCounter::new("airdrops_total", "Faucet airdrops served")?;
        registry.register(Box::new(airdrops_total.clone()))?;

        let airdropped_lamports_total =
            IntCounter::new("airdropped_lamports_total", "Lamports minted by the faucet")?;
        registry.register(Box::new(airdropped_lamports_total.clone()))?;

        let websocket_clients = IntGauge::new("websocket_clients", "Connected event subscribers")?;
        registry.register(Box::new(websocket_clients.clone()))?;

        Ok(Self {
            registry,
            transactions_processed_total,
            transactions_failed_total,
            transaction_latency_seconds,
            active_vaults,
            custody_lamports,
            rewards_pool_lamports,
            airdrops_total,
            airdropped_lamports_total,
            websocket_clients,
        })
    }

    /// Recompute the vault gauges from every account the vault program owns.
    ///
    /// Program accounts with data are vault or config records; data-less ones
    /// are custody accounts, except for the rewards pool.
    pub fn observe_ledger(&self, db: &LedgerDb) -> Result<(), DbError> {
        let pool = rewards_pool_address().ok().map(|(address, _)| address);

        let mut active = 0i64;
        let mut custody = 0u64;
        let mut rewards = 0u64;
        for (address, account) in db.accounts_owned_by(&PROGRAM_ID)? {
            if Some(address) == pool {
                rewards = account.lamports;
            } else if account.data.is_empty() {
                custody = custody.saturating_add(account.lamports);
            } else if let Ok(vault) = VaultConfig::try_from_bytes(&account.data) {
                if vault.status == VaultStatus::Active {
                    active += 1;
                }
            }
        }

        self.active_vaults.set(active);
        self.custody_lamports.set(clamp(custody));
        self.rewards_pool_lamports.set(clamp(rewards));
        tracing::debug!(active, custody, rewards, "vault gauges refreshed");
        Ok(())
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn clamp(lamports: u64) -> i64 {
    i64::try_from(lamports).unwrap_or(i64::MAX)
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
