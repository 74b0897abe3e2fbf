//! # REST + WebSocket + JSON-RPC API
//!
//! The axum router that fronts the bank. All handlers share [`AppState`]
//! through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                 | Description                               |
//! |--------|----------------------|-------------------------------------------|
//! | GET    | `/health`            | Liveness probe                            |
//! | GET    | `/status`            | Node and ledger summary                   |
//! | GET    | `/accounts/:address` | Raw account state                         |
//! | GET    | `/vaults/:owner`     | Derived addresses and decoded vault state |
//! | GET    | `/ws`                | Live [`VaultEvent`] stream                |
//! | POST   | `/rpc`               | JSON-RPC 2.0 gateway                      |
//!
//! ## JSON-RPC methods
//!
//! `getHealth`, `getVersion`, `getBalance`, `getAccountInfo`, `getVault`,
//! `deriveVaultAddresses`, `requestAirdrop`, `sendTransaction`. Params are
//! positional arrays; addresses are base58 and `sendTransaction` takes the
//! base58 wire encoding of a signed transaction.
//!
//! A rejected transaction is reported as a JSON-RPC error. When the program
//! itself rejected it, `error.data` carries the program's `{code, name,
//! message}` so clients can match on the numeric code.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use trust_contracts::pda::program_config_address;
use trust_contracts::{
    instruction, AccountRecord, ConfigParams, ProgramConfig, VaultAddresses, VaultConfig,
    VaultInstruction, VaultProgram, PROGRAM_ID,
};
use trust_protocol::config::{
    ADMIN_BOOTSTRAP_LAMPORTS, MAX_AIRDROP_LAMPORTS, PROTOCOL_VERSION, SYSTEM_PROGRAM_ID,
};
use trust_protocol::{
    minimum_balance, Account, Bank, Clock, Keypair, Pubkey, Transaction, TransactionError,
    TransactionReceipt,
};

use crate::metrics::SharedMetrics;

/// The bank type the node serves.
pub type VaultBank = Bank<VaultProgram>;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    /// Network label reported by `/status`.
    pub network: String,
    pub bank: Arc<VaultBank>,
    pub event_tx: broadcast::Sender<VaultEvent>,
    pub metrics: SharedMetrics,
    pub airdrop_enabled: bool,
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    /// A transaction committed.
    #[serde(rename = "transaction_committed")]
    TransactionCommitted {
        id: String,
        instruction: String,
        signer: String,
        timestamp: i64,
        logs: Vec<String>,
    },
    /// A transaction was rejected; nothing changed.
    #[serde(rename = "transaction_rejected")]
    TransactionRejected {
        id: String,
        instruction: String,
        signer: String,
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<u32>,
    },
    /// The faucet credited an account.
    #[serde(rename = "airdrop")]
    Airdrop {
        address: String,
        lamports: u64,
        balance: u64,
    },
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the API router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/vaults/:owner", get(vault_handler))
        .route("/ws", get(ws_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// Standard JSON-RPC 2.0 error codes, plus the node's own range.
pub mod rpc_codes {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
    /// The program rejected the transaction; `data` holds the program error.
    pub const PROGRAM_ERROR: i32 = -32002;
    /// The runtime rejected the transaction before or after the program ran.
    pub const TRANSACTION_REJECTED: i32 = -32003;
    pub const AIRDROP_UNAVAILABLE: i32 = -32004;
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<serde_json::Value>,
    pub id: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        Self::new(rpc_codes::INTERNAL_ERROR, format!("Internal error: {e}"))
    }

    fn invalid_params(expected: &str) -> Self {
        Self::new(rpc_codes::INVALID_PARAMS, format!("Invalid params: expected {expected}"))
    }
}

type RpcResult = Result<serde_json::Value, JsonRpcError>;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub program_id: String,
    /// Unix seconds on the node's clock.
    pub clock: i64,
    pub account_count: usize,
    pub processed_transactions: usize,
    pub total_airdropped: u64,
    pub program_config: Option<ProgramConfigView>,
    /// RFC 3339 wall time of the response.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgramConfigView {
    pub address: String,
    pub admin: String,
    pub penalty_bps: u16,
    pub reward_rate_bps: u16,
    pub max_lock_duration_secs: i64,
}

impl ProgramConfigView {
    fn new(address: &Pubkey, config: &ProgramConfig) -> Self {
        Self {
            address: address.to_base58(),
            admin: config.admin.to_base58(),
            penalty_bps: config.penalty_bps,
            reward_rate_bps: config.reward_rate_bps,
            max_lock_duration_secs: config.max_lock_duration_secs,
        }
    }
}

/// `GET /accounts/:address` and `getAccountInfo`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: String,
    pub exists: bool,
    pub lamports: u64,
    pub owner: String,
    /// Hex-encoded account data.
    pub data: String,
    pub rent_exempt_minimum: u64,
}

impl AccountResponse {
    fn new(address: &Pubkey, account: Option<&Account>) -> Self {
        match account {
            Some(a) => Self {
                address: address.to_base58(),
                exists: true,
                lamports: a.lamports,
                owner: a.owner.to_base58(),
                data: hex::encode(&a.data),
                rent_exempt_minimum: minimum_balance(a.data.len()),
            },
            None => Self {
                address: address.to_base58(),
                exists: false,
                lamports: 0,
                owner: SYSTEM_PROGRAM_ID.to_base58(),
                data: String::new(),
                rent_exempt_minimum: minimum_balance(0),
            },
        }
    }
}

/// `deriveVaultAddresses`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AddressesView {
    pub owner: String,
    pub vault_config: String,
    pub state_bump: u8,
    pub custody: String,
    pub vault_bump: u8,
}

impl From<&VaultAddresses> for AddressesView {
    fn from(a: &VaultAddresses) -> Self {
        Self {
            owner: a.owner.to_base58(),
            vault_config: a.vault_config.to_base58(),
            state_bump: a.state_bump,
            custody: a.custody.to_base58(),
            vault_bump: a.vault_bump,
        }
    }
}

/// Decoded `VaultConfig`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultView {
    pub status: String,
    pub lock_duration_secs: i64,
    pub created_at: i64,
    pub maturity: Option<i64>,
    pub mature: bool,
    pub principal_deposited: u64,
    pub rewards_claimed: u64,
}

/// `GET /vaults/:owner` and `getVault`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultResponse {
    pub addresses: AddressesView,
    /// `None` if the owner never initialized a vault.
    pub vault: Option<VaultView>,
    pub custody_lamports: u64,
}

/// Generic error body for REST endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Failures of the REST lookups, mapped to status codes.
#[derive(Debug)]
enum LookupError {
    BadAddress(String),
    Internal(String),
}

impl IntoResponse for LookupError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            LookupError::BadAddress(e) => (StatusCode::BAD_REQUEST, e),
            LookupError::Internal(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

fn parse_address(s: &str) -> Result<Pubkey, LookupError> {
    s.parse::<Pubkey>()
        .map_err(|e| LookupError::BadAddress(format!("invalid address {s:?}: {e}")))
}

fn lookup_account(state: &AppState, address: &Pubkey) -> Result<AccountResponse, LookupError> {
    let account = state
        .bank
        .get_account(address)
        .map_err(|e| LookupError::Internal(format!("Database error: {e}")))?;
    Ok(AccountResponse::new(address, account.as_ref()))
}

fn lookup_vault(state: &AppState, owner: &Pubkey) -> Result<VaultResponse, LookupError> {
    let addresses =
        VaultAddresses::derive(owner).map_err(|e| LookupError::Internal(e.to_string()))?;
    let db_err = |e: trust_protocol::DbError| LookupError::Internal(format!("Database error: {e}"));

    let vault = match state.bank.get_account(&addresses.vault_config).map_err(db_err)? {
        Some(account) if account.owner == PROGRAM_ID => {
            let record = VaultConfig::try_from_bytes(&account.data)
                .map_err(|e| LookupError::Internal(e.to_string()))?;
            let now = state.bank.clock().unix_timestamp().unwrap_or(record.created_at);
            let maturity = record.maturity().ok();
            Some(VaultView {
                status: record.status.to_string(),
                lock_duration_secs: record.lock_duration_secs,
                created_at: record.created_at,
                maturity,
                mature: maturity.is_some_and(|m| now >= m),
                principal_deposited: record.principal_deposited,
                rewards_claimed: record.rewards_claimed,
            })
        }
        _ => None,
    };
    let custody_lamports = state.bank.balance(&addresses.custody).map_err(db_err)?;

    Ok(VaultResponse {
        addresses: AddressesView::from(&addresses),
        vault,
        custody_lamports,
    })
}

fn lookup_program_config(bank: &VaultBank) -> Option<ProgramConfigView> {
    let (address, _) = program_config_address().ok()?;
    let account = bank.get_account(&address).ok().flatten()?;
    if account.owner != PROGRAM_ID {
        return None;
    }
    let config = ProgramConfig::try_from_bytes(&account.data).ok()?;
    Some(ProgramConfigView::new(&address, &config))
}

/// Metric label for the instruction a transaction carries.
fn instruction_label(tx: &Transaction) -> String {
    let message = &tx.message;
    if message.program_id == SYSTEM_PROGRAM_ID {
        "system_transfer".to_string()
    } else if message.program_id == PROGRAM_ID {
        VaultInstruction::unpack(&message.data)
            .map(|ix| ix.name().to_string())
            .unwrap_or_else(|_| "invalid".to_string())
    } else {
        "unknown_program".to_string()
    }
}

/// Metric label for why a transaction was rejected.
fn failure_reason(err: &TransactionError) -> String {
    let reason = match err {
        TransactionError::Program(p) => return p.name.clone(),
        TransactionError::InvalidSignature => "invalid_signature",
        TransactionError::AlreadyProcessed => "already_processed",
        TransactionError::UnknownProgram(_) => "unknown_program",
        TransactionError::DuplicateAccount(_) => "duplicate_account",
        TransactionError::SignerNotInAccounts(_) => "signer_not_in_accounts",
        TransactionError::Malformed(_) => "malformed",
        TransactionError::Account(_) => "account",
        TransactionError::UnbalancedTransaction { .. } => "unbalanced",
        TransactionError::InsufficientFundsForRent { .. } => "insufficient_funds_for_rent",
        TransactionError::Clock(_) => "clock",
        TransactionError::Storage(_) => "storage",
    };
    reason.to_string()
}

fn rejection_to_rpc(err: &TransactionError) -> JsonRpcError {
    match err.program_error() {
        Some(p) => JsonRpcError {
            code: rpc_codes::PROGRAM_ERROR,
            message: format!("Transaction rejected: {p}"),
            data: serde_json::to_value(p).ok(),
        },
        None => JsonRpcError::new(
            rpc_codes::TRANSACTION_REJECTED,
            format!("Transaction rejected: {err}"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Transaction submission
// ---------------------------------------------------------------------------

/// Execute a signed transaction, record metrics and publish the outcome.
pub async fn submit_transaction(
    state: &AppState,
    tx: Transaction,
) -> Result<TransactionReceipt, TransactionError> {
    let started = Instant::now();
    let label = instruction_label(&tx);
    let id = tx.id_hex();
    let signer = tx.signer.to_base58();

    let bank = Arc::clone(&state.bank);
    let result = match tokio::task::spawn_blocking(move || bank.process_transaction(&tx)).await {
        Ok(result) => result,
        Err(e) => Err(TransactionError::Malformed(format!("execution task failed: {e}"))),
    };
    state
        .metrics
        .transaction_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    let event = match &result {
        Ok(receipt) => {
            state
                .metrics
                .transactions_processed_total
                .with_label_values(&[label.as_str()])
                .inc();
            VaultEvent::TransactionCommitted {
                id,
                instruction: label,
                signer,
                timestamp: receipt.timestamp,
                logs: receipt.logs.clone(),
            }
        }
        Err(err) => {
            let reason = failure_reason(err);
            state
                .metrics
                .transactions_failed_total
                .with_label_values(&[label.as_str(), reason.as_str()])
                .inc();
            VaultEvent::TransactionRejected {
                id,
                instruction: label,
                signer,
                error: err.to_string(),
                code: err.program_error().map(|p| p.code),
            }
        }
    };
    // No subscribers is not an error.
    let _ = state.event_tx.send(event);
    result
}

fn airdrop(state: &AppState, to: &Pubkey, lamports: u64) -> RpcResult {
    if !state.airdrop_enabled {
        return Err(JsonRpcError::new(rpc_codes::AIRDROP_UNAVAILABLE, "Airdrops are disabled"));
    }
    if lamports == 0 || lamports > MAX_AIRDROP_LAMPORTS {
        return Err(JsonRpcError::new(
            rpc_codes::INVALID_PARAMS,
            format!("Invalid params: lamports must be in 1..={MAX_AIRDROP_LAMPORTS}"),
        ));
    }
    let balance = state.bank.airdrop(to, lamports).map_err(JsonRpcError::internal)?;
    state.metrics.airdrops_total.inc();
    state.metrics.airdropped_lamports_total.inc_by(lamports);
    let _ = state.event_tx.send(VaultEvent::Airdrop {
        address: to.to_base58(),
        lamports,
        balance,
    });
    Ok(serde_json::json!({ "address": to.to_base58(), "balance": balance }))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: liveness only.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db = state.bank.db();
    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        program_id: PROGRAM_ID.to_base58(),
        clock: state.bank.clock().unix_timestamp().unwrap_or_default(),
        account_count: db.account_count(),
        processed_transactions: db.processed_count(),
        total_airdropped: db.total_airdropped().unwrap_or_default(),
        program_config: lookup_program_config(&state.bank),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /accounts/:address`. Unknown addresses return `exists: false`.
async fn account_handler(
    Path(address): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<AccountResponse>, LookupError> {
    let address = parse_address(&address)?;
    Ok(Json(lookup_account(&state, &address)?))
}

/// `GET /vaults/:owner`.
async fn vault_handler(
    Path(owner): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<VaultResponse>, LookupError> {
    let owner = parse_address(&owner)?;
    Ok(Json(lookup_vault(&state, &owner)?))
}

/// `POST /rpc`. Unknown methods return -32601.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                rpc_codes::INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    let params = req.params.as_ref().and_then(|p| p.as_array());
    let str_param = |i: usize| params.and_then(|arr| arr.get(i)).and_then(|v| v.as_str());
    let address_param = |i: usize, what: &str| -> Result<Pubkey, JsonRpcError> {
        str_param(i)
            .and_then(|s| s.parse::<Pubkey>().ok())
            .ok_or_else(|| JsonRpcError::invalid_params(what))
    };

    let outcome: RpcResult = match req.method.as_str() {
        "getHealth" => Ok(serde_json::json!("ok")),
        "getVersion" => Ok(serde_json::json!({
            "trust-node": state.version,
            "protocol": PROTOCOL_VERSION,
        })),
        "getBalance" => address_param(0, "[address]").and_then(|address| {
            let lamports = state.bank.balance(&address).map_err(JsonRpcError::internal)?;
            Ok(serde_json::json!(lamports))
        }),
        "getAccountInfo" => address_param(0, "[address]").and_then(|address| {
            let account = state
                .bank
                .get_account(&address)
                .map_err(JsonRpcError::internal)?;
            match account {
                Some(a) => serde_json::to_value(AccountResponse::new(&address, Some(&a)))
                    .map_err(JsonRpcError::internal),
                None => Ok(serde_json::Value::Null),
            }
        }),
        "getVault" => address_param(0, "[owner]").and_then(|owner| {
            let vault = lookup_vault(&state, &owner).map_err(|e| match e {
                LookupError::BadAddress(m) | LookupError::Internal(m) => JsonRpcError::internal(m),
            })?;
            serde_json::to_value(vault).map_err(JsonRpcError::internal)
        }),
        "deriveVaultAddresses" => address_param(0, "[owner]").and_then(|owner| {
            let addresses = VaultAddresses::derive(&owner).map_err(JsonRpcError::internal)?;
            serde_json::to_value(AddressesView::from(&addresses)).map_err(JsonRpcError::internal)
        }),
        "requestAirdrop" => {
            let lamports = params.and_then(|arr| arr.get(1)).and_then(|v| v.as_u64());
            match (address_param(0, "[address, lamports]"), lamports) {
                (Ok(address), Some(lamports)) => airdrop(&state, &address, lamports),
                _ => Err(JsonRpcError::invalid_params("[address, lamports]")),
            }
        }
        "sendTransaction" => match str_param(0).map(Transaction::from_base58) {
            Some(Ok(tx)) => match submit_transaction(&state, tx).await {
                Ok(receipt) => serde_json::to_value(receipt).map_err(JsonRpcError::internal),
                Err(err) => Err(rejection_to_rpc(&err)),
            },
            Some(Err(e)) => Err(JsonRpcError::new(rpc_codes::INVALID_PARAMS, format!("Invalid params: {e}"))),
            None => Err(JsonRpcError::invalid_params("[base58 transaction]")),
        },
        _ => Err(JsonRpcError::new(
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", req.method),
        )),
    };

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// `GET /ws`: push-only stream of [`VaultEvent`]s.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();
    state.metrics.websocket_clients.inc();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(WsMessage::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    // Client messages are ignored.
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.metrics.websocket_clients.dec();
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// Create the program configuration, signed by `admin`, if the ledger has
/// none yet. Tops the admin up from the faucet when it can't pay rent.
///
/// Returns `true` if a configuration was created.
pub fn bootstrap_program_config(bank: &VaultBank, admin: &Keypair) -> anyhow::Result<bool> {
    if let Some(existing) = lookup_program_config(bank) {
        tracing::info!(admin = %existing.admin, "program config present");
        return Ok(false);
    }

    let rent = minimum_balance(ProgramConfig::new(admin.pubkey(), ConfigParams::default(), 0).to_bytes()?.len());
    if bank.balance(&admin.pubkey())? < rent {
        bank.airdrop(&admin.pubkey(), ADMIN_BOOTSTRAP_LAMPORTS)?;
    }
    let msg = instruction::initialize_config(&admin.pubkey(), ConfigParams::default())?;
    bank.process_transaction(&Transaction::new_signed(msg, admin))?;
    tracing::info!(admin = %admin.pubkey(), "program config bootstrapped");
    Ok(true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use trust_contracts::{VaultError, CUSTODY_RESERVE};
    use trust_protocol::config::LAMPORTS_PER_SOL;
    use trust_protocol::runtime::system;
    use trust_protocol::{LedgerDb, ManualClock, Message};
    use tower::ServiceExt;

    const T0: i64 = 1_700_000_000;

    struct TestNode {
        state: AppState,
        clock: Arc<ManualClock>,
        admin: Keypair,
    }

    impl TestNode {
        fn new() -> Self {
            let clock = Arc::new(ManualClock::new(T0));
            let bank = Arc::new(Bank::new(
                LedgerDb::open_temporary().expect("temp db"),
                VaultProgram::new(),
                Arc::clone(&clock) as Arc<dyn Clock>,
            ));
            let admin = Keypair::generate();
            assert!(bootstrap_program_config(&bank, &admin).unwrap());
            let (event_tx, _) = broadcast::channel(16);
            let state = AppState {
                version: "0.1.0-test".into(),
                network: "devnet".into(),
                bank,
                event_tx,
                metrics: Arc::new(crate::metrics::NodeMetrics::new().unwrap()),
                airdrop_enabled: true,
            };
            Self { state, clock, admin }
        }

        fn router(&self) -> Router {
            create_router(self.state.clone())
        }

        fn funded(&self, lamports: u64) -> Keypair {
            let kp = Keypair::generate();
            self.state.bank.airdrop(&kp.pubkey(), lamports).unwrap();
            kp
        }
    }

    // -- Helpers --

    async fn get(router: &Router, path: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn rpc(router: &Router, method: &str, params: serde_json::Value) -> JsonRpcResponse {
        let body = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": 1 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(router: &Router, msg: Message, signer: &Keypair) -> JsonRpcResponse {
        let wire = Transaction::new_signed(msg, signer).to_base58().unwrap();
        rpc(router, "sendTransaction", serde_json::json!([wire])).await
    }

    // -- 1. Health and status --------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let node = TestNode::new();
        let (status, json) = get(&node.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_bootstrapped_config() {
        let node = TestNode::new();
        let (status, json) = get(&node.router(), "/status").await;
        assert_eq!(status, StatusCode::OK);

        let resp: StatusResponse = serde_json::from_value(json).unwrap();
        assert_eq!(resp.clock, T0);
        assert_eq!(resp.processed_transactions, 1);
        assert_eq!(resp.program_id, PROGRAM_ID.to_base58());
        let config = resp.program_config.expect("config bootstrapped");
        assert_eq!(config.admin, node.admin.pubkey().to_base58());
        assert_eq!(config.penalty_bps, 1_000);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let node = TestNode::new();
        assert!(!bootstrap_program_config(&node.state.bank, &node.admin).unwrap());
        let other = Keypair::generate();
        assert!(!bootstrap_program_config(&node.state.bank, &other).unwrap());
        let config = lookup_program_config(&node.state.bank).unwrap();
        assert_eq!(config.admin, node.admin.pubkey().to_base58());
    }

    // -- 2. Account and vault lookups ------------------------------------------

    #[tokio::test]
    async fn account_endpoint_for_unknown_address() {
        let node = TestNode::new();
        let nobody = Keypair::generate().pubkey();
        let (status, json) = get(&node.router(), &format!("/accounts/{nobody}")).await;
        assert_eq!(status, StatusCode::OK);
        let resp: AccountResponse = serde_json::from_value(json).unwrap();
        assert!(!resp.exists);
        assert_eq!(resp.lamports, 0);
    }

    #[tokio::test]
    async fn account_endpoint_rejects_bad_address() {
        let node = TestNode::new();
        let (status, json) = get(&node.router(), "/accounts/not-base58!").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("invalid address"));
    }

    #[tokio::test]
    async fn vault_endpoint_before_and_after_initialize() {
        let node = TestNode::new();
        let router = node.router();
        let alice = node.funded(10 * LAMPORTS_PER_SOL);

        let (_, json) = get(&router, &format!("/vaults/{}", alice.pubkey())).await;
        let resp: VaultResponse = serde_json::from_value(json).unwrap();
        assert!(resp.vault.is_none());
        assert_eq!(resp.custody_lamports, 0);

        let reply = send(&router, instruction::initialize(&alice.pubkey(), 100).unwrap(), &alice).await;
        assert!(reply.error.is_none(), "{:?}", reply.error);
        let reply = send(&router, instruction::deposit(&alice.pubkey(), 2_000).unwrap(), &alice).await;
        assert!(reply.error.is_none(), "{:?}", reply.error);

        let (_, json) = get(&router, &format!("/vaults/{}", alice.pubkey())).await;
        let resp: VaultResponse = serde_json::from_value(json).unwrap();
        let vault = resp.vault.expect("vault exists");
        assert_eq!(vault.status, "Active");
        assert_eq!(vault.principal_deposited, 2_000);
        assert_eq!(vault.maturity, Some(T0 + 100));
        assert!(!vault.mature);
        assert_eq!(resp.custody_lamports, CUSTODY_RESERVE + 2_000);

        node.clock.advance(100);
        let (_, json) = get(&router, &format!("/vaults/{}", alice.pubkey())).await;
        assert_eq!(json["vault"]["mature"], true);
    }

    // -- 3. JSON-RPC -----------------------------------------------------------

    #[tokio::test]
    async fn rpc_derive_matches_contract_derivation() {
        let node = TestNode::new();
        let owner = Keypair::generate().pubkey();
        let resp = rpc(&node.router(), "deriveVaultAddresses", serde_json::json!([owner.to_base58()])).await;
        let view: AddressesView = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(view, AddressesView::from(&VaultAddresses::derive(&owner).unwrap()));
    }

    #[tokio::test]
    async fn rpc_airdrop_then_balance() {
        let node = TestNode::new();
        let router = node.router();
        let mut events = node.state.event_tx.subscribe();
        let who = Keypair::generate().pubkey().to_base58();

        let resp = rpc(&router, "requestAirdrop", serde_json::json!([who, 5_000])).await;
        assert_eq!(resp.result.unwrap()["balance"], 5_000);
        let resp = rpc(&router, "getBalance", serde_json::json!([who])).await;
        assert_eq!(resp.result.unwrap(), serde_json::json!(5_000));

        match events.recv().await.unwrap() {
            VaultEvent::Airdrop { lamports, .. } => assert_eq!(lamports, 5_000),
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(node.state.metrics.airdrops_total.get(), 1);
    }

    #[tokio::test]
    async fn rpc_airdrop_limits() {
        let mut node = TestNode::new();
        let who = Keypair::generate().pubkey().to_base58();

        let resp = rpc(&node.router(), "requestAirdrop", serde_json::json!([who, MAX_AIRDROP_LAMPORTS + 1])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::INVALID_PARAMS);

        node.state.airdrop_enabled = false;
        let resp = rpc(&node.router(), "requestAirdrop", serde_json::json!([who, 1])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::AIRDROP_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rpc_program_rejection_carries_vault_error() {
        let node = TestNode::new();
        let router = node.router();
        let alice = node.funded(10 * LAMPORTS_PER_SOL);
        send(&router, instruction::initialize(&alice.pubkey(), 3_600).unwrap(), &alice).await;

        let resp = send(&router, instruction::mature_close(&alice.pubkey()).unwrap(), &alice).await;
        let err = resp.error.expect("not mature");
        assert_eq!(err.code, rpc_codes::PROGRAM_ERROR);
        let data = err.data.unwrap();
        assert_eq!(data["code"], VaultError::NotMatureYet.code());
        assert_eq!(data["name"], "NotMatureYet");

        let text = node.state.metrics.encode().unwrap();
        assert!(text.contains("reason=\"NotMatureYet\""));
        assert!(text.contains("instruction=\"mature_close\""));
    }

    #[tokio::test]
    async fn rpc_replay_is_rejected_by_runtime() {
        let node = TestNode::new();
        let router = node.router();
        let alice = node.funded(LAMPORTS_PER_SOL);
        let bob = Keypair::generate().pubkey();
        let wire = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 10), &alice)
            .to_base58()
            .unwrap();

        let first = rpc(&router, "sendTransaction", serde_json::json!([wire])).await;
        assert!(first.error.is_none());
        let receipt: TransactionReceipt = serde_json::from_value(first.result.unwrap()).unwrap();
        assert_eq!(receipt.timestamp, T0);

        let second = rpc(&router, "sendTransaction", serde_json::json!([wire])).await;
        assert_eq!(second.error.unwrap().code, rpc_codes::TRANSACTION_REJECTED);
        assert_eq!(node.state.bank.balance(&bob).unwrap(), 10);
    }

    #[tokio::test]
    async fn rpc_send_transaction_rejects_garbage() {
        let node = TestNode::new();
        let resp = rpc(&node.router(), "sendTransaction", serde_json::json!(["0OIl"])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::INVALID_PARAMS);
        let resp = rpc(&node.router(), "sendTransaction", serde_json::json!([])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn rpc_committed_transaction_is_broadcast() {
        let node = TestNode::new();
        let router = node.router();
        let mut events = node.state.event_tx.subscribe();
        let alice = node.funded(10 * LAMPORTS_PER_SOL);

        send(&router, instruction::initialize(&alice.pubkey(), 60).unwrap(), &alice).await;
        match events.recv().await.unwrap() {
            VaultEvent::TransactionCommitted { instruction, signer, timestamp, .. } => {
                assert_eq!(instruction, "initialize");
                assert_eq!(signer, alice.pubkey().to_base58());
                assert_eq!(timestamp, T0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn rpc_get_account_info_and_version() {
        let node = TestNode::new();
        let router = node.router();

        let missing = Keypair::generate().pubkey().to_base58();
        let resp = rpc(&router, "getAccountInfo", serde_json::json!([missing])).await;
        assert_eq!(resp.result.unwrap(), serde_json::Value::Null);

        let admin = node.admin.pubkey().to_base58();
        let resp = rpc(&router, "getAccountInfo", serde_json::json!([admin])).await;
        let info: AccountResponse = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(info.exists);
        assert_eq!(info.owner, SYSTEM_PROGRAM_ID.to_base58());

        let resp = rpc(&router, "getVersion", serde_json::json!([])).await;
        assert_eq!(resp.result.unwrap()["protocol"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn rpc_invalid_version_and_unknown_method() {
        let node = TestNode::new();
        let router = node.router();

        let body = serde_json::json!({ "jsonrpc": "1.0", "method": "getHealth", "id": 20 });
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let bytes = router.clone().oneshot(req).await.unwrap().into_body().collect().await.unwrap().to_bytes();
        let resp: JsonRpcResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(resp.error.unwrap().code, rpc_codes::INVALID_REQUEST);

        let resp = rpc(&router, "getBlock", serde_json::json!([0])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::METHOD_NOT_FOUND);

        let resp = rpc(&router, "getBalance", serde_json::json!([42])).await;
        assert_eq!(resp.error.unwrap().code, rpc_codes::INVALID_PARAMS);
    }
}
