//! HTTP server: health, metrics, read surface, devnet submissions
//!
//! Submissions take the caller address in the request body. That is only
//! acceptable because the chains are an in-process devnet; there is no wallet
//! or signature check in front of them.

use std::net::SocketAddr;
use std::sync::Arc;

use alloy::primitives::{Address, B256};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bridge_core::{
    parse_account, Attestation, BridgeError, DomainId, Message, MessageStatus, ProcessedMessage,
};
use chrono::{DateTime, Utc};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics::Metrics;
use crate::network::Network;
use crate::relayer::SharedStats;
use crate::store::AttestationStore;

pub type SharedMetrics = Arc<Metrics>;

/// Combined app state
#[derive(Clone)]
pub struct AppState {
    pub network: Arc<Network>,
    pub store: Arc<AttestationStore>,
    pub stats: SharedStats,
    pub metrics: SharedMetrics,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Bridge(BridgeError),
    BadRequest(String),
    NotFound(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// HTTP status for a core error
pub fn status_for(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::UnknownDomain { .. } => StatusCode::NOT_FOUND,
        BridgeError::DuplicateNonce { .. }
        | BridgeError::AlreadyRegistered { .. }
        | BridgeError::DomainConflict { .. } => StatusCode::CONFLICT,
        BridgeError::BridgePaused => StatusCode::SERVICE_UNAVAILABLE,
        BridgeError::UnmatchedMint { .. } | BridgeError::LedgerOverflow { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::BAD_REQUEST,
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        ApiError::Bridge(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Bridge(e) => (
                status_for(&e),
                ErrorBody {
                    error: e.to_string(),
                    kind: e.kind(),
                },
            ),
            ApiError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error,
                    kind: "bad_request",
                },
            ),
            ApiError::NotFound(error) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error,
                    kind: "not_found",
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn parse_address(value: &str) -> Result<Address, ApiError> {
    parse_account(value).map_err(|e| ApiError::BadRequest(format!("Invalid address '{}': {}", value, e)))
}

fn parse_amount(value: &str) -> Result<u128, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid amount '{}'", value)))
}

// ============================================================================
// Health & metrics
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub governance: String,
    pub domains: usize,
    pub pending: usize,
    pub delivered: u64,
    pub abandoned: u64,
    pub attestations_signed: u64,
    pub total_locked: String,
    pub conservation_ok: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.stats.read().await;
    let ledger = state.network.ledger();
    Json(HealthResponse {
        status: "healthy".to_string(),
        governance: state.network.governance().to_string(),
        domains: state.network.domains().len(),
        pending: stats.pending,
        delivered: stats.delivered,
        abandoned: stats.abandoned,
        attestations_signed: state.metrics.attestations_signed_total.get(),
        total_locked: ledger.total_locked().to_string(),
        conservation_ok: ledger.check_conservation(),
    })
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Ready once the relayer is running and every domain can reach quorum
async fn readiness(State(state): State<AppState>) -> &'static str {
    let started = state.stats.read().await.started;
    if started && state.network.quorum_attainable() {
        "OK"
    } else {
        "NOT_READY"
    }
}

async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    let pending = state.stats.read().await.pending;
    state.metrics.pending_queue_depth.set(pending as i64);
    state
        .metrics
        .set_total_locked(state.network.ledger().total_locked());

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry.gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

// ============================================================================
// Domains & registries
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct DomainInfo {
    pub id: u32,
    pub name: String,
    pub policy: String,
    pub min_signatures: u32,
    pub total_attesters: u32,
    pub attester_count: usize,
    pub quorum_attainable: bool,
    pub paused: bool,
    pub next_nonce: u64,
    pub total_supply: String,
}

async fn list_domains(State(state): State<AppState>) -> ApiResult<Vec<DomainInfo>> {
    let mut domains = Vec::new();
    for (id, name) in state.network.domains().iter() {
        let chain = state.network.chain(id)?.lock().await;
        let registry = chain.registry();
        let policy = registry.policy();
        let attester_count = registry.attester_count();
        domains.push(DomainInfo {
            id: id.to_u32(),
            name: name.to_string(),
            policy: policy.to_string(),
            min_signatures: policy.min_signatures(),
            total_attesters: policy.total_attesters(),
            attester_count,
            quorum_attainable: policy.is_met(attester_count),
            paused: chain.transmitter().is_paused(),
            next_nonce: chain.transmitter().next_nonce(),
            total_supply: chain.messenger().total_supply().to_string(),
        });
    }
    Ok(Json(domains))
}

#[derive(Serialize, Deserialize)]
pub struct AttesterInfo {
    pub address: String,
    pub registered_at: DateTime<Utc>,
}

async fn list_attesters(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<Vec<AttesterInfo>> {
    let registry = state.network.registry(DomainId::from_u32(id))?;
    Ok(Json(
        registry
            .attesters()
            .into_iter()
            .map(|a| AttesterInfo {
                address: a.address.to_string(),
                registered_at: a.registered_at,
            })
            .collect(),
    ))
}

#[derive(Serialize, Deserialize)]
pub struct AttesterStatus {
    pub domain: u32,
    pub address: String,
    pub is_attester: bool,
    pub registered_at: Option<DateTime<Utc>>,
}

async fn get_attester(
    State(state): State<AppState>,
    Path((id, address)): Path<(u32, String)>,
) -> ApiResult<AttesterStatus> {
    let registry = state.network.registry(DomainId::from_u32(id))?;
    let address = parse_address(&address)?;
    let record = registry.attester(address).filter(|a| a.active);
    Ok(Json(AttesterStatus {
        domain: id,
        address: address.to_string(),
        is_attester: record.is_some(),
        registered_at: record.map(|a| a.registered_at),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct OracleSetInfo {
    pub domain: u32,
    pub policy: String,
    pub oracle_count: usize,
    pub oracles: Vec<String>,
}

async fn list_oracles(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<OracleSetInfo> {
    let registry = state.network.registry(DomainId::from_u32(id))?;
    Ok(Json(OracleSetInfo {
        domain: id,
        policy: registry.policy().to_string(),
        oracle_count: registry.oracle_count(),
        oracles: registry
            .attesters()
            .into_iter()
            .map(|a| a.address.to_string())
            .collect(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct OracleStatus {
    pub domain: u32,
    pub address: String,
    pub is_oracle: bool,
}

async fn get_oracle(
    State(state): State<AppState>,
    Path((id, address)): Path<(u32, String)>,
) -> ApiResult<OracleStatus> {
    let registry = state.network.registry(DomainId::from_u32(id))?;
    let address = parse_address(&address)?;
    Ok(Json(OracleStatus {
        domain: id,
        address: address.to_string(),
        is_oracle: registry.is_oracle(address),
    }))
}

// ============================================================================
// Balances, deposits, faucet
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct BalanceResponse {
    pub domain: u32,
    pub address: String,
    pub balance: String,
}

async fn get_balance(
    State(state): State<AppState>,
    Path((id, address)): Path<(u32, String)>,
) -> ApiResult<BalanceResponse> {
    let account = parse_address(&address)?;
    let balance = state
        .network
        .balance_of(DomainId::from_u32(id), account)
        .await?;
    Ok(Json(BalanceResponse {
        domain: id,
        address: account.to_string(),
        balance: balance.to_string(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct FaucetRequest {
    pub account: String,
    pub amount: String,
}

async fn faucet(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<FaucetRequest>,
) -> ApiResult<BalanceResponse> {
    let account = parse_address(&req.account)?;
    let amount = parse_amount(&req.amount)?;
    let balance = state
        .network
        .fund(DomainId::from_u32(id), account, amount)
        .await?;
    Ok(Json(BalanceResponse {
        domain: id,
        address: account.to_string(),
        balance: balance.to_string(),
    }))
}

#[derive(Serialize, Deserialize)]
pub struct DepositRequest {
    pub caller: String,
    pub amount: String,
    pub dest_domain: u32,
    pub recipient: String,
}

#[derive(Serialize, Deserialize)]
pub struct DepositResponse {
    pub source_domain: u32,
    pub dest_domain: u32,
    pub nonce: u64,
    pub hash: String,
}

async fn deposit(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(req): Json<DepositRequest>,
) -> ApiResult<DepositResponse> {
    let caller = parse_address(&req.caller)?;
    let recipient = parse_address(&req.recipient)?;
    let amount = parse_amount(&req.amount)?;

    let message = state
        .network
        .deposit_for_burn(
            DomainId::from_u32(id),
            caller,
            amount,
            DomainId::from_u32(req.dest_domain),
            recipient,
        )
        .await?;

    Ok(Json(DepositResponse {
        source_domain: message.source_domain.to_u32(),
        dest_domain: message.dest_domain.to_u32(),
        nonce: message.nonce,
        hash: message.hash_hex(),
    }))
}

// ============================================================================
// Ledger
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct LedgerEntryInfo {
    pub chain_id: u32,
    pub name: Option<String>,
    pub total_locked: String,
}

#[derive(Serialize, Deserialize)]
pub struct InTransitInfo {
    pub source_domain: u32,
    pub nonce: u64,
    pub amount: String,
    pub account: String,
    pub tx_ref: String,
}

#[derive(Serialize, Deserialize)]
pub struct LedgerResponse {
    pub total_locked: String,
    pub conservation_ok: bool,
    pub settled: u64,
    pub entries: Vec<LedgerEntryInfo>,
    pub in_transit: Vec<InTransitInfo>,
}

async fn get_ledger(State(state): State<AppState>) -> Json<LedgerResponse> {
    let ledger = state.network.ledger();
    let domains = state.network.domains();
    Json(LedgerResponse {
        total_locked: ledger.total_locked().to_string(),
        conservation_ok: ledger.check_conservation(),
        settled: ledger.settled_count(),
        entries: ledger
            .entries()
            .into_iter()
            .map(|e| LedgerEntryInfo {
                chain_id: e.chain_id.to_u32(),
                name: domains.name_of(e.chain_id).map(str::to_string),
                total_locked: e.total_locked.to_string(),
            })
            .collect(),
        in_transit: ledger
            .in_transit()
            .into_iter()
            .map(|t| InTransitInfo {
                source_domain: t.source_domain.to_u32(),
                nonce: t.nonce,
                amount: t.burn.amount.to_string(),
                account: t.burn.account.to_string(),
                tx_ref: t.burn.tx_ref.to_string(),
            })
            .collect(),
    })
}

async fn get_ledger_entry(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<LedgerEntryInfo> {
    let domain = DomainId::from_u32(id);
    let name = state
        .network
        .domains()
        .name_of(domain)
        .ok_or(BridgeError::UnknownDomain { domain })?;
    Ok(Json(LedgerEntryInfo {
        chain_id: id,
        name: Some(name.to_string()),
        total_locked: state.network.ledger().locked_for_chain(domain).to_string(),
    }))
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub status: MessageStatus,
    pub hash: String,
    /// Attestations in the store, valid or not
    pub attestations: usize,
    /// Distinct attestations the destination registry would accept now
    pub valid_attestations: usize,
    pub required: u32,
    pub processed_at: Option<DateTime<Utc>>,
    pub message: Message,
}

async fn get_message(
    State(state): State<AppState>,
    Path((source, nonce)): Path<(u32, u64)>,
) -> ApiResult<MessageResponse> {
    let source = DomainId::from_u32(source);
    let message = state
        .network
        .sent_message(source, nonce)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No message {} from domain {}", nonce, source)))?;

    let hash = B256::from(message.hash());
    let attestations = state.store.attestations_for(&hash).await;
    let registry = state.network.registry(message.dest_domain)?;
    let valid_attestations = registry.count_valid(&hash, &attestations);
    let required = registry.policy().min_signatures();

    let processed = state
        .network
        .processed(message.dest_domain, source, nonce)
        .await?;

    let status = if processed.is_some() {
        MessageStatus::Processed
    } else if registry.policy().is_met(valid_attestations) {
        MessageStatus::Attested
    } else {
        MessageStatus::Sent
    };

    Ok(Json(MessageResponse {
        status,
        hash: message.hash_hex(),
        attestations: attestations.len(),
        valid_attestations,
        required,
        processed_at: processed.map(|p| p.processed_at),
        message,
    }))
}

/// Relay submission: a message plus the attestations gathered for it
#[derive(Serialize, Deserialize)]
pub struct ReceiveRequest {
    pub message: Message,
    pub attestations: Vec<Attestation>,
}

async fn receive_message(
    State(state): State<AppState>,
    Json(req): Json<ReceiveRequest>,
) -> ApiResult<ProcessedMessage> {
    let record = state.network.deliver(&req.message, &req.attestations).await?;
    Ok(Json(record))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness))
        .route("/metrics", get(prometheus_metrics))
        .route("/domains", get(list_domains))
        .route("/domains/{id}/attesters", get(list_attesters))
        .route("/domains/{id}/attesters/{address}", get(get_attester))
        .route("/domains/{id}/oracles", get(list_oracles))
        .route("/domains/{id}/oracles/{address}", get(get_oracle))
        .route("/domains/{id}/balances/{address}", get(get_balance))
        .route("/domains/{id}/deposits", post(deposit))
        .route("/domains/{id}/faucet", post(faucet))
        .route("/ledger", get(get_ledger))
        .route("/ledger/{id}", get(get_ledger_entry))
        .route("/messages", post(receive_message))
        .route("/messages/{source}/{nonce}", get(get_message))
        .with_state(state)
}

/// Serve on an already-bound listener
pub async fn serve(listener: TcpListener, state: AppState) -> eyre::Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Start the HTTP server
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("API server listening on {}", addr);
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");
    info!("  /domains, /ledger, /messages - Read surface");

    let listener = TcpListener::bind(addr).await?;
    serve(listener, state).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let domain = DomainId::from_u32(9);
        assert_eq!(
            status_for(&BridgeError::UnknownDomain { domain }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&BridgeError::DuplicateNonce {
                source_domain: domain,
                nonce: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&BridgeError::BridgePaused),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&BridgeError::InsufficientBalance {
                available: 0,
                requested: 1
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_for(&BridgeError::Unauthorized), StatusCode::BAD_REQUEST);
    }
}
