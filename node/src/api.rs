//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the node's HTTP interface. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                            |
//! |--------|-----------------------------|----------------------------------------|
//! | GET    | `/health`                   | Liveness probe                         |
//! | GET    | `/status`                   | Node status summary                    |
//! | POST   | `/rpc`                      | JSON-RPC 2.0 gateway                   |
//! | GET    | `/ws`                       | WebSocket for live ledger events       |
//! | GET    | `/wallets`                  | Wallet index (id and balance)          |
//! | GET    | `/wallets/:id`              | Full wallet record                     |
//! | GET    | `/wallets/:id/movements`    | Wallet journal, oldest first           |
//! | GET    | `/supply`                   | Global coin supply                     |
//! | GET    | `/merchants`                | Hosted merchants                       |
//! | GET    | `/merchants/:name`          | Merchant rate and coin pool            |
//! | GET    | `/merchants/:name/journal`  | Merchant exchange journal              |
//! | POST   | `/merchants/:name/buy`      | Record a purchase                      |
//!
//! ## JSON-RPC
//!
//! `method` is a gateway function name and `params` an array of string
//! arguments (numbers are accepted and passed on in their JSON form). The
//! result is the gateway's JSON response.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use loyalty_ledger::gateway::Function;
use loyalty_ledger::{Coins, Gateway, GatewayError, LedgerDb, LedgerError};
use loyalty_merchants::{Merchant, MerchantError, MerchantPool};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// A merchant hosted by the node: ledger access through the in-process
/// gateway, bookkeeping in its own database.
pub type NodeMerchant = Merchant<Gateway<LedgerDb>, LedgerDb>;

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    pub started_at: DateTime<Utc>,
    /// Gateway over the node's ledger.
    pub gateway: Gateway<LedgerDb>,
    /// Hosted merchants by name.
    pub merchants: Arc<BTreeMap<String, Arc<NodeMerchant>>>,
    /// Human-readable limit-reset cadence, reported by `/status`.
    pub reset_schedule: String,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .route("/wallets", get(wallets_handler))
        .route("/wallets/:id", get(wallet_handler))
        .route("/wallets/:id/movements", get(movements_handler))
        .route("/supply", get(supply_handler))
        .route("/merchants", get(merchants_handler))
        .route("/merchants/:name", get(merchant_handler))
        .route("/merchants/:name/journal", get(merchant_journal_handler))
        .route("/merchants/:name/buy", post(buy_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// Gateway function to call.
    pub method: String,
    /// Positional string arguments.
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// JSON-RPC error codes.
pub mod rpc_code {
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;
    pub const NOT_FOUND: i32 = -32001;
    pub const ALREADY_EXISTS: i32 = -32002;
    pub const INSUFFICIENT_FUNDS: i32 = -32003;
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<&GatewayError> for JsonRpcError {
    fn from(err: &GatewayError) -> Self {
        let code = match err {
            GatewayError::UnknownFunction(_) => rpc_code::METHOD_NOT_FOUND,
            GatewayError::Ledger(LedgerError::InvalidArgument(_)) => rpc_code::INVALID_PARAMS,
            GatewayError::Ledger(LedgerError::NotFound(_)) => rpc_code::NOT_FOUND,
            GatewayError::Ledger(LedgerError::AlreadyExists(_)) => rpc_code::ALREADY_EXISTS,
            GatewayError::Ledger(LedgerError::InsufficientFunds { .. }) => {
                rpc_code::INSUFFICIENT_FUNDS
            }
            _ => rpc_code::INTERNAL,
        };
        JsonRpcError::new(code, err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    pub wallets: usize,
    pub coin_supply: Coins,
    pub merchants: Vec<String>,
    /// Limit-reset cadence, e.g. `every 1 days at 00:00`.
    pub reset_schedule: String,
    pub uptime_secs: i64,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /supply`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SupplyResponse {
    pub total: Coins,
}

/// Response payload for `GET /merchants/:name`.
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantResponse {
    pub name: String,
    /// Coins earned per currency unit, as a decimal string.
    pub rate: String,
    pub open: bool,
    pub pool: Option<MerchantPool>,
}

/// Request body for `POST /merchants/:name/buy`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuyRequest {
    pub wallet: String,
    /// Purchase total in currency units.
    pub total: Coins,
    /// Coins the customer spends on this purchase.
    #[serde(default)]
    pub redeemed: Coins,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn ledger_error_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyExists(_) => StatusCode::CONFLICT,
        LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Storage(_) | LedgerError::Corrupt { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ledger_error_response(err: LedgerError) -> Response {
    let status = ledger_error_status(&err);
    if status.is_server_error() {
        tracing::error!(error = %err, "ledger read failed");
    }
    error_response(status, err.to_string())
}

fn merchant_error_response(err: MerchantError) -> Response {
    let status = match &err {
        MerchantError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        MerchantError::NotOpen(_) => StatusCode::CONFLICT,
        MerchantError::InsufficientFunds { .. } | MerchantError::InsufficientPool { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        MerchantError::Client(GatewayError::Ledger(e)) => ledger_error_status(e),
        MerchantError::Client(_) | MerchantError::Storage(_) | MerchantError::Decode { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "merchant operation failed");
    }
    error_response(status, err.to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` - returns 200 if the node is alive.
///
/// Liveness only; the ledger is not touched.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` - node status summary.
async fn status_handler(State(state): State<AppState>) -> Response {
    let ledger = state.gateway.ledger();
    let summary = ledger
        .wallets()
        .and_then(|wallets| Ok((wallets.len(), ledger.total_coin()?)));
    let (wallets, coin_supply) = match summary {
        Ok(summary) => summary,
        Err(e) => return ledger_error_response(e),
    };
    state.metrics.observe_supply(coin_supply);

    let now = Utc::now();
    Json(StatusResponse {
        version: state.version.clone(),
        wallets,
        coin_supply,
        merchants: state.merchants.keys().cloned().collect(),
        reset_schedule: state.reset_schedule.clone(),
        uptime_secs: (now - state.started_at).num_seconds(),
        timestamp: now.to_rfc3339(),
    })
    .into_response()
}

/// `POST /rpc` - JSON-RPC 2.0 gateway.
///
/// Invoke and query functions share the endpoint; the gateway routes by
/// function name.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> Json<JsonRpcResponse> {
    let timer = state.metrics.rpc_latency_seconds.start_timer();
    let label = req
        .method
        .parse::<Function>()
        .map(|f| f.name())
        .unwrap_or("unknown");
    state.metrics.rpc_calls_total.with_label_values(&[label]).inc();

    let outcome = if req.jsonrpc != "2.0" {
        Err(JsonRpcError::new(
            rpc_code::INVALID_REQUEST,
            "Invalid Request: jsonrpc must be \"2.0\"",
        ))
    } else {
        match rpc_args(req.params.as_ref()) {
            Ok(args) => call_gateway(&state.gateway, &req.method, &args),
            Err(e) => Err(e),
        }
    };
    timer.observe_duration();

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => {
            state.metrics.rpc_errors_total.inc();
            (None, Some(e))
        }
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// Flattens `params` into gateway arguments.
fn rpc_args(params: Option<&serde_json::Value>) -> Result<Vec<String>, JsonRpcError> {
    let items = match params {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            return Err(JsonRpcError::new(
                rpc_code::INVALID_PARAMS,
                "Invalid params: expected an array of strings",
            ))
        }
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::String(s) => Ok(s.clone()),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            _ => Err(JsonRpcError::new(
                rpc_code::INVALID_PARAMS,
                format!("Invalid params: argument {i} is not a string"),
            )),
        })
        .collect()
}

fn call_gateway(
    gateway: &Gateway<LedgerDb>,
    method: &str,
    args: &[String],
) -> Result<serde_json::Value, JsonRpcError> {
    match gateway.dispatch(method, args) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| JsonRpcError::new(rpc_code::INTERNAL, format!("Internal error: {e}"))),
        Err(e) => {
            let rpc_err = JsonRpcError::from(&e);
            if rpc_err.code == rpc_code::INTERNAL {
                tracing::error!(method, error = %e, "rpc call failed");
            } else {
                tracing::debug!(method, error = %e, "rpc call rejected");
            }
            Err(rpc_err)
        }
    }
}

/// `GET /wallets` - every wallet with its balance.
async fn wallets_handler(State(state): State<AppState>) -> Response {
    match state.gateway.ledger().wallets() {
        Ok(wallets) => Json(wallets).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /wallets/:id` - the full wallet record. 404 if unknown.
async fn wallet_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    match state.gateway.ledger().wallet(&id) {
        Ok(wallet) => Json(wallet).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /wallets/:id/movements` - the wallet's journal.
///
/// An unknown wallet has an empty journal, so this never returns 404.
async fn movements_handler(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    match state.gateway.ledger().movements(Some(id.as_str())).collect_vec() {
        Ok(movements) => Json(movements).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /supply` - the global coin supply.
async fn supply_handler(State(state): State<AppState>) -> Response {
    match state.gateway.ledger().total_coin() {
        Ok(total) => {
            state.metrics.observe_supply(total);
            Json(SupplyResponse { total }).into_response()
        }
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /merchants` - names of the hosted merchants.
async fn merchants_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.merchants.keys().cloned().collect::<Vec<_>>())
}

fn find_merchant(state: &AppState, name: &str) -> Result<Arc<NodeMerchant>, Response> {
    state.merchants.get(name).cloned().ok_or_else(|| {
        error_response(StatusCode::NOT_FOUND, format!("Unknown merchant: {name}"))
    })
}

/// `GET /merchants/:name` - rate and pool. `pool` is null until the
/// merchant opens.
async fn merchant_handler(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    let merchant = match find_merchant(&state, &name) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let pool = match merchant.pool() {
        Ok(pool) => Some(pool),
        Err(MerchantError::NotOpen(_)) => None,
        Err(e) => return merchant_error_response(e),
    };
    Json(MerchantResponse {
        name: merchant.name().to_string(),
        rate: merchant.profile().rate.to_string(),
        open: pool.is_some(),
        pool,
    })
    .into_response()
}

/// `GET /merchants/:name/journal` - the merchant's exchange journal.
async fn merchant_journal_handler(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Response {
    let merchant = match find_merchant(&state, &name) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match merchant.journal() {
        Ok(records) => Json(records).into_response(),
        Err(e) => merchant_error_response(e),
    }
}

/// `POST /merchants/:name/buy` - records a purchase for a customer.
async fn buy_handler(
    Path(name): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<BuyRequest>,
) -> Response {
    let merchant = match find_merchant(&state, &name) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match merchant.buy(&req.wallet, req.total, req.redeemed) {
        Ok(purchase) => {
            state.metrics.purchases_total.inc();
            (StatusCode::CREATED, Json(purchase)).into_response()
        }
        Err(e) => merchant_error_response(e),
    }
}

/// `GET /ws` - WebSocket upgrade for live ledger events.
///
/// Clients receive each [`LedgerEvent`](loyalty_ledger::LedgerEvent) as a
/// JSON text frame. The connection is push-only; client messages are
/// ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding ledger events until the
/// client disconnects or the ledger goes away.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.gateway.ledger().subscribe();
    state.metrics.ws_subscribers.inc();

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
                        if socket.send(Message::Text(payload)).await.is_err() {
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
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }

    state.metrics.ws_subscribers.dec();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
