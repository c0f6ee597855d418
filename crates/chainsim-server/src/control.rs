//! `/control/*` — the administrative surface.
//!
//! Every POST endpoint takes a JSON body and answers
//! `{"success": bool, "message": string}`. A missing or empty `chain` field
//! addresses every chain. Chains are addressed by key (`"1"`, `"501"`) or by
//! name (`"ethereum"`, `"solana"`).

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chainsim_core::{ControlError, ErrorConfig, PRESET_NAMES};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::AppState;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

impl ControlResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

type ControlResult = Result<Json<ControlResponse>, ApiError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/control/connections/drop", post(drop_connections))
        .route("/control/block/set", post(set_block))
        .route("/control/block/pause", post(pause))
        .route("/control/block/resume", post(resume))
        .route("/control/block/pause_updates", post(pause_updates))
        .route("/control/block/resume_updates", post(resume))
        .route("/control/block/interval", post(set_interval))
        .route("/control/block/interrupt", post(interrupt))
        .route("/control/block/resume_interrupt", post(resume_interrupt))
        .route("/control/block/logs_per_block", post(set_logs_per_block))
        .route("/control/timeout/set", post(set_timeout))
        .route("/control/timeout/clear", post(clear_timeout))
        .route("/control/chain/reorg", post(reorg))
        .route("/control/latency", post(set_latency))
        .route("/control/errors", get(list_errors))
        .route("/control/errors/probability", post(set_error_probability))
        .route("/control/errors/add", post(add_error))
        .route("/control/errors/preset", post(add_preset))
        .route("/control/errors/presets", get(list_presets))
        .route("/control/errors/remove", post(remove_error))
        .route("/control/errors/clear", post(clear_errors))
        .route("/control/response/custom", post(set_custom_response))
        .route("/control/response/clear", post(clear_custom_response))
        .route("/control/config", get(export_config))
}

// ─── Bodies ──────────────────────────────────────────────────────────────────

/// Parse a body where every field is optional; an empty body is the default.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

fn required_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

fn scope(selector: &str) -> String {
    if selector.is_empty() || selector == "all" {
        "all chains".to_string()
    } else {
        format!("chain {selector}")
    }
}

fn seconds(value: f64) -> Result<Duration, ControlError> {
    Duration::try_from_secs_f64(value)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or(ControlError::InvalidInterval)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChainBody {
    chain: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DropBody {
    block_duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct SetBlockBody {
    chain: String,
    block_number: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PauseUpdatesBody {
    chain: String,
    duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct IntervalBody {
    #[serde(default)]
    chain: String,
    interval_seconds: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogsPerBlockBody {
    chain: String,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct TimeoutBody {
    #[serde(default)]
    chain: String,
    timeout_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct ReorgBody {
    chain: String,
    depth: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LatencyBody {
    chain: String,
    latency_ms: u64,
}

#[derive(Debug, Deserialize)]
struct ProbabilityBody {
    #[serde(default)]
    chain: String,
    probability: f64,
}

#[derive(Debug, Deserialize)]
struct AddErrorBody {
    #[serde(default)]
    chain: String,
    #[serde(flatten)]
    config: ErrorConfig,
}

#[derive(Debug, Deserialize)]
struct PresetBody {
    #[serde(default)]
    chain: String,
    preset: String,
    probability: f64,
}

#[derive(Debug, Deserialize)]
struct RemoveErrorBody {
    chain: String,
    index: usize,
}

/// `response` is either a JSON value used as-is or a string holding raw JSON.
#[derive(Debug, Deserialize)]
struct CustomResponseBody {
    #[serde(default)]
    chain: String,
    response: Value,
    #[serde(default)]
    methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorsQuery {
    chain: String,
}

// ─── Connections ─────────────────────────────────────────────────────────────

async fn drop_connections(State(state): State<AppState>, body: Bytes) -> ControlResult {
    // A malformed body still drops; it only loses the block duration.
    let req: DropBody = optional_body(&body).unwrap_or_default();
    let subscriptions = state.simulator().drop_all();
    let connections = state.tracker.close_all();
    tracing::info!(subscriptions, connections, "dropped all connections");

    if req.block_duration_seconds > 0 {
        state.gate.block_for(Duration::from_secs(req.block_duration_seconds));
        return Ok(ControlResponse::ok(format!(
            "Dropped all connections and blocked new connections for {}s",
            req.block_duration_seconds
        )));
    }
    Ok(ControlResponse::ok("Dropped all connections"))
}

// ─── Heights & flow ──────────────────────────────────────────────────────────

async fn set_block(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: SetBlockBody = required_body(&body)?;
    let height = state.simulator().set_height(&req.chain, req.block_number)?;
    Ok(ControlResponse::ok(format!("Block number updated to {height} for chain {}", req.chain)))
}

async fn pause(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().pause(&req.chain)?;
    Ok(ControlResponse::ok(format!("Block increment paused for {}", scope(&req.chain))))
}

async fn resume(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().resume(&req.chain)?;
    Ok(ControlResponse::ok(format!("Block increment resumed for {}", scope(&req.chain))))
}

async fn pause_updates(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: PauseUpdatesBody = optional_body(&body)?;
    if req.duration_seconds == 0 {
        state.simulator().pause(&req.chain)?;
        return Ok(ControlResponse::ok(format!("Block updates paused for {}", scope(&req.chain))));
    }
    state
        .simulator()
        .pause_for(&req.chain, Duration::from_secs(req.duration_seconds))?;
    Ok(ControlResponse::ok(format!(
        "Block updates paused for {} for {}s",
        scope(&req.chain),
        req.duration_seconds
    )))
}

async fn set_interval(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: IntervalBody = required_body(&body)?;
    let interval = seconds(req.interval_seconds)?;
    state.simulator().set_interval(&req.chain, interval)?;
    Ok(ControlResponse::ok(format!(
        "Block interval updated to {interval:?} for {}",
        scope(&req.chain)
    )))
}

async fn interrupt(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().interrupt(&req.chain)?;
    Ok(ControlResponse::ok(format!("Block emission interrupted for {}", scope(&req.chain))))
}

async fn resume_interrupt(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().resume_from_interrupt(&req.chain)?;
    Ok(ControlResponse::ok(format!("Block emission resumed for {}", scope(&req.chain))))
}

async fn set_logs_per_block(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: LogsPerBlockBody = optional_body(&body)?;
    let updated = state.simulator().set_logs_per_block(&req.chain, req.count)?;
    Ok(ControlResponse::ok(format!(
        "Logs per block set to {} on {updated} chain(s)",
        req.count
    )))
}

async fn reorg(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ReorgBody = required_body(&body)?;
    let message = match state.simulator().reorg(&req.chain, req.depth)? {
        Some(height) => format!("Chain {} reorganized to height {height}", req.chain),
        None => format!("Reorg depth {} exceeds chain {} height, nothing changed", req.depth, req.chain),
    };
    Ok(ControlResponse::ok(message))
}

// ─── Timeouts & latency ──────────────────────────────────────────────────────

async fn set_timeout(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: TimeoutBody = required_body(&body)?;
    let timeout = seconds(req.timeout_seconds)?;
    state.simulator().set_timeout(&req.chain, timeout)?;
    Ok(ControlResponse::ok(format!(
        "Response timeout set to {timeout:?} for {}",
        scope(&req.chain)
    )))
}

async fn clear_timeout(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().clear_timeout(&req.chain)?;
    Ok(ControlResponse::ok(format!("Response timeout cleared for {}", scope(&req.chain))))
}

async fn set_latency(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: LatencyBody = optional_body(&body)?;
    state
        .simulator()
        .set_latency(&req.chain, Duration::from_millis(req.latency_ms))?;
    Ok(ControlResponse::ok(format!(
        "Latency set to {}ms for {}",
        req.latency_ms,
        scope(&req.chain)
    )))
}

// ─── Errors ──────────────────────────────────────────────────────────────────

async fn list_errors(State(state): State<AppState>, Query(query): Query<ErrorsQuery>) -> Result<Json<Vec<ErrorConfig>>, ApiError> {
    Ok(Json(state.simulator().list_errors(&query.chain)?))
}

async fn list_presets() -> Json<&'static [&'static str]> {
    Json(PRESET_NAMES)
}

async fn set_error_probability(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ProbabilityBody = required_body(&body)?;
    state
        .simulator()
        .set_error_probability(&req.chain, req.probability)?;
    Ok(ControlResponse::ok(format!(
        "Error probability set to {} for {}",
        req.probability,
        scope(&req.chain)
    )))
}

async fn add_error(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: AddErrorBody = required_body(&body)?;
    let code = req.config.code;
    state.simulator().add_error(&req.chain, req.config)?;
    Ok(ControlResponse::ok(format!("Error {code} added for {}", scope(&req.chain))))
}

async fn add_preset(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: PresetBody = required_body(&body)?;
    state
        .simulator()
        .add_error_preset(&req.chain, &req.preset, req.probability)?;
    Ok(ControlResponse::ok(format!(
        "Preset {} added for {}",
        req.preset,
        scope(&req.chain)
    )))
}

async fn remove_error(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: RemoveErrorBody = required_body(&body)?;
    let removed = state.simulator().remove_error(&req.chain, req.index)?;
    Ok(ControlResponse::ok(format!(
        "Removed error {} ({}) from chain {}",
        req.index, removed.message, req.chain
    )))
}

async fn clear_errors(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().clear_errors(&req.chain)?;
    Ok(ControlResponse::ok(format!("Errors cleared for {}", scope(&req.chain))))
}

// ─── Custom responses ────────────────────────────────────────────────────────

async fn set_custom_response(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: CustomResponseBody = required_body(&body)?;
    let raw = match &req.response {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    };
    state
        .simulator()
        .set_custom_response(&req.chain, &raw, req.methods)?;
    Ok(ControlResponse::ok(format!("Custom response set for {}", scope(&req.chain))))
}

async fn clear_custom_response(State(state): State<AppState>, body: Bytes) -> ControlResult {
    let req: ChainBody = optional_body(&body)?;
    state.simulator().clear_custom_response(&req.chain)?;
    Ok(ControlResponse::ok(format!("Custom response cleared for {}", scope(&req.chain))))
}

// ─── Config ──────────────────────────────────────────────────────────────────

async fn export_config(State(state): State<AppState>) -> Result<Response, ApiError> {
    let yaml = state.simulator().export_config().to_yaml()?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response())
}
