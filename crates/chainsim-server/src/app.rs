//! Router assembly and the serve loop.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chainsim_core::{Router as RpcRouter, Simulator};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::connections::{ConnectionGate, ConnectionTracker};
use crate::error::ServerError;
use crate::{control, http, sse, ws};

/// Shared state of every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub router: Arc<RpcRouter>,
    pub tracker: ConnectionTracker,
    pub gate: ConnectionGate,
}

impl AppState {
    pub fn new(sim: Arc<Simulator>) -> Self {
        Self {
            router: Arc::new(RpcRouter::new(sim)),
            tracker: ConnectionTracker::new(),
            gate: ConnectionGate::new(),
        }
    }

    pub fn simulator(&self) -> &Arc<Simulator> {
        self.router.simulator()
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/chain/:chain_id", get(ws::ws_handler))
        .route("/chain/:chain_id", post(http::rpc_handler))
        .route("/sse/connections", get(sse::connections_handler))
        .route("/health", get(health))
        .merge(control::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let sim = state.simulator();
    Json(json!({
        "status": "ok",
        "chains": sim.chains().len(),
        "subscriptions": sim.subscriptions().len(),
        "connections": state.tracker.total(),
    }))
}

/// Serve until `shutdown` fires. Open WebSocket connections are closed when
/// it does, so graceful shutdown does not wait on idle clients.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr = listener.local_addr()?;
    tracing::info!(%addr, chains = state.simulator().chains().len(), "chainsim listening");
    for chain in state.simulator().chains().iter() {
        tracing::info!(chain = %chain.name(), "endpoint ws://{addr}/ws/chain/{}", chain.key());
    }

    let tracker = state.tracker.clone();
    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            let closed = tracker.close_all();
            tracing::info!(closed, "closing connections for shutdown");
        })
        .await?;
    Ok(())
}
