//! `POST /chain/:chain_id` — JSON-RPC over plain HTTP. No sink is attached,
//! so subscriptions are refused by the router.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::app::AppState;

pub async fn rpc_handler(Path(chain_id): Path<String>, State(state): State<AppState>, body: Bytes) -> Response {
    let timeout = state
        .simulator()
        .chains()
        .get(&chain_id)
        .and_then(|c| c.state().response_timeout());
    if let Some(timeout) = timeout {
        tracing::debug!(chain = %chain_id, timeout_ms = timeout.as_millis() as u64, "stalling request");
        tokio::time::sleep(timeout).await;
        return (StatusCode::GATEWAY_TIMEOUT, "Response timed out").into_response();
    }

    let response = state.router.handle(&chain_id, &body, None).await;
    ([(header::CONTENT_TYPE, "application/json")], response.to_json()).into_response()
}
