//! `GET /ws/chain/:chain_id` — JSON-RPC over WebSocket.
//!
//! Each connection gets a [`ChannelSink`]. Responses and notifications are
//! written to the sink and a single writer task forwards them to the socket,
//! so frames from concurrent broadcasts never interleave.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chainsim_core::{ChannelSink, Sink};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::app::AppState;

pub async fn ws_handler(
    Path(chain_id): Path<String>,
    State(state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    if state.simulator().chains().get(&chain_id).is_none() {
        return (StatusCode::BAD_REQUEST, "Invalid chain ID").into_response();
    }
    if state.gate.is_blocked() {
        tracing::debug!(chain = %chain_id, "connection refused while gate is closed");
        return (StatusCode::SERVICE_UNAVAILABLE, "Server is temporarily unavailable").into_response();
    }
    let Some(ws) = ws else {
        return (StatusCode::UPGRADE_REQUIRED, "WebSocket upgrade required").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, chain_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, chain_key: String) {
    let (channel_sink, rx) = ChannelSink::new();
    let closed = channel_sink.closed();
    let sink: Arc<dyn Sink> = Arc::new(channel_sink);
    let sink_id = sink.id();

    let count = state.tracker.add(&chain_key, Arc::clone(&sink));
    tracing::info!(chain = %chain_key, sink = %sink_id, connections = count, "client connected");

    let (sender, mut receiver) = socket.split();
    let writer = tokio::spawn(write_frames(sender, rx));

    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            msg = receiver.next() => {
                let raw = match msg {
                    Some(Ok(Message::Text(text))) => text.into_bytes(),
                    Some(Ok(Message::Binary(bytes))) => bytes,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => continue,
                };
                tokio::select! {
                    _ = closed.cancelled() => break,
                    _ = respond(&state, &chain_key, &raw, &sink) => {}
                }
            }
        }
    }

    let left = state.tracker.remove(&chain_key, sink_id);
    let cleaned = state.simulator().subscriptions().cleanup_sink(sink_id);
    sink.close();
    let _ = writer.await;
    tracing::info!(chain = %chain_key, sink = %sink_id, subscriptions = cleaned, connections = left, "client disconnected");
}

/// Answer one request. While the chain has a response timeout set, the
/// request is held for that long and dropped without an answer.
async fn respond(state: &AppState, chain_key: &str, raw: &[u8], sink: &Arc<dyn Sink>) {
    let timeout = state
        .simulator()
        .chains()
        .get(chain_key)
        .and_then(|c| c.state().response_timeout());
    if let Some(timeout) = timeout {
        tracing::debug!(chain = chain_key, timeout_ms = timeout.as_millis() as u64, "stalling request");
        tokio::time::sleep(timeout).await;
        return;
    }

    let response = state.router.handle(chain_key, raw, Some(sink)).await;
    if sink.write(&response.to_json()).is_err() {
        tracing::debug!(chain = chain_key, sink = %sink.id(), "response dropped, connection closed");
    }
}

async fn write_frames<S>(mut sender: S, mut rx: mpsc::UnboundedReceiver<String>)
where
    S: futures::Sink<Message> + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if sender.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
    let _ = sender.close().await;
}
