//! JSON-RPC request routing.
//!
//! Every request goes through the same pipeline: configured latency, envelope
//! validation, injected error, custom response, then the family's method
//! handler. Injected errors short-circuit before any handler runs, so they
//! never create subscriptions or touch chain state.

mod evm;
pub mod params;
mod solana;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::chain::{ChainFamily, ChainHandle};
use crate::error::RpcError;
use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use crate::simulator::Simulator;
use crate::sink::Sink;
use crate::subscription::{NotificationKind, SubscriptionId};

pub type HandlerResult = Result<Value, RpcError>;

/// A method implementation. Handlers are synchronous; all waiting happens
/// in the pipeline before dispatch.
pub type Handler = fn(&Call<'_>) -> HandlerResult;

/// Everything a handler may look at.
pub struct Call<'a> {
    pub sim: &'a Simulator,
    pub chain: &'a ChainHandle,
    pub params: &'a [Value],
    /// The connection the request arrived on. `None` for plain HTTP.
    pub sink: Option<&'a Arc<dyn Sink>>,
}

impl Call<'_> {
    /// Register a subscription for the calling connection.
    pub fn subscribe(&self, kind: NotificationKind) -> Result<SubscriptionId, RpcError> {
        let sink = self
            .sink
            .ok_or_else(|| RpcError::unsupported("notifications not supported"))?;
        Ok(self.sim.subscriptions().subscribe(self.chain.key(), kind, sink))
    }
}

/// Dispatches raw requests to per-family method tables built once.
pub struct Router {
    sim: Arc<Simulator>,
    evm: HashMap<&'static str, Handler>,
    solana: HashMap<&'static str, Handler>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("evm_methods", &self.evm.len())
            .field("solana_methods", &self.solana.len())
            .finish()
    }
}

impl Router {
    pub fn new(sim: Arc<Simulator>) -> Self {
        Self {
            sim,
            evm: evm::methods(),
            solana: solana::methods(),
        }
    }

    pub fn simulator(&self) -> &Arc<Simulator> {
        &self.sim
    }

    /// Handle one raw request addressed to `chain_key`.
    pub async fn handle(&self, chain_key: &str, raw: &[u8], sink: Option<&Arc<dyn Sink>>) -> JsonRpcResponse {
        let Some(chain) = self.sim.chains().get(chain_key) else {
            return JsonRpcResponse::failure(
                peek_id(raw),
                RpcError::invalid_params(format!("Unsupported chain ID: {chain_key}")),
            );
        };

        let latency = chain.state().latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let request = match JsonRpcRequest::parse(raw) {
            Ok(request) => request,
            Err((id, error)) => {
                tracing::debug!(chain = chain_key, code = error.code, "rejected request");
                return JsonRpcResponse::failure(id, error);
            }
        };
        let method = request.method.as_str();
        if method != "getHealth" {
            tracing::debug!(chain = chain_key, method, id = %request.id, "request");
        }

        if let Some(injected) = self.sim.faults().check_error(chain.state(), method) {
            if !injected.delay.is_zero() {
                tokio::time::sleep(injected.delay).await;
            }
            tracing::debug!(chain = chain_key, method, code = injected.error.code, "injected error");
            return JsonRpcResponse::failure(request.id, injected.error);
        }

        if let Some(result) = self.sim.faults().custom_response(chain.state(), method) {
            tracing::debug!(chain = chain_key, method, "custom response");
            return JsonRpcResponse::success(request.id, result);
        }

        let table = match chain.family() {
            ChainFamily::Evm => &self.evm,
            ChainFamily::Solana => &self.solana,
        };
        let Some(handler) = table.get(method) else {
            return JsonRpcResponse::failure(request.id, RpcError::method_not_found());
        };

        let call = Call {
            sim: &self.sim,
            chain,
            params: &request.params,
            sink,
        };
        match handler(&call) {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::failure(request.id, error),
        }
    }
}

/// Best-effort id extraction for requests rejected before parsing.
fn peek_id(raw: &[u8]) -> RpcId {
    serde_json::from_slice::<Value>(raw)
        .ok()
        .and_then(|v| v.get("id").map(RpcId::from_value))
        .unwrap_or_default()
}
