//! Fault injection: simulated errors, latency and custom responses.
//!
//! Each chain carries an ordered list of [`ErrorConfig`] entries. For every
//! request the applicable entries (empty method list, or the method is
//! listed) share the unit interval by their probabilities: one roll in
//! `[0, 1)` picks at most one of them. The legacy scalar
//! `error_probability` is only consulted when the list is empty.

use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chain::ChainState;
use crate::error::RpcError;

/// A configurable error that can be simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorConfig {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// 0.0 to 1.0
    #[serde(default)]
    pub probability: f64,
    /// Methods this error applies to. Empty = all methods.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
    /// Delay before the error is returned (0 = none).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub delay_ms: u64,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl ErrorConfig {
    pub fn new(code: i64, message: impl Into<String>, probability: f64) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
            probability,
            methods: Vec::new(),
            delay_ms: 0,
        }
    }

    pub fn for_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    /// Whether this entry applies to `method`.
    pub fn applies_to(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m == method)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn to_rpc_error(&self) -> RpcError {
        RpcError {
            code: self.code,
            message: self.message.clone(),
            data: self.data.clone(),
        }
    }

    /// Instantiate a named preset with the given probability.
    pub fn preset(name: &str, probability: f64) -> Option<Self> {
        let (code, message, data, methods): (i64, &str, &str, &[&str]) = match name {
            "parse_error" => (-32700, "Parse error", "Invalid JSON was received by the server", NO_METHODS),
            "invalid_request" => (-32600, "Invalid Request", "The JSON sent is not a valid Request object", NO_METHODS),
            "method_not_found" => (-32601, "Method not found", "The method does not exist / is not available", NO_METHODS),
            "invalid_params" => (-32602, "Invalid params", "Invalid method parameter(s)", NO_METHODS),
            "internal_error" => (-32603, "Internal error", "Internal JSON-RPC error", NO_METHODS),
            "header_not_found" => (-32000, "header not found", "The requested block header was not found", NO_METHODS),
            "block_not_found" => (-32000, "block not found", "The requested block was not found", NO_METHODS),
            "nonce_too_low" => (-32000, "nonce too low", "Transaction nonce is too low", SEND_METHODS),
            "stack_limit_reached" => (-32000, "stack limit reached 1024", "EVM stack limit exceeded", CALL_METHODS),
            "execution_timeout" => (-32000, "execution timeout", "Transaction execution timed out", CALL_METHODS),
            "filter_not_found" => (
                -32000,
                "filter not found",
                "The filter does not exist or has expired",
                FILTER_METHODS,
            ),
            "invalid_block_range" => (
                -32000,
                "invalid block range params",
                "The block range parameters are invalid (toBlock > current block or fromBlock > toBlock)",
                LOG_METHODS,
            ),
            "resource_not_found" => (-32001, "resource not found", "Requested resource was not found", NO_METHODS),
            "resource_unavailable" => (-32002, "resource unavailable", "Requested resource is temporarily unavailable", NO_METHODS),
            "transaction_rejected" => (-32003, "transaction rejected", "Transaction was rejected", SEND_METHODS),
            "method_not_supported" => (-32004, "method not supported", "Method is not implemented", NO_METHODS),
            "limit_exceeded" => (-32005, "limit exceeded", "Request exceeds defined limit", NO_METHODS),
            "gas_limit_too_low" => (
                -32010,
                "gas limit too low",
                "Transaction gas limit is too low",
                GAS_METHODS,
            ),
            "vm_execution_error" => (-32015, "VM execution error", "Error occurred during contract execution", CALL_METHODS),
            "execution_reverted" => (
                3,
                "execution reverted",
                "Transaction execution was reverted",
                GAS_METHODS,
            ),
            _ => return None,
        };
        Some(Self {
            code,
            message: message.into(),
            data: Some(Value::String(data.into())),
            probability,
            methods: methods.iter().map(|m| m.to_string()).collect(),
            delay_ms: 0,
        })
    }
}

const NO_METHODS: &[&str] = &[];
const SEND_METHODS: &[&str] = &["eth_sendTransaction", "eth_sendRawTransaction"];
const CALL_METHODS: &[&str] = &["eth_call", "eth_estimateGas"];
const LOG_METHODS: &[&str] = &["eth_getLogs"];
const FILTER_METHODS: &[&str] = &["eth_getFilterChanges", "eth_getFilterLogs", "eth_uninstallFilter"];
const GAS_METHODS: &[&str] = &["eth_call", "eth_estimateGas", "eth_sendTransaction", "eth_sendRawTransaction"];

/// Names accepted by [`ErrorConfig::preset`].
pub const PRESET_NAMES: &[&str] = &[
    "parse_error",
    "invalid_request",
    "method_not_found",
    "invalid_params",
    "internal_error",
    "header_not_found",
    "block_not_found",
    "nonce_too_low",
    "stack_limit_reached",
    "execution_timeout",
    "filter_not_found",
    "invalid_block_range",
    "resource_not_found",
    "resource_unavailable",
    "transaction_rejected",
    "method_not_supported",
    "limit_exceeded",
    "gas_limit_too_low",
    "vm_execution_error",
    "execution_reverted",
];

/// Pick the error for `method` given a uniform `roll` in `[0, 1)`.
///
/// Entries act as additive shares of the unit interval in configuration
/// order; a roll above the summed share means no error.
pub fn select_error<'a>(configs: &'a [ErrorConfig], method: &str, roll: f64) -> Option<&'a ErrorConfig> {
    let applicable: Vec<&ErrorConfig> = configs.iter().filter(|c| c.applies_to(method)).collect();
    if applicable.is_empty() {
        return None;
    }

    let total: f64 = applicable.iter().map(|c| c.probability).sum();
    if total <= 0.0 || roll > total {
        return None;
    }

    let mut cumulative = 0.0;
    for &config in &applicable {
        cumulative += config.probability;
        if roll <= cumulative {
            return Some(config);
        }
    }

    // Float rounding can leave roll just above the running sum.
    applicable.last().copied()
}

/// Stored override returned verbatim as the `result` of matching requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomResponse {
    pub response: Value,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<String>,
}

fn bool_true() -> bool {
    true
}

impl CustomResponse {
    /// Parse `raw` once; invalid JSON is rejected here rather than per request.
    pub fn parse(raw: &str, methods: Vec<String>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            response: serde_json::from_str(raw)?,
            enabled: true,
            methods,
        })
    }

    pub fn applies_to(&self, method: &str) -> bool {
        self.enabled && (self.methods.is_empty() || self.methods.iter().any(|m| m == method))
    }
}

/// An error chosen by the injector, with the delay to observe before replying.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedError {
    pub error: RpcError,
    pub delay: Duration,
}

/// Per-request fault decisions backed by a seedable random source.
pub struct FaultInjector {
    rng: Mutex<StdRng>,
}

impl FaultInjector {
    /// `seed = None` draws from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    /// Draw a uniform value in `[0, 1)`.
    pub fn roll(&self) -> f64 {
        self.rng.lock().unwrap().gen::<f64>()
    }

    /// Decide whether `method` on `chain` should fail.
    pub fn check_error(&self, chain: &ChainState, method: &str) -> Option<InjectedError> {
        let configs = chain.error_configs();
        if configs.is_empty() {
            let p = chain.error_probability();
            if p > 0.0 && self.roll() < p {
                return Some(InjectedError {
                    error: RpcError::header_not_found(),
                    delay: Duration::ZERO,
                });
            }
            return None;
        }

        let roll = self.roll();
        select_error(&configs, method, roll).map(|c| InjectedError {
            error: c.to_rpc_error(),
            delay: c.delay(),
        })
    }

    /// The custom result for `method`, if an enabled override matches.
    pub fn custom_response(&self, chain: &ChainState, method: &str) -> Option<Value> {
        chain
            .custom_response()
            .filter(|c| c.applies_to(method))
            .map(|c| c.response)
    }
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector").finish_non_exhaustive()
    }
}
