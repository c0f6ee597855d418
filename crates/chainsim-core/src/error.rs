//! Error types for the simulator core.
//!
//! Everything that can go wrong while serving a request is eventually turned
//! into an [`RpcError`] and written back to the client; the other enums here
//! describe failures of the registry, the control surface and config loading.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const SERVER_ERROR: i64 = -32000;

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("JSON-RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::new(PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::new(INVALID_REQUEST, "Invalid Request")
    }

    pub fn method_not_found() -> Self {
        Self::new(METHOD_NOT_FOUND, "Method not found")
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(METHOD_NOT_FOUND, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn invalid_block_range() -> Self {
        Self::new(SERVER_ERROR, "invalid block range params")
    }

    /// The fixed error produced by the legacy `error_probability` knob.
    pub fn header_not_found() -> Self {
        Self::new(SERVER_ERROR, "header not found")
    }
}

/// Failures of the subscription registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("subscription {id} not found")]
    NotFound { id: u64 },
}

impl From<RegistryError> for RpcError {
    fn from(err: RegistryError) -> Self {
        RpcError::internal(err.to_string())
    }
}

/// Write failure on a [`Sink`](crate::sink::Sink).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("sink is closed")]
    Closed,
}

/// Rejected administrative control calls.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Unsupported chain: {0}")]
    UnknownChain(String),

    #[error("Interval must be greater than 0")]
    InvalidInterval,

    #[error("Probability must be between 0 and 1, got {0}")]
    InvalidProbability(f64),

    #[error("Unknown error preset: {0}")]
    UnknownPreset(String),

    #[error("Error config index {index} out of range (chain has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Custom response is not valid JSON: {0}")]
    InvalidCustomResponse(#[from] serde_json::Error),
}

/// Failures while loading, saving or validating a [`SimConfig`](crate::config::SimConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("duplicate chain id {0}")]
    DuplicateChain(String),

    #[error("chain {chain}: {reason}")]
    Invalid { chain: String, reason: String },
}
