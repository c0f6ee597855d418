//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request ID — string, number, or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RpcId {
    Number(Number),
    String(String),
    #[default]
    Null,
}

impl RpcId {
    pub fn number(n: u64) -> Self {
        Self::Number(n.into())
    }

    /// Lenient conversion used while parsing: ids of any other JSON type
    /// are answered with `null`.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::String(s.clone()),
            _ => Self::Null,
        }
    }
}

impl std::fmt::Display for RpcId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Null => write!(f, "null"),
        }
    }
}

/// A validated JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub id: RpcId,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC 2.0 request.
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params,
            id: RpcId::number(id),
        }
    }

    /// Validate a raw request body.
    ///
    /// Malformed JSON is a parse error. A body that is not an object, has a
    /// version other than `"2.0"` or lacks a string method is an invalid
    /// request. `params` may be absent or `null`; any other non-array value
    /// is rejected as invalid params.
    pub fn parse(raw: &[u8]) -> Result<Self, (RpcId, RpcError)> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|_| (RpcId::Null, RpcError::parse_error()))?;
        let Value::Object(mut obj) = value else {
            return Err((RpcId::Null, RpcError::invalid_request()));
        };

        let id = obj.get("id").map(RpcId::from_value).unwrap_or_default();

        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err((id, RpcError::invalid_request()));
        }

        let method = match obj.get("method").and_then(Value::as_str) {
            Some(m) => m.to_string(),
            None => return Err((id, RpcError::invalid_request())),
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(_) => return Err((id, RpcError::invalid_params("Invalid params"))),
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method,
            params,
            id,
        })
    }
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    pub id: RpcId,
}

impl JsonRpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: RpcId, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            result: None,
            error: Some(error),
            id,
        }
    }

    /// Returns `true` if this is a successful response (has result, no error).
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }

    /// Unwrap the result value or return an error.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing a tree of `Value`s and strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// `params` of a subscription notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationParams<T> {
    pub subscription: Value,
    pub result: T,
}

/// A server → client subscription notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification<T> {
    pub jsonrpc: String,
    pub method: String,
    pub params: NotificationParams<T>,
}

impl<T: Serialize> JsonRpcNotification<T> {
    pub fn new(method: impl Into<String>, subscription: Value, result: T) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.into(),
            params: NotificationParams {
                subscription,
                result,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{INVALID_PARAMS, INVALID_REQUEST, PARSE_ERROR};

    #[test]
    fn parses_minimal_request() {
        let req = JsonRpcRequest::parse(br#"{"jsonrpc":"2.0","method":"eth_blockNumber","id":1}"#)
            .unwrap();
        assert_eq!(req.method, "eth_blockNumber");
        assert!(req.params.is_empty());
        assert_eq!(req.id, RpcId::number(1));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let (id, err) = JsonRpcRequest::parse(b"{not json").unwrap_err();
        assert_eq!(id, RpcId::Null);
        assert_eq!(err.code, PARSE_ERROR);
    }

    #[test]
    fn wrong_version_keeps_id() {
        let (id, err) =
            JsonRpcRequest::parse(br#"{"jsonrpc":"1.0","method":"x","id":"abc"}"#).unwrap_err();
        assert_eq!(id, RpcId::String("abc".into()));
        assert_eq!(err.code, INVALID_REQUEST);
    }

    #[test]
    fn object_params_rejected() {
        let (_, err) =
            JsonRpcRequest::parse(br#"{"jsonrpc":"2.0","method":"x","params":{},"id":1}"#)
                .unwrap_err();
        assert_eq!(err.code, INVALID_PARAMS);
    }

    #[test]
    fn response_serialization() {
        let resp = JsonRpcResponse::success(RpcId::number(1), Value::String("0x64".into()));
        let json = resp.to_json();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"result\":\"0x64\""));
        assert!(!json.contains("error"));
    }

    #[test]
    fn response_into_result_error() {
        let resp = JsonRpcResponse::failure(RpcId::number(1), RpcError::header_not_found());
        assert!(!resp.is_ok());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code, -32000);
    }
}
