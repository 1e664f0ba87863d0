//! JSON-RPC 2.0 envelopes.
//!
//! Inbound text is decoded into a [`Message`] in one step; anything that is
//! not a well-formed request, notification or response is an [`RpcError`]
//! with the matching standard code.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// The `error` member of a response.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    pub fn parse_error(reason: impl std::fmt::Display) -> Self {
        Self::new(PARSE_ERROR, format!("Parse error: {reason}"))
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(INVALID_REQUEST, reason)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, reason)
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Request { id: RequestId, method: String, params: Value },
    Notification { method: String, params: Value },
    Response { id: RequestId, outcome: Result<Value, RpcError> },
}

impl Message {
    /// Decode one inbound envelope.
    pub fn parse(text: &str) -> Result<Self, RpcError> {
        let value: Value = serde_json::from_str(text).map_err(RpcError::parse_error)?;
        let Value::Object(mut obj) = value else {
            return Err(RpcError::invalid_request("envelope must be an object"));
        };
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Err(RpcError::invalid_request("missing or unsupported \"jsonrpc\" version"));
        }
        let id = decode_id(&mut obj)?;
        let params = obj.remove("params").unwrap_or(Value::Null);

        if let Some(method) = obj.remove("method") {
            let Value::String(method) = method else {
                return Err(RpcError::invalid_request("\"method\" must be a string"));
            };
            return Ok(match id {
                Some(id) => Message::Request { id, method, params },
                None => Message::Notification { method, params },
            });
        }

        let id = id.ok_or_else(|| RpcError::invalid_request("response without \"id\""))?;
        let outcome = match (obj.remove("result"), obj.remove("error")) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(serde_json::from_value::<RpcError>(error)
                .map_err(|e| RpcError::invalid_request(format!("malformed \"error\": {e}")))?),
            _ => {
                return Err(RpcError::invalid_request(
                    "response must carry exactly one of \"result\" and \"error\"",
                ))
            }
        };
        Ok(Message::Response { id, outcome })
    }

    pub fn request(id: RequestId, method: impl Into<String>, params: Value) -> Self {
        Message::Request { id, method: method.into(), params }
    }

    pub fn notification(method: impl Into<String>, params: Value) -> Self {
        Message::Notification { method: method.into(), params }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Message::Request { id, method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "method": method,
                "params": params,
            }),
            Message::Notification { method, params } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "method": method,
                "params": params,
            }),
            Message::Response { id, outcome: Ok(result) } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "result": result,
            }),
            Message::Response { id, outcome: Err(error) } => json!({
                "jsonrpc": JSONRPC_VERSION,
                "id": id,
                "error": error,
            }),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }
}

fn decode_id(obj: &mut Map<String, Value>) -> Result<Option<RequestId>, RpcError> {
    match obj.remove("id") {
        None => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|n| Some(RequestId::Number(n)))
            .ok_or_else(|| RpcError::invalid_request("\"id\" must be a non-negative integer")),
        Some(Value::String(s)) => Ok(Some(RequestId::String(s))),
        Some(_) => Err(RpcError::invalid_request("\"id\" must be a number or a string")),
    }
}
