//! Error taxonomy for widget sessions.
//!
//! Only [`DocumentError`] is ever promoted to user-facing session state.
//! Everything else is scoped to one message or one call.

use livedoc_patch::PatchError;
use livedoc_rpc::{CallError, RpcError, TransportError};
use serde::Deserialize;
use thiserror::Error;

/// The server broke the wire contract for one message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("exported object {0} was referenced but never delivered")]
    MissingHandle(u64),
    #[error("unknown event \"{0}\"")]
    UnknownEvent(String),
    #[error("malformed sentinel: {0}")]
    MalformedSentinel(String),
    #[error("invalid params for {method}: {reason}")]
    InvalidParams { method: &'static str, reason: String },
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HydrateError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("element \"{name}\" could not be created: {reason}")]
    Element { name: String, reason: String },
    #[error("uri \"{uri}\" could not be resolved: {reason}")]
    Uri { uri: String, reason: String },
}

/// The `state` argument of `documentPatched` was not valid JSON.
#[derive(Debug, Error)]
#[error("state payload is not valid JSON: {0}")]
pub struct StateParseError(#[from] pub serde_json::Error);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WidgetError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("patch rejected: {0}")]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Hydrate(#[from] HydrateError),
    #[error(transparent)]
    Call(#[from] CallError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session is closed")]
    Closed,
}

impl From<WidgetError> for RpcError {
    fn from(err: WidgetError) -> Self {
        match &err {
            WidgetError::Protocol(ProtocolError::InvalidParams { .. }) => {
                RpcError::invalid_params(err.to_string())
            }
            _ => RpcError::internal(err.to_string()),
        }
    }
}

/// A server-declared document error.
///
/// The payload is usually a JSON object `{message, type?, stack?}`; anything
/// else is kept verbatim as the message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[error("{message}")]
pub struct DocumentError {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

impl DocumentError {
    pub fn parse(payload: &str) -> Self {
        serde_json::from_str::<DocumentError>(payload).unwrap_or_else(|_| DocumentError {
            message: payload.to_string(),
            kind: None,
            stack: None,
        })
    }
}
