//! Sentinel-aware decoding of event payloads and callable results.
//!
//! Unlike document hydration, payload decoding only revives callables.
//! Callables found here are not tracked by the session's reference tables.
//! Anything else that looks like a sentinel is kept as plain data.

use std::rc::Rc;

use livedoc_patch::Doc;
use livedoc_rpc::RpcChannel;
use serde_json::Value;
use tracing::debug;

use crate::callable::Callable;
use crate::error::ProtocolError;
use crate::hydrated::Hydrated;
use crate::sentinel::Sentinel;

pub fn decode_payload(text: &str, channel: &RpcChannel) -> Result<Hydrated, ProtocolError> {
    let doc = Doc::parse(text).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    Ok(decode_doc(&doc, channel))
}

pub fn decode_doc(doc: &Doc, channel: &RpcChannel) -> Hydrated {
    if let Some(scalar) = Hydrated::scalar(doc) {
        return scalar;
    }
    match Sentinel::classify(doc) {
        Ok(Sentinel::Callable(id)) => return Hydrated::Callable(Callable::new(id, channel)),
        Ok(_) => {}
        Err(err) => debug!(error = %err, "keeping malformed sentinel as data"),
    }
    match doc {
        Doc::Array(items) => Hydrated::Array(Rc::new(items.iter().map(|d| decode_doc(d, channel)).collect())),
        Doc::Object(map) => Hydrated::Object(Rc::new(
            map.iter().map(|(k, v)| (k.clone(), decode_doc(v, channel))).collect(),
        )),
        _ => Hydrated::Null,
    }
}

/// Callable results arrive either as a JSON-encoded payload string or as
/// an inline value.
pub(crate) fn decode_result(result: Value, channel: &RpcChannel) -> Result<Hydrated, ProtocolError> {
    match result {
        Value::String(text) => decode_payload(&text, channel),
        other => Ok(decode_doc(&Doc::from(other), channel)),
    }
}
