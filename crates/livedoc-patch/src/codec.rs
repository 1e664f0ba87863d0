//! JSON codec for patch operations.
//!
//! Converts operations to and from `serde_json::Value` in RFC 6902 form.

use serde_json::{json, Map, Value};

use livedoc_pointer::{format_json_pointer, try_parse_json_pointer};

use crate::doc::Doc;
use crate::types::{Op, PatchError};

// ── Field helpers ─────────────────────────────────────────────────────────

fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Result<&'a Value, PatchError> {
    obj.get(name)
        .ok_or_else(|| PatchError::InvalidOp(format!("missing \"{name}\"")))
}

fn decode_path(obj: &Map<String, Value>, name: &str) -> Result<Vec<String>, PatchError> {
    let s = field(obj, name)?
        .as_str()
        .ok_or_else(|| PatchError::InvalidOp(format!("\"{name}\" must be a string")))?;
    try_parse_json_pointer(s).map_err(|e| PatchError::InvalidOp(format!("\"{name}\": {e}")))
}

fn decode_value(obj: &Map<String, Value>) -> Result<Doc, PatchError> {
    field(obj, "value").map(|v| Doc::from(v.clone()))
}

// ── Deserialization ───────────────────────────────────────────────────────

/// Deserialize one operation.
pub fn from_json(v: &Value) -> Result<Op, PatchError> {
    let obj = v
        .as_object()
        .ok_or_else(|| PatchError::InvalidOp("operation must be an object".into()))?;
    let name = field(obj, "op")?
        .as_str()
        .ok_or_else(|| PatchError::InvalidOp("\"op\" must be a string".into()))?;
    let path = decode_path(obj, "path")?;
    Ok(match name {
        "add" => Op::Add { path, value: decode_value(obj)? },
        "remove" => Op::Remove { path },
        "replace" => Op::Replace { path, value: decode_value(obj)? },
        "copy" => Op::Copy { path, from: decode_path(obj, "from")? },
        "move" => Op::Move { path, from: decode_path(obj, "from")? },
        "test" => Op::Test { path, value: decode_value(obj)? },
        other => return Err(PatchError::InvalidOp(format!("unknown op: {other}"))),
    })
}

/// Deserialize a patch (an array of operations).
pub fn from_json_patch(v: &Value) -> Result<Vec<Op>, PatchError> {
    v.as_array()
        .ok_or_else(|| PatchError::InvalidOp("patch must be an array".into()))?
        .iter()
        .map(from_json)
        .collect()
}

// ── Serialization ─────────────────────────────────────────────────────────

pub fn to_json(op: &Op) -> Value {
    let path = format_json_pointer(op.path());
    match op {
        Op::Add { value, .. } | Op::Replace { value, .. } | Op::Test { value, .. } => json!({
            "op": op.name(),
            "path": path,
            "value": value.to_value(),
        }),
        Op::Remove { .. } => json!({ "op": "remove", "path": path }),
        Op::Copy { from, .. } | Op::Move { from, .. } => json!({
            "op": op.name(),
            "path": path,
            "from": format_json_pointer(from),
        }),
    }
}

pub fn to_json_patch(ops: &[Op]) -> Value {
    Value::Array(ops.iter().map(to_json).collect())
}
