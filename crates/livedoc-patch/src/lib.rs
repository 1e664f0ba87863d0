//! Persistent JSON documents and atomic JSON Patch application.
//!
//! A [`Doc`] is an immutable snapshot. [`apply_patch`] produces the next
//! snapshot from an ordered batch of [`Op`]s, copying only the containers on
//! the paths the batch writes through. Everything else is shared with the
//! previous snapshot, which downstream consumers can detect with
//! [`Doc::ptr_eq`].
//!
//! ```
//! use livedoc_patch::{apply_patch, from_json_patch, Doc};
//! use serde_json::json;
//!
//! let before = Doc::from(json!({"a": {"b": 1}, "c": [1, 2]}));
//! let ops = from_json_patch(&json!([{"op": "replace", "path": "/a/b", "value": 2}])).unwrap();
//! let after = apply_patch(&before, &ops).unwrap();
//!
//! assert_eq!(after, Doc::from(json!({"a": {"b": 2}, "c": [1, 2]})));
//! let c = ["c".to_string()];
//! assert!(Doc::ptr_eq(after.get(&c).unwrap(), before.get(&c).unwrap()));
//! ```

pub mod apply;
pub mod codec;
pub mod doc;
pub mod types;

pub use apply::{apply_op, apply_patch};
pub use codec::{from_json, from_json_patch, to_json, to_json_patch};
pub use doc::{Doc, DocMap};
pub use types::{Op, Path, PatchError};

/// Apply a patch given as JSON text to a document given as JSON text.
///
/// Used by the `livedoc-patch` binary.
pub fn apply_json_patch(doc: &str, patch: &str) -> Result<String, PatchError> {
    let doc = Doc::parse(doc).map_err(|e| PatchError::InvalidOp(format!("document: {e}")))?;
    let patch: serde_json::Value =
        serde_json::from_str(patch).map_err(|e| PatchError::InvalidOp(format!("patch: {e}")))?;
    let ops = from_json_patch(&patch)?;
    let out = apply_patch(&doc, &ops)?;
    Ok(out.to_string())
}
