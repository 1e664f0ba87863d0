//! Patch application with path copying.
//!
//! The working root starts as an O(1) clone of the input document, so every
//! container on it is shared with the caller. `Rc::make_mut` then copies a
//! container exactly once, the first time an operation writes through it.
//! Subtrees no operation descends into are never copied and stay
//! reference-identical to the input.

use std::rc::Rc;

use livedoc_pointer::{is_child, parse_index, split_last, APPEND_STEP};

use crate::doc::Doc;
use crate::types::{Op, PatchError};

// ── Path navigation ───────────────────────────────────────────────────────

fn child_mut<'a>(node: &'a mut Doc, step: &str) -> Result<&'a mut Doc, PatchError> {
    match node {
        Doc::Object(map) => {
            if !map.contains_key(step) {
                return Err(PatchError::NotFound);
            }
            Rc::make_mut(map).get_mut(step).ok_or(PatchError::NotFound)
        }
        Doc::Array(items) => {
            let idx = parse_index(step).ok_or(PatchError::InvalidIndex)?;
            if idx >= items.len() {
                return Err(PatchError::NotFound);
            }
            Rc::make_mut(items).get_mut(idx).ok_or(PatchError::NotFound)
        }
        _ => Err(PatchError::NotFound),
    }
}

/// Mutable navigation, copying every shared container on the way down.
fn node_mut<'a>(doc: &'a mut Doc, path: &[String]) -> Result<&'a mut Doc, PatchError> {
    path.iter().try_fold(doc, |node, step| child_mut(node, step))
}

// ── Individual operation applicators ─────────────────────────────────────

fn apply_add(doc: &mut Doc, path: &[String], value: Doc) -> Result<(), PatchError> {
    let Ok((parent_path, key)) = split_last(path) else {
        *doc = value;
        return Ok(());
    };
    match node_mut(doc, parent_path)? {
        Doc::Object(map) => {
            Rc::make_mut(map).insert(key.to_string(), value);
            Ok(())
        }
        Doc::Array(items) => {
            if key == APPEND_STEP {
                Rc::make_mut(items).push(value);
                return Ok(());
            }
            let idx = parse_index(key).ok_or(PatchError::InvalidIndex)?;
            if idx > items.len() {
                return Err(PatchError::InvalidIndex);
            }
            Rc::make_mut(items).insert(idx, value);
            Ok(())
        }
        _ => Err(PatchError::InvalidTarget),
    }
}

fn apply_remove(doc: &mut Doc, path: &[String]) -> Result<Doc, PatchError> {
    let (parent_path, key) = split_last(path).map_err(|_| PatchError::InvalidTarget)?;
    match node_mut(doc, parent_path)? {
        Doc::Object(map) => {
            if !map.contains_key(key) {
                return Err(PatchError::NotFound);
            }
            Rc::make_mut(map).shift_remove(key).ok_or(PatchError::NotFound)
        }
        Doc::Array(items) => {
            let idx = parse_index(key).ok_or(PatchError::InvalidIndex)?;
            if idx >= items.len() {
                return Err(PatchError::NotFound);
            }
            Ok(Rc::make_mut(items).remove(idx))
        }
        _ => Err(PatchError::InvalidTarget),
    }
}

fn apply_replace(doc: &mut Doc, path: &[String], value: Doc) -> Result<(), PatchError> {
    *node_mut(doc, path)? = value;
    Ok(())
}

fn apply_copy(doc: &mut Doc, path: &[String], from: &[String]) -> Result<(), PatchError> {
    // The copy shares structure with its source; a later write under either
    // location copies on demand.
    let value = doc.get(from).cloned().ok_or(PatchError::NotFound)?;
    apply_add(doc, path, value)
}

fn apply_move(doc: &mut Doc, path: &[String], from: &[String]) -> Result<(), PatchError> {
    if path == from {
        return doc.get(from).map(|_| ()).ok_or(PatchError::NotFound);
    }
    if is_child(from, path) {
        return Err(PatchError::InvalidTarget);
    }
    let value = apply_remove(doc, from)?;
    apply_add(doc, path, value)
}

fn apply_test(doc: &Doc, path: &[String], value: &Doc) -> Result<(), PatchError> {
    let actual = doc.get(path).ok_or(PatchError::NotFound)?;
    if actual == value {
        Ok(())
    } else {
        Err(PatchError::Test)
    }
}

// ── Main apply function ───────────────────────────────────────────────────

/// Apply a single operation to a working document in place.
///
/// Containers shared with other snapshots are copied before being written.
pub fn apply_op(doc: &mut Doc, op: &Op) -> Result<(), PatchError> {
    match op {
        Op::Add { path, value } => apply_add(doc, path, value.clone()),
        Op::Remove { path } => apply_remove(doc, path).map(|_| ()),
        Op::Replace { path, value } => apply_replace(doc, path, value.clone()),
        Op::Copy { path, from } => apply_copy(doc, path, from),
        Op::Move { path, from } => apply_move(doc, path, from),
        Op::Test { path, value } => apply_test(doc, path, value),
    }
}

/// Apply a batch of operations and return the new document.
///
/// The input is never modified. If any operation fails the whole batch is
/// rejected and the error is returned; the caller keeps `doc` as it was.
pub fn apply_patch(doc: &Doc, ops: &[Op]) -> Result<Doc, PatchError> {
    let mut working = doc.clone();
    for op in ops {
        apply_op(&mut working, op)?;
    }
    Ok(working)
}

// ── Tests ─────────────────────────────────────────────────────────────────
