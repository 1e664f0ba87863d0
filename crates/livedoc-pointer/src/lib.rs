//! JSON Pointer (RFC 6901) utilities.
//!
//! Paths address nodes inside a live document. A pointer string is parsed
//! once into a [`Path`] (a vector of unescaped steps) and every consumer works
//! on steps from then on.
//!
//! # Example
//!
//! ```
//! use livedoc_pointer::{format_json_pointer, parse_json_pointer};
//!
//! let path = parse_json_pointer("/panel/children/0");
//! assert_eq!(path, vec!["panel", "children", "0"]);
//! assert_eq!(format_json_pointer(&path), "/panel/children/0");
//! ```

use thiserror::Error;

pub mod validate;
pub use validate::{validate_json_pointer, validate_path, ValidationError};

/// A single unescaped step of a path. Array indices are kept as strings.
pub type PathStep = String;

/// A parsed JSON Pointer.
pub type Path = Vec<PathStep>;

/// The step that addresses the slot after the last array element.
pub const APPEND_STEP: &str = "-";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JsonPointerError {
    #[error("root has no parent")]
    NoParent,
    #[error("invalid pointer: {0}")]
    Invalid(#[from] ValidationError),
}

/// Unescapes a JSON Pointer path component.
///
/// `~1` becomes `/` and `~0` becomes `~`, in that order, so `~01` decodes to
/// `~1` rather than `/`.
///
/// ```
/// use livedoc_pointer::unescape_component;
///
/// assert_eq!(unescape_component("a~0b"), "a~b");
/// assert_eq!(unescape_component("c~1d"), "c/d");
/// assert_eq!(unescape_component("~01"), "~1");
/// ```
pub fn unescape_component(component: &str) -> String {
    if !component.contains('~') {
        return component.to_string();
    }
    component.replace("~1", "/").replace("~0", "~")
}

/// Escapes a JSON Pointer path component.
///
/// ```
/// use livedoc_pointer::escape_component;
///
/// assert_eq!(escape_component("a~b"), "a~0b");
/// assert_eq!(escape_component("c/d"), "c~1d");
/// ```
pub fn escape_component(component: &str) -> String {
    if !component.contains('/') && !component.contains('~') {
        return component.to_string();
    }
    // `~` first, otherwise the `~` introduced by `~1` would be escaped again.
    component.replace('~', "~0").replace('/', "~1")
}

/// Parse a JSON Pointer string into path steps.
///
/// The empty string is the root. The leading `/` is stripped before
/// splitting, so `"/"` addresses the empty key.
///
/// ```
/// use livedoc_pointer::parse_json_pointer;
///
/// assert_eq!(parse_json_pointer(""), Vec::<String>::new());
/// assert_eq!(parse_json_pointer("/"), vec![""]);
/// assert_eq!(parse_json_pointer("/a~0b/c~1d"), vec!["a~b", "c/d"]);
/// ```
pub fn parse_json_pointer(pointer: &str) -> Path {
    match pointer.strip_prefix('/') {
        Some(rest) => rest.split('/').map(unescape_component).collect(),
        None if pointer.is_empty() => Vec::new(),
        // Relative form, tolerated for hand-written pointers.
        None => pointer.split('/').map(unescape_component).collect(),
    }
}

/// Validate and parse a pointer in one step.
pub fn try_parse_json_pointer(pointer: &str) -> Result<Path, JsonPointerError> {
    validate_json_pointer(pointer)?;
    let path = parse_json_pointer(pointer);
    validate_path(&path)?;
    Ok(path)
}

/// Format path steps into a JSON Pointer string.
///
/// ```
/// use livedoc_pointer::format_json_pointer;
///
/// assert_eq!(format_json_pointer(&[]), "");
/// assert_eq!(format_json_pointer(&["a/b".to_string(), "0".to_string()]), "/a~1b/0");
/// ```
pub fn format_json_pointer(path: &[String]) -> String {
    let mut out = String::with_capacity(path.iter().map(|s| s.len() + 1).sum());
    for step in path {
        out.push('/');
        out.push_str(&escape_component(step));
    }
    out
}

pub fn is_root(path: &[String]) -> bool {
    path.is_empty()
}

/// Check whether `child` lies strictly below `parent`.
///
/// ```
/// use livedoc_pointer::is_child;
///
/// let parent = vec!["a".to_string()];
/// let child = vec!["a".to_string(), "b".to_string()];
/// assert!(is_child(&parent, &child));
/// assert!(!is_child(&child, &parent));
/// assert!(!is_child(&parent, &parent));
/// ```
pub fn is_child(parent: &[String], child: &[String]) -> bool {
    parent.len() < child.len() && child[..parent.len()] == *parent
}

/// Split a path into its parent path and last step.
pub fn split_last(path: &[String]) -> Result<(&[String], &str), JsonPointerError> {
    match path.split_last() {
        Some((last, parent)) => Ok((parent, last.as_str())),
        None => Err(JsonPointerError::NoParent),
    }
}

/// Check if a step is a canonical non-negative array index.
///
/// ```
/// use livedoc_pointer::is_valid_index;
///
/// assert!(is_valid_index("0"));
/// assert!(is_valid_index("42"));
/// assert!(!is_valid_index("007"));
/// assert!(!is_valid_index("-1"));
/// assert!(!is_valid_index("-"));
/// ```
pub fn is_valid_index(step: &str) -> bool {
    let bytes = step.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == b'0') {
        return false;
    }
    bytes.iter().all(u8::is_ascii_digit)
}

/// Parse a step as an array index, rejecting non-canonical forms.
pub fn parse_index(step: &str) -> Option<usize> {
    if is_valid_index(step) {
        step.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_last_of_root_has_no_parent() {
        assert_eq!(split_last(&[]), Err(JsonPointerError::NoParent));
        let path = parse_json_pointer("/a/b");
        let (parent, last) = split_last(&path).unwrap();
        assert_eq!(parent, ["a".to_string()]);
        assert_eq!(last, "b");
    }

    #[test]
    fn parse_index_rejects_append_and_leading_zeros() {
        assert_eq!(parse_index("3"), Some(3));
        assert_eq!(parse_index(APPEND_STEP), None);
        assert_eq!(parse_index("01"), None);
        assert_eq!(parse_index(""), None);
    }

    #[test]
    fn relaxed_pointer_without_leading_slash() {
        assert_eq!(parse_json_pointer("a/b"), vec!["a", "b"]);
        assert!(try_parse_json_pointer("a/b").is_err());
    }
}
