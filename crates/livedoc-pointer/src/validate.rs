//! Limits on pointers arriving in server patches.
//!
//! A patch op names its target with a pointer string. Anything that is not
//! rooted, or is long or deep enough to point nowhere sensible in a widget
//! document, is refused before the document is touched.

use thiserror::Error;

/// Longest pointer string accepted, in bytes.
pub const MAX_POINTER_BYTES: usize = 1024;

/// Deepest path accepted, in steps.
pub const MAX_PATH_DEPTH: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("pointer must start with '/'")]
    NotRooted,
    #[error("pointer is {len} bytes, limit is {MAX_POINTER_BYTES}")]
    TooLong { len: usize },
    #[error("path has {depth} steps, limit is {MAX_PATH_DEPTH}")]
    TooDeep { depth: usize },
}

/// Check a pointer string before parsing. The empty pointer names the
/// document root.
///
/// ```
/// use livedoc_pointer::{validate_json_pointer, ValidationError};
///
/// assert!(validate_json_pointer("").is_ok());
/// assert!(validate_json_pointer("/panels/0/title").is_ok());
/// assert_eq!(validate_json_pointer("panels"), Err(ValidationError::NotRooted));
/// ```
pub fn validate_json_pointer(pointer: &str) -> Result<(), ValidationError> {
    match pointer.len() {
        0 => Ok(()),
        _ if !pointer.starts_with('/') => Err(ValidationError::NotRooted),
        len if len > MAX_POINTER_BYTES => Err(ValidationError::TooLong { len }),
        _ => Ok(()),
    }
}

pub fn validate_path(path: &[String]) -> Result<(), ValidationError> {
    match path.len() {
        depth if depth > MAX_PATH_DEPTH => Err(ValidationError::TooDeep { depth }),
        _ => Ok(()),
    }
}
