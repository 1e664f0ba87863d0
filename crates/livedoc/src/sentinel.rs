//! Wire encoding of sentinel nodes.
//!
//! A sentinel is a JSON object carrying exactly one reserved key. Every
//! object in a document goes through [`Sentinel::classify`] once; nothing
//! else in the crate looks for reserved keys.

use livedoc_patch::{Doc, DocMap};

use crate::error::ProtocolError;

pub const CALLABLE_KEY: &str = "__cbid";
pub const OBJECT_KEY: &str = "__obid";
pub const ELEMENT_KEY: &str = "__elemName";
pub const PROPS_KEY: &str = "props";

/// Element tag of URI-addressed objects. The URI lives in `props.uri`.
pub const URI_ELEMENT: &str = "livedoc.elements.Uri";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sentinel<'a> {
    Callable(&'a str),
    ExportedObject(u64),
    Uri { uri: &'a str, props: Option<&'a DocMap> },
    Element { name: &'a str, props: Option<&'a DocMap> },
    Plain,
}

impl<'a> Sentinel<'a> {
    pub fn classify(doc: &'a Doc) -> Result<Self, ProtocolError> {
        let Some(map) = doc.as_object() else {
            return Ok(Sentinel::Plain);
        };
        let reserved = [CALLABLE_KEY, OBJECT_KEY, ELEMENT_KEY]
            .into_iter()
            .filter(|key| map.contains_key(*key))
            .count();
        if reserved > 1 {
            return Err(ProtocolError::MalformedSentinel(format!("more than one reserved key in {doc}")));
        }

        if let Some(id) = map.get(CALLABLE_KEY) {
            return id
                .as_str()
                .map(Sentinel::Callable)
                .ok_or_else(|| ProtocolError::MalformedSentinel(format!("{CALLABLE_KEY} must be a string, got {id}")));
        }
        if let Some(index) = map.get(OBJECT_KEY) {
            return index.as_u64().map(Sentinel::ExportedObject).ok_or_else(|| {
                ProtocolError::MalformedSentinel(format!("{OBJECT_KEY} must be a non-negative integer, got {index}"))
            });
        }
        let Some(name) = map.get(ELEMENT_KEY) else {
            return Ok(Sentinel::Plain);
        };
        let name = name
            .as_str()
            .ok_or_else(|| ProtocolError::MalformedSentinel(format!("{ELEMENT_KEY} must be a string, got {name}")))?;
        let props = match map.get(PROPS_KEY) {
            None | Some(Doc::Null) => None,
            Some(Doc::Object(props)) => Some(&**props),
            Some(other) => {
                return Err(ProtocolError::MalformedSentinel(format!("props of {name} must be an object, got {other}")))
            }
        };
        if name == URI_ELEMENT {
            let uri = props
                .and_then(|p| p.get("uri"))
                .and_then(Doc::as_str)
                .ok_or_else(|| ProtocolError::MalformedSentinel("uri element without props.uri".into()))?;
            return Ok(Sentinel::Uri { uri, props });
        }
        Ok(Sentinel::Element { name, props })
    }
}
