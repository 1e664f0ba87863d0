//! The hydrated document handed to the presentation layer.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use livedoc_patch::Doc;
use livedoc_pointer::parse_index;
use serde_json::{Number, Value};

use crate::callable::Callable;
use crate::resource::{PresentationNode, SharedHandle};

pub type HydratedMap = Rc<IndexMap<String, Hydrated>>;

/// A server object delivered over the transport, keyed by its export id.
#[derive(Clone)]
pub struct ExportedObject {
    pub id: u64,
    pub handle: SharedHandle,
}

/// An object addressed by URI.
#[derive(Clone)]
pub struct UriObject {
    pub uri: Rc<str>,
    pub handle: SharedHandle,
}

#[derive(Clone, Default)]
pub enum Hydrated {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Array(Rc<Vec<Hydrated>>),
    Object(HydratedMap),
    Callable(Callable),
    ExportedObject(ExportedObject),
    Uri(UriObject),
    Element(Rc<dyn PresentationNode>),
}

impl Hydrated {
    /// Scalars carry over unchanged. Containers are handled by the caller.
    pub(crate) fn scalar(doc: &Doc) -> Option<Self> {
        Some(match doc {
            Doc::Null => Hydrated::Null,
            Doc::Bool(b) => Hydrated::Bool(*b),
            Doc::Number(n) => Hydrated::Number(n.clone()),
            Doc::String(s) => Hydrated::String(s.clone()),
            Doc::Array(_) | Doc::Object(_) => return None,
        })
    }

    pub fn get(&self, key: &str) -> Option<&Hydrated> {
        match self {
            Hydrated::Object(map) => map.get(key),
            Hydrated::Array(items) => parse_index(key).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Hydrated::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Hydrated::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Hydrated::Callable(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_exported_object(&self) -> Option<&ExportedObject> {
        match self {
            Hydrated::ExportedObject(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&dyn PresentationNode> {
        match self {
            Hydrated::Element(node) => Some(&**node),
            _ => None,
        }
    }

    /// Plain JSON view. Live values render as their sentinel-free
    /// descriptions, which is what the host sees in logs.
    pub fn to_value(&self) -> Value {
        match self {
            Hydrated::Null => Value::Null,
            Hydrated::Bool(b) => Value::Bool(*b),
            Hydrated::Number(n) => Value::Number(n.clone()),
            Hydrated::String(s) => Value::String(s.to_string()),
            Hydrated::Array(items) => Value::Array(items.iter().map(Hydrated::to_value).collect()),
            Hydrated::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
            Hydrated::Callable(c) => Value::String(format!("<callable {}>", c.id())),
            Hydrated::ExportedObject(o) => Value::String(format!("<{} {}>", o.handle.kind(), o.id)),
            Hydrated::Uri(u) => Value::String(format!("<{} {}>", u.handle.kind(), u.uri)),
            Hydrated::Element(node) => Value::String(format!("{node:?}")),
        }
    }
}

impl fmt::Debug for Hydrated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}
