//! Persistent JSON document value.
//!
//! Containers live behind `Rc`, so cloning a [`Doc`] is O(1) and two
//! snapshots of a document can share every subtree that a patch did not
//! touch. [`Doc::ptr_eq`] exposes that sharing to downstream consumers.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

use livedoc_pointer::parse_index;

/// Ordered object body. Key order is insertion order.
pub type DocMap = IndexMap<String, Doc>;

#[derive(Clone, Default)]
pub enum Doc {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Rc<str>),
    Array(Rc<Vec<Doc>>),
    Object(Rc<DocMap>),
}

impl Doc {
    pub fn empty_object() -> Self {
        Doc::Object(Rc::new(DocMap::new()))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Value>(text).map(Doc::from)
    }

    /// Reference identity.
    ///
    /// Containers and strings are identical when they share an allocation;
    /// scalars compare by value.
    pub fn ptr_eq(a: &Doc, b: &Doc) -> bool {
        match (a, b) {
            (Doc::Null, Doc::Null) => true,
            (Doc::Bool(x), Doc::Bool(y)) => x == y,
            (Doc::Number(x), Doc::Number(y)) => x == y,
            (Doc::String(x), Doc::String(y)) => Rc::ptr_eq(x, y),
            (Doc::Array(x), Doc::Array(y)) => Rc::ptr_eq(x, y),
            (Doc::Object(x), Doc::Object(y)) => Rc::ptr_eq(x, y),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Doc::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Doc::String(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Doc::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Doc]> {
        match self {
            Doc::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DocMap> {
        match self {
            Doc::Object(map) => Some(&**map),
            _ => None,
        }
    }

    /// Look up one path step.
    pub fn get_step(&self, step: &str) -> Option<&Doc> {
        match self {
            Doc::Object(map) => map.get(step),
            Doc::Array(items) => parse_index(step).and_then(|idx| items.get(idx)),
            _ => None,
        }
    }

    /// Look up a value by path. The empty path is the document itself.
    pub fn get(&self, path: &[String]) -> Option<&Doc> {
        path.iter().try_fold(self, |node, step| node.get_step(step))
    }

    pub fn to_value(&self) -> Value {
        Value::from(self)
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64().map(i128::from).or_else(|| n.as_u64().map(i128::from))
}

/// Integers compare exactly. `1` and `1.0` are the same JSON number.
fn numbers_equal(a: &Number, b: &Number) -> bool {
    match (integer(a), integer(b)) {
        (Some(x), Some(y)) => x == y,
        (Some(i), None) => integral_float_is(b, i),
        (None, Some(i)) => integral_float_is(a, i),
        (None, None) => a.as_f64() == b.as_f64(),
    }
}

fn integral_float_is(float: &Number, int: i128) -> bool {
    float.as_f64().is_some_and(|f| f.fract() == 0.0 && f as i128 == int)
}

/// Deep JSON equality. Object key order is not significant.
impl PartialEq for Doc {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Doc::Null, Doc::Null) => true,
            (Doc::Bool(a), Doc::Bool(b)) => a == b,
            (Doc::Number(a), Doc::Number(b)) => numbers_equal(a, b),
            (Doc::String(a), Doc::String(b)) => a == b,
            (Doc::Array(a), Doc::Array(b)) => Rc::ptr_eq(a, b) || a[..] == b[..],
            (Doc::Object(a), Doc::Object(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w)))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl fmt::Display for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

// ── Conversions ───────────────────────────────────────────────────────────

impl From<Value> for Doc {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Doc::Null,
            Value::Bool(b) => Doc::Bool(b),
            Value::Number(n) => Doc::Number(n),
            Value::String(s) => Doc::String(Rc::from(s)),
            Value::Array(items) => Doc::Array(Rc::new(items.into_iter().map(Doc::from).collect())),
            Value::Object(map) => Doc::Object(Rc::new(
                map.into_iter().map(|(k, v)| (k, Doc::from(v))).collect(),
            )),
        }
    }
}

impl From<&Doc> for Value {
    fn from(doc: &Doc) -> Self {
        match doc {
            Doc::Null => Value::Null,
            Doc::Bool(b) => Value::Bool(*b),
            Doc::Number(n) => Value::Number(n.clone()),
            Doc::String(s) => Value::String(s.to_string()),
            Doc::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
            Doc::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl From<&str> for Doc {
    fn from(s: &str) -> Self {
        Doc::String(Rc::from(s))
    }
}

impl FromIterator<(String, Doc)> for Doc {
    fn from_iter<I: IntoIterator<Item = (String, Doc)>>(iter: I) -> Self {
        Doc::Object(Rc::new(iter.into_iter().collect()))
    }
}

impl Serialize for Doc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self {
            Doc::Null => serializer.serialize_unit(),
            Doc::Bool(b) => serializer.serialize_bool(*b),
            Doc::Number(n) => n.serialize(serializer),
            Doc::String(s) => serializer.serialize_str(s),
            Doc::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Doc::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Doc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Doc::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_equality_ignores_key_order_and_number_repr() {
        let a = Doc::from(json!({"a": 1, "b": [1.0, {"c": null}]}));
        let b = Doc::from(json!({"b": [1, {"c": null}], "a": 1.0}));
        assert_eq!(a, b);
        assert_ne!(a, Doc::from(json!({"a": 1})));
    }

    #[test]
    fn integers_beyond_f64_precision_stay_distinct() {
        let big = Doc::from(json!(9007199254740993u64));
        assert_ne!(big, Doc::from(json!(9007199254740992u64)));
        assert_ne!(big, Doc::from(json!(9007199254740992.0)));
        assert_eq!(Doc::from(json!(u64::MAX)), Doc::from(json!(u64::MAX)));
        assert_ne!(Doc::from(json!(-1)), Doc::from(json!(u64::MAX)));
        assert_eq!(Doc::from(json!(-3)), Doc::from(json!(-3.0)));
        assert_ne!(Doc::from(json!(2)), Doc::from(json!(2.5)));
    }

    #[test]
    fn clone_shares_containers() {
        let a = Doc::from(json!({"x": {"y": 1}}));
        let b = a.clone();
        assert!(Doc::ptr_eq(&a, &b));
        let rebuilt = Doc::from(a.to_value());
        assert!(!Doc::ptr_eq(&a, &rebuilt));
        assert_eq!(a, rebuilt);
    }

    #[test]
    fn get_by_path() {
        let doc = Doc::from(json!({"a": [10, {"b": "hit"}]}));
        let path = vec!["a".to_string(), "1".to_string(), "b".to_string()];
        assert_eq!(doc.get(&path).and_then(Doc::as_str), Some("hit"));
        assert!(doc.get(&["a".to_string(), "01".to_string()]).is_none());
        assert!(doc.get(&[]).is_some());
    }

    #[test]
    fn serde_roundtrip_keeps_order() {
        let text = r#"{"z":1,"a":[true,"s"]}"#;
        let doc = Doc::parse(text).unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), text);
    }
}
