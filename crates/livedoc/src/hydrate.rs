//! Hydration: replace sentinels in a raw document with live values and
//! reconcile the reference tables by mark-and-sweep.
//!
//! A pass starts with one dead set per table holding every live id. The
//! walk removes each id it meets. Whatever is left when the walk finishes is
//! no longer referenced and gets released. The walk itself never mutates the
//! tables: new entries are staged and only committed when the whole pass
//! succeeds, so a failed pass leaves the tables exactly as they were.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use indexmap::IndexMap;
use livedoc_patch::{Doc, DocMap};
use livedoc_rpc::RpcChannel;
use tracing::{debug, trace, warn};

use crate::callable::Callable;
use crate::error::{HydrateError, ProtocolError};
use crate::hydrated::{ExportedObject, Hydrated, HydratedMap, UriObject};
use crate::refs::ReferenceTables;
use crate::resource::{ElementFactory, SharedHandle, UriResolver};
use crate::sentinel::{Sentinel, URI_ELEMENT};

/// Collaborators and switches for one pass.
pub struct HydrateEnv<'a> {
    pub channel: &'a RpcChannel,
    pub factory: &'a dyn ElementFactory,
    pub resolver: &'a dyn UriResolver,
    /// Hydrate undelivered exported objects to `null` instead of failing.
    pub tolerate_missing_handles: bool,
    /// Send `disposeCallable` for every callable the sweep drops.
    pub dispose_callables: bool,
}

/// Hydrate `doc` against the session's tables.
///
/// `delivered` holds the handles that arrived with the current message,
/// keyed by their session-wide ids. Every one of them is either adopted by
/// the exported-object table or closed before this returns.
pub fn hydrate(
    doc: &Doc,
    delivered: BTreeMap<u64, SharedHandle>,
    tables: &mut ReferenceTables,
    env: &HydrateEnv<'_>,
) -> Result<Hydrated, HydrateError> {
    let mut pass = Pass::new(tables, &delivered, env);
    let result = pass.node(doc, true);
    let marks = pass.marks;
    match result {
        Ok(hydrated) => {
            marks.commit(tables, delivered, env);
            Ok(hydrated)
        }
        Err(err) => {
            debug!(error = %err, "hydration failed, discarding pass");
            marks.abandon(delivered);
            Err(err)
        }
    }
}

// ── Marks ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Marks {
    dead_objects: BTreeSet<u64>,
    dead_callables: BTreeSet<String>,
    dead_uris: BTreeSet<String>,
    new_objects: BTreeMap<u64, SharedHandle>,
    new_callables: BTreeMap<String, Callable>,
    new_uris: BTreeMap<String, SharedHandle>,
}

impl Marks {
    fn commit(self, tables: &mut ReferenceTables, mut delivered: BTreeMap<u64, SharedHandle>, env: &HydrateEnv<'_>) {
        for id in self.dead_objects {
            if let Some(handle) = tables.objects.remove(&id) {
                trace!(id, "releasing exported object");
                handle.close();
            }
        }
        for uri in self.dead_uris {
            if let Some(handle) = tables.uris.remove(&uri) {
                trace!(%uri, "releasing uri object");
                handle.close();
            }
        }
        for id in self.dead_callables {
            if let Some(callable) = tables.callables.remove(&id) {
                trace!(%id, "forgetting callable");
                if env.dispose_callables {
                    callable.dispose();
                }
            }
        }

        for (id, handle) in self.new_objects {
            delivered.remove(&id);
            tables.objects.insert(id, handle);
        }
        for (uri, handle) in self.new_uris {
            tables.uris.insert(uri, handle);
        }
        for (id, callable) in self.new_callables {
            tables.callables.insert(id, callable);
        }

        for (id, handle) in delivered {
            debug!(id, "closing delivered handle the document never referenced");
            handle.close();
        }
    }

    fn abandon(self, delivered: BTreeMap<u64, SharedHandle>) {
        for handle in delivered.into_values().chain(self.new_uris.into_values()) {
            handle.close();
        }
    }
}

// ── Walk ──────────────────────────────────────────────────────────────────

struct Pass<'p, 'e> {
    tables: &'p ReferenceTables,
    delivered: &'p BTreeMap<u64, SharedHandle>,
    env: &'p HydrateEnv<'e>,
    marks: Marks,
}

impl<'p, 'e> Pass<'p, 'e> {
    fn new(tables: &'p ReferenceTables, delivered: &'p BTreeMap<u64, SharedHandle>, env: &'p HydrateEnv<'e>) -> Self {
        let marks = Marks {
            dead_objects: tables.objects.ids().copied().collect(),
            dead_callables: tables.callables.ids().cloned().collect(),
            dead_uris: tables.uris.ids().cloned().collect(),
            ..Marks::default()
        };
        Self { tables, delivered, env, marks }
    }

    fn node(&mut self, doc: &Doc, at_root: bool) -> Result<Hydrated, HydrateError> {
        if let Some(scalar) = Hydrated::scalar(doc) {
            return Ok(scalar);
        }
        match Sentinel::classify(doc)? {
            Sentinel::Callable(id) => Ok(Hydrated::Callable(self.callable(id))),
            Sentinel::ExportedObject(id) => self.exported_object(id),
            // A URI at the root is the widget itself, not a reference to one.
            Sentinel::Uri { props, .. } if at_root => self.element(URI_ELEMENT, props),
            Sentinel::Uri { uri, .. } => self.uri(uri),
            Sentinel::Element { name, props } => self.element(name, props),
            Sentinel::Plain => match doc {
                Doc::Array(items) => {
                    let items = items.iter().map(|d| self.node(d, false)).collect::<Result<Vec<_>, _>>()?;
                    Ok(Hydrated::Array(Rc::new(items)))
                }
                Doc::Object(map) => Ok(Hydrated::Object(self.map(map)?)),
                _ => Ok(Hydrated::Null),
            },
        }
    }

    fn map(&mut self, map: &DocMap) -> Result<HydratedMap, HydrateError> {
        let mut out = IndexMap::with_capacity(map.len());
        for (key, value) in map {
            out.insert(key.clone(), self.node(value, false)?);
        }
        Ok(Rc::new(out))
    }

    fn callable(&mut self, id: &str) -> Callable {
        if let Some(existing) = self.tables.callables.get(id) {
            self.marks.dead_callables.remove(id);
            return existing.clone();
        }
        self.marks
            .new_callables
            .entry(id.to_string())
            .or_insert_with(|| Callable::new(id, self.env.channel))
            .clone()
    }

    fn exported_object(&mut self, id: u64) -> Result<Hydrated, HydrateError> {
        let handle = if let Some(existing) = self.tables.objects.get(&id) {
            self.marks.dead_objects.remove(&id);
            existing.clone()
        } else if let Some(staged) = self.marks.new_objects.get(&id) {
            staged.clone()
        } else if let Some(delivered) = self.delivered.get(&id) {
            self.marks.new_objects.insert(id, delivered.clone());
            delivered.clone()
        } else if self.env.tolerate_missing_handles {
            warn!(id, "exported object was never delivered, rendering null while the document is in error");
            return Ok(Hydrated::Null);
        } else {
            return Err(ProtocolError::MissingHandle(id).into());
        };
        Ok(Hydrated::ExportedObject(ExportedObject { id, handle }))
    }

    fn uri(&mut self, uri: &str) -> Result<Hydrated, HydrateError> {
        let handle = if let Some(existing) = self.tables.uris.get(uri) {
            self.marks.dead_uris.remove(uri);
            existing.clone()
        } else if let Some(staged) = self.marks.new_uris.get(uri) {
            staged.clone()
        } else {
            let handle = self
                .env
                .resolver
                .resolve(uri)
                .map_err(|reason| HydrateError::Uri { uri: uri.to_string(), reason })?;
            self.marks.new_uris.insert(uri.to_string(), handle.clone());
            handle
        };
        Ok(Hydrated::Uri(UriObject { uri: Rc::from(uri), handle }))
    }

    fn element(&mut self, name: &str, props: Option<&DocMap>) -> Result<Hydrated, HydrateError> {
        let props = match props {
            Some(props) => self.map(props)?,
            None => HydratedMap::default(),
        };
        self.env
            .factory
            .create(name, props)
            .map(Hydrated::Element)
            .map_err(|reason| HydrateError::Element { name: name.to_string(), reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ElementNode, NoUriResolver, PlainElements, PresentationNode, ResourceHandle};
    use livedoc_rpc::TransportError;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Default)]
    struct Counting(Cell<u32>);

    impl ResourceHandle for Counting {
        fn close(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn channel() -> RpcChannel {
        RpcChannel::new(|_: String| -> Result<(), TransportError> { Ok(()) })
    }

    fn run(
        doc: serde_json::Value,
        handles: &[Rc<Counting>],
        tables: &mut ReferenceTables,
        tolerate: bool,
    ) -> Result<Hydrated, HydrateError> {
        let channel = channel();
        let env = HydrateEnv {
            channel: &channel,
            factory: &PlainElements,
            resolver: &NoUriResolver,
            tolerate_missing_handles: tolerate,
            dispose_callables: false,
        };
        let shared: Vec<SharedHandle> = handles.iter().map(|h| h.clone() as SharedHandle).collect();
        let delivered = tables.register_delivered(shared);
        hydrate(&Doc::from(doc), delivered, tables, &env)
    }

    #[test]
    fn plain_data_passes_through() {
        let mut tables = ReferenceTables::default();
        let out = run(json!({"a": [1, "two", null, true]}), &[], &mut tables, false).unwrap();
        assert_eq!(out.to_value(), json!({"a": [1, "two", null, true]}));
    }

    #[test]
    fn elements_get_hydrated_props() {
        let mut tables = ReferenceTables::default();
        let doc = json!({"__elemName": "ui.Panel", "props": {"children": [{"__cbid": "cb"}]}});
        let out = run(doc, &[], &mut tables, false).unwrap();
        let node = out.as_element().and_then(|n| n.as_any().downcast_ref::<ElementNode>()).unwrap();
        assert_eq!(node.name, "ui.Panel");
        let child = node.props.get("children").and_then(|c| c.get("0")).and_then(Hydrated::as_callable);
        assert_eq!(child.map(Callable::id), Some("cb"));
        assert!(tables.callables.contains("cb"));
    }

    #[test]
    fn missing_handle_fails_and_commits_nothing() {
        let kept = Rc::new(Counting::default());
        let mut tables = ReferenceTables::default();
        run(json!({"t": {"__obid": 0}}), &[kept.clone()], &mut tables, false).unwrap();

        let extra = Rc::new(Counting::default());
        let err = run(json!({"x": {"__obid": 9}, "c": {"__cbid": "new"}}), &[extra.clone()], &mut tables, false)
            .unwrap_err();
        assert_eq!(err, HydrateError::Protocol(ProtocolError::MissingHandle(9)));
        assert_eq!(tables.objects.ids().copied().collect::<Vec<_>>(), vec![0]);
        assert!(tables.callables.is_empty());
        assert_eq!(kept.0.get(), 0);
        assert_eq!(extra.0.get(), 1);
    }

    #[test]
    fn missing_handle_is_null_when_tolerated() {
        let mut tables = ReferenceTables::default();
        let out = run(json!({"x": {"__obid": 3}}), &[], &mut tables, true).unwrap();
        assert_eq!(out.to_value(), json!({"x": null}));
        assert!(tables.objects.is_empty());
    }

    #[test]
    fn unreferenced_deliveries_are_closed() {
        let used = Rc::new(Counting::default());
        let unused = Rc::new(Counting::default());
        let mut tables = ReferenceTables::default();
        run(json!([{"__obid": 0}]), &[used.clone(), unused.clone()], &mut tables, false).unwrap();
        assert_eq!((used.0.get(), unused.0.get()), (0, 1));
        assert_eq!(tables.objects.len(), 1);
    }

    #[test]
    fn root_uri_is_an_element_but_nested_uri_needs_a_resolver() {
        let mut tables = ReferenceTables::default();
        let root = json!({"__elemName": URI_ELEMENT, "props": {"uri": "dh://w"}});
        let out = run(root, &[], &mut tables, false).unwrap();
        assert!(out.as_element().is_some());
        assert!(tables.uris.is_empty());

        let nested = json!({"w": {"__elemName": URI_ELEMENT, "props": {"uri": "dh://w"}}});
        let err = run(nested, &[], &mut tables, false).unwrap_err();
        assert!(matches!(err, HydrateError::Uri { .. }));
    }
}
