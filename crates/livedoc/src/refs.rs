//! Reference tables: which live handles the current document references.

use std::borrow::Borrow;
use std::collections::btree_map;
use std::collections::BTreeMap;

use tracing::trace;

use crate::callable::Callable;
use crate::resource::SharedHandle;

/// One id-keyed table.
#[derive(Debug, Clone)]
pub struct ReferenceTable<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K, V> Default for ReferenceTable<K, V> {
    fn default() -> Self {
        Self { entries: BTreeMap::new() }
    }
}

impl<K: Ord + Clone, V> ReferenceTable<K, V> {
    pub fn get<Q>(&self, id: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.get(id)
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> btree_map::Keys<'_, K, V> {
        self.entries.keys()
    }

    pub(crate) fn insert(&mut self, id: K, value: V) -> Option<V> {
        self.entries.insert(id, value)
    }

    pub(crate) fn remove(&mut self, id: &K) -> Option<V> {
        self.entries.remove(id)
    }

    pub(crate) fn drain(&mut self) -> BTreeMap<K, V> {
        std::mem::take(&mut self.entries)
    }
}

/// The three tables owned by one widget session.
#[derive(Debug, Default)]
pub struct ReferenceTables {
    pub objects: ReferenceTable<u64, SharedHandle>,
    pub callables: ReferenceTable<String, Callable>,
    pub uris: ReferenceTable<String, SharedHandle>,
    next_object_id: u64,
}

impl ReferenceTables {
    /// Give the handles delivered with one transport message their
    /// session-wide ids, in delivery order.
    pub fn register_delivered(&mut self, handles: Vec<SharedHandle>) -> BTreeMap<u64, SharedHandle> {
        let first = self.next_object_id;
        self.next_object_id += handles.len() as u64;
        if !handles.is_empty() {
            trace!(first, count = handles.len(), "handles delivered");
        }
        (first..).zip(handles).collect()
    }

    pub fn next_object_id(&self) -> u64 {
        self.next_object_id
    }

    /// Close every handle and forget every callable.
    pub fn release_all(&mut self) {
        for (id, handle) in self.objects.drain() {
            trace!(id, "releasing exported object");
            handle.close();
        }
        for (uri, handle) in self.uris.drain() {
            trace!(%uri, "releasing uri object");
            handle.close();
        }
        self.callables.drain();
    }
}
