//! KVMap implementation
//!
//! HashMap-based store with a map-wide lock and lazy per-key boxes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{KVRef, KVStore};

/// Per-key lock and value, created by the first `ref_with` for a key
struct LazyBox<V> {
    val: Mutex<Option<V>>,
}

/// A table entry
enum Slot<V> {
    /// A plain value written by `put`
    Direct(V),

    /// A lazily materialized value; read under its own lock
    Deferred(Arc<LazyBox<V>>),
}

impl<V: Clone> Slot<V> {
    /// Unwrap the slot, waiting for any in-progress materialization
    fn value(&self) -> Option<V> {
        match self {
            Slot::Direct(v) => Some(v.clone()),
            Slot::Deferred(lazy) => lazy.val.lock().clone(),
        }
    }
}

impl<V: Clone> Clone for Slot<V> {
    fn clone(&self) -> Self {
        match self {
            Slot::Direct(v) => Slot::Direct(v.clone()),
            Slot::Deferred(lazy) => Slot::Deferred(Arc::clone(lazy)),
        }
    }
}

/// Map-backed key-value store
///
/// ## Concurrency:
/// - `vals`: one map-wide lock, held O(1) per call
/// - lazy boxes: one lock per key, held while a value is built
///
/// `ref_with` never runs an initializer under the map-wide lock, so an
/// expensive materialization only blocks callers of the same key.
///
/// The table itself is allocated on the first write.
pub struct KVMap<K, V> {
    vals: Mutex<Option<HashMap<K, Slot<V>>>>,
}

impl<K, V> KVMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create an empty map (no table is allocated yet)
    pub fn new() -> Self {
        Self {
            vals: Mutex::new(None),
        }
    }

    /// Remove all values
    pub fn clear(&self) {
        *self.vals.lock() = None;
    }

    /// Number of entries, including boxes still being materialized
    pub fn len(&self) -> usize {
        self.vals.lock().as_ref().map_or(0, HashMap::len)
    }

    /// True when the map holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the box for `key`, wrapping a direct value into a new box.
    /// Called with the map-wide lock held.
    fn lazy_box(table: &mut HashMap<K, Slot<V>>, key: K) -> Arc<LazyBox<V>> {
        let existing = match table.get(&key) {
            Some(Slot::Deferred(lazy)) => return Arc::clone(lazy),
            Some(Slot::Direct(v)) => Some(v.clone()),
            None => None,
        };

        let lazy = Arc::new(LazyBox {
            val: Mutex::new(existing),
        });
        table.insert(key, Slot::Deferred(Arc::clone(&lazy)));
        lazy
    }
}

impl<K, V> KVMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Snapshot of all materialized values, boxes unwrapped
    pub fn values(&self) -> HashMap<K, V> {
        // Copy the slots out first: unwrapping a box may wait on its lock
        let slots: Vec<(K, Slot<V>)> = match self.vals.lock().as_ref() {
            Some(table) => table.iter().map(|(k, s)| (k.clone(), s.clone())).collect(),
            None => return HashMap::new(),
        };

        slots
            .into_iter()
            .filter_map(|(k, slot)| slot.value().map(|v| (k, v)))
            .collect()
    }
}

impl<K, V> Default for KVMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KVStore<K, V> for KVMap<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn put(&self, key: K, value: V) {
        self.vals
            .lock()
            .get_or_insert_with(HashMap::new)
            .insert(key, Slot::Direct(value));
    }

    fn get(&self, key: &K) -> Option<V> {
        let slot = self.vals.lock().as_ref()?.get(key).cloned()?;
        slot.value()
    }

    fn del(&self, key: &K) {
        if let Some(table) = self.vals.lock().as_mut() {
            table.remove(key);
        }
    }
}

impl<K, V> KVRef<K, V> for KVMap<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn ref_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        let lazy = {
            let mut vals = self.vals.lock();
            Self::lazy_box(vals.get_or_insert_with(HashMap::new), key)
        };

        let mut val = lazy.val.lock();
        val.get_or_insert_with(init).clone()
    }
}
