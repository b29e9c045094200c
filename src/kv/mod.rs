//! KV Module
//!
//! Generic key-value stores used for per-client ephemeral properties.
//!
//! ## Responsibilities
//! - One small contract (`put`/`get`/`del`) every store implements
//! - A map-backed store with lazy, per-key initialization (`KVMap`)
//! - Ordered layering of several stores (`KVStores`)
//!
//! ## Absent Stores
//! An absent store (`None`) is a valid, fully inert store: writes are
//! dropped and reads find nothing. The blanket impl for `Option<S>` gives
//! every store that behaviour for free.

mod map;

use std::sync::Arc;

pub use map::KVMap;

/// A generic key-value store.
///
/// All operations are safe for concurrent access and never fail.
pub trait KVStore<K, V>: Send + Sync {
    /// Store `value` under `key`, replacing any previous value
    fn put(&self, key: K, value: V);

    /// Return the value stored under `key`, if any
    fn get(&self, key: &K) -> Option<V>;

    /// Remove the value stored under `key`
    fn del(&self, key: &K);
}

/// Stores that can build a missing value on demand.
pub trait KVRef<K, V>: KVStore<K, V> {
    /// Return the value under `key`, calling `init` to create it if missing.
    ///
    /// `init` runs at most once per key, even with concurrent callers.
    fn ref_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V;
}

// =============================================================================
// Blanket Implementations
// =============================================================================

impl<K, V, S> KVStore<K, V> for Option<S>
where
    S: KVStore<K, V>,
{
    fn put(&self, key: K, value: V) {
        if let Some(store) = self {
            store.put(key, value);
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.as_ref().and_then(|store| store.get(key))
    }

    fn del(&self, key: &K) {
        if let Some(store) = self {
            store.del(key);
        }
    }
}

impl<K, V, S> KVRef<K, V> for Option<S>
where
    S: KVRef<K, V>,
{
    fn ref_with<F>(&self, key: K, init: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self {
            Some(store) => store.ref_with(key, init),
            // nothing to cache into
            None => init(),
        }
    }
}

impl<K, V, S> KVStore<K, V> for Arc<S>
where
    S: KVStore<K, V> + ?Sized,
{
    fn put(&self, key: K, value: V) {
        (**self).put(key, value);
    }

    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn del(&self, key: &K) {
        (**self).del(key);
    }
}

impl<K, V, S> KVStore<K, V> for &S
where
    S: KVStore<K, V> + ?Sized,
{
    fn put(&self, key: K, value: V) {
        (**self).put(key, value);
    }

    fn get(&self, key: &K) -> Option<V> {
        (**self).get(key)
    }

    fn del(&self, key: &K) {
        (**self).del(key);
    }
}

// =============================================================================
// Layered Stores
// =============================================================================

/// A store that duplicates its operations on an ordered list of stores.
///
/// - `put` writes to every store in the list
/// - `get` returns the first hit, scanning in list order
/// - `del` removes the key from every store
///
/// `None` entries are skipped, so a list can hold optional layers.
pub struct KVStores<K, V> {
    layers: Vec<Option<Arc<dyn KVStore<K, V>>>>,
}

impl<K, V> KVStores<K, V> {
    /// Create an empty list (behaves as an empty store)
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a layer; earlier layers take precedence on `get`
    pub fn with(mut self, store: Option<Arc<dyn KVStore<K, V>>>) -> Self {
        self.layers.push(store);
        self
    }

    /// Number of layers, present or not
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when the list has no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    fn present(&self) -> impl Iterator<Item = &Arc<dyn KVStore<K, V>>> {
        self.layers.iter().flatten()
    }
}

impl<K, V> Default for KVStores<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for KVStores<K, V> {
    fn clone(&self) -> Self {
        Self {
            layers: self.layers.clone(),
        }
    }
}

impl<K, V> FromIterator<Option<Arc<dyn KVStore<K, V>>>> for KVStores<K, V> {
    fn from_iter<I: IntoIterator<Item = Option<Arc<dyn KVStore<K, V>>>>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}

impl<K, V> KVStore<K, V> for KVStores<K, V>
where
    K: Clone,
    V: Clone,
{
    fn put(&self, key: K, value: V) {
        for store in self.present() {
            store.put(key.clone(), value.clone());
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.present().find_map(|store| store.get(key))
    }

    fn del(&self, key: &K) {
        for store in self.present() {
            store.del(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(map: &Arc<KVMap<&'static str, i32>>) -> Option<Arc<dyn KVStore<&'static str, i32>>> {
        let store: Arc<dyn KVStore<&'static str, i32>> = map.clone();
        Some(store)
    }

    #[test]
    fn test_get_prefers_earlier_layer() {
        let a = Arc::new(KVMap::new());
        let b = Arc::new(KVMap::new());
        a.put("k1", 1);
        b.put("k1", 2);
        b.put("k2", 3);

        let stores = KVStores::new().with(layer(&a)).with(layer(&b));

        assert_eq!(stores.get(&"k1"), Some(1));
        assert_eq!(stores.get(&"k2"), Some(3));
        assert_eq!(stores.get(&"missing"), None);
    }

    #[test]
    fn test_absent_layers_are_skipped() {
        let a = Arc::new(KVMap::new());
        let stores = KVStores::new().with(None).with(layer(&a)).with(None);

        stores.put("k", 7);
        assert_eq!(a.get(&"k"), Some(7));
        assert_eq!(stores.get(&"k"), Some(7));

        stores.del(&"k");
        assert_eq!(a.get(&"k"), None);
    }

    #[test]
    fn test_absent_store_is_inert() {
        let none: Option<KVMap<&'static str, i32>> = None;
        none.put("k", 1);
        assert_eq!(none.get(&"k"), None);
        none.del(&"k");
        assert_eq!(none.ref_with("k", || 9), 9);
        assert_eq!(none.ref_with("k", || 10), 10);

        let no_list: Option<KVStores<&'static str, i32>> = None;
        no_list.put("k", 1);
        assert_eq!(no_list.get(&"k"), None);
    }
}
