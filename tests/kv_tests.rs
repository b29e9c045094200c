//! KV Tests
//!
//! Tests verify:
//! - Basic put/get/del on KVMap
//! - Lazy initialization with `ref_with` (once per key, shared result)
//! - Layered lookups and fan-out writes with KVStores
//! - Absent stores behave as empty stores

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use agentipc::kv::{KVMap, KVRef, KVStore, KVStores};

// =============================================================================
// Helper Functions
// =============================================================================

fn layer<V: Clone + Send + Sync + 'static>(
    map: &Arc<KVMap<String, V>>,
) -> Option<Arc<dyn KVStore<String, V>>> {
    let store: Arc<dyn KVStore<String, V>> = map.clone();
    Some(store)
}

fn key(s: &str) -> String {
    s.to_string()
}

// =============================================================================
// KVMap Basic Operations Tests
// =============================================================================

#[test]
fn test_put_and_get() {
    let map = KVMap::new();
    map.put(key("k1"), "v1");

    assert_eq!(map.get(&key("k1")), Some("v1"));
    assert_eq!(map.get(&key("k2")), None);
}

#[test]
fn test_put_overwrites_existing() {
    let map = KVMap::new();
    map.put(key("k1"), 1);
    map.put(key("k1"), 2);

    assert_eq!(map.get(&key("k1")), Some(2));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_del_removes_value() {
    let map = KVMap::new();
    map.put(key("k1"), 1);
    map.del(&key("k1"));

    assert_eq!(map.get(&key("k1")), None);
    assert!(map.is_empty());
}

#[test]
fn test_del_missing_key_is_noop() {
    let map: KVMap<String, i32> = KVMap::new();
    map.del(&key("nope"));
    assert!(map.is_empty());
}

#[test]
fn test_clear_discards_everything() {
    let map = KVMap::new();
    map.put(key("a"), 1);
    map.ref_with(key("b"), || 2);

    map.clear();

    assert!(map.is_empty());
    assert_eq!(map.get(&key("a")), None);
    assert_eq!(map.get(&key("b")), None);
    // usable again after clear
    map.put(key("a"), 3);
    assert_eq!(map.get(&key("a")), Some(3));
}

#[test]
fn test_values_unwraps_boxes() {
    let map = KVMap::new();
    map.put(key("direct"), 1);
    map.ref_with(key("lazy"), || 2);

    let values = map.values();
    assert_eq!(values.len(), 2);
    assert_eq!(values.get("direct"), Some(&1));
    assert_eq!(values.get("lazy"), Some(&2));
}

#[test]
fn test_values_is_a_snapshot() {
    let map = KVMap::new();
    map.put(key("a"), 1);

    let values = map.values();
    map.put(key("a"), 2);
    map.put(key("b"), 3);

    assert_eq!(values.len(), 1);
    assert_eq!(values.get("a"), Some(&1));
}

// =============================================================================
// Lazy Initialization Tests
// =============================================================================

#[test]
fn test_ref_initializes_once() {
    let map = KVMap::new();
    let calls = AtomicUsize::new(0);

    let first = map.ref_with(key("k"), || {
        calls.fetch_add(1, Ordering::SeqCst);
        10
    });
    let second = map.ref_with(key("k"), || {
        calls.fetch_add(1, Ordering::SeqCst);
        20
    });

    assert_eq!(first, 10);
    assert_eq!(second, 10);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(map.get(&key("k")), Some(10));
}

#[test]
fn test_put_after_ref_replaces_value() {
    let map = KVMap::new();
    map.ref_with(key("k"), || 1);
    map.put(key("k"), 2);

    assert_eq!(map.get(&key("k")), Some(2));
    assert_eq!(map.ref_with(key("k"), || 3), 2);
}

#[test]
fn test_ref_after_del_reinitializes() {
    let map = KVMap::new();
    map.ref_with(key("k"), || 1);
    map.del(&key("k"));

    assert_eq!(map.ref_with(key("k"), || 2), 2);
}

#[test]
fn test_concurrent_ref_initializes_once() {
    const THREADS: usize = 16;

    let map: Arc<KVMap<String, Arc<usize>>> = Arc::new(KVMap::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let map = Arc::clone(&map);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                map.ref_with(key("shared"), || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Arc::new(n)
                })
            })
        })
        .collect();

    let results: Vec<Arc<usize>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for r in &results {
        assert!(Arc::ptr_eq(r, &results[0]));
    }
}

#[test]
fn test_get_waits_for_materialization() {
    let map: Arc<KVMap<String, i32>> = Arc::new(KVMap::new());

    let builder = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            map.ref_with(key("slow"), || {
                thread::sleep(Duration::from_millis(100));
                42
            })
        })
    };

    // let the builder take the box lock
    thread::sleep(Duration::from_millis(20));
    assert_eq!(map.get(&key("slow")), Some(42));
    assert_eq!(builder.join().unwrap(), 42);
}

// =============================================================================
// KVStores Tests
// =============================================================================

#[test]
fn test_stores_get_returns_first_hit() {
    let a = Arc::new(KVMap::new());
    let b = Arc::new(KVMap::new());
    a.put(key("k1"), "from-a");
    b.put(key("k1"), "from-b");

    let stores = KVStores::new().with(layer(&a)).with(layer(&b));
    assert_eq!(stores.get(&key("k1")), Some("from-a"));

    a.del(&key("k1"));
    assert_eq!(stores.get(&key("k1")), Some("from-b"));
}

#[test]
fn test_stores_put_writes_every_layer() {
    let a = Arc::new(KVMap::new());
    let b = Arc::new(KVMap::new());
    let stores = KVStores::new().with(layer(&a)).with(None).with(layer(&b));

    stores.put(key("k"), 5);

    assert_eq!(a.get(&key("k")), Some(5));
    assert_eq!(b.get(&key("k")), Some(5));
}

#[test]
fn test_stores_del_removes_from_every_layer() {
    let a = Arc::new(KVMap::new());
    let b = Arc::new(KVMap::new());
    a.put(key("k1"), 1);
    b.put(key("k1"), 2);

    let stores = KVStores::new().with(layer(&a)).with(layer(&b));
    stores.del(&key("k1"));

    assert_eq!(a.get(&key("k1")), None);
    assert_eq!(b.get(&key("k1")), None);
    assert_eq!(stores.get(&key("k1")), None);
}

#[test]
fn test_stores_from_iterator() {
    let a = Arc::new(KVMap::new());
    a.put(key("k"), 1);

    let stores: KVStores<String, i32> = vec![None, layer(&a)].into_iter().collect();
    assert_eq!(stores.len(), 2);
    assert_eq!(stores.get(&key("k")), Some(1));
}

// =============================================================================
// Absent Store Tests
// =============================================================================

#[test]
fn test_absent_map_is_inert() {
    let map: Option<KVMap<String, i32>> = None;

    map.put(key("k"), 1);
    assert_eq!(map.get(&key("k")), None);
    map.del(&key("k"));

    let calls = AtomicUsize::new(0);
    let v = map.ref_with(key("k"), || {
        calls.fetch_add(1, Ordering::SeqCst);
        7
    });
    assert_eq!(v, 7);
    map.ref_with(key("k"), || {
        calls.fetch_add(1, Ordering::SeqCst);
        7
    });
    // nothing is cached without a map
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_absent_and_empty_stores_are_inert() {
    let none: Option<KVStores<String, i32>> = None;
    none.put(key("k"), 1);
    assert_eq!(none.get(&key("k")), None);
    none.del(&key("k"));

    let empty: KVStores<String, i32> = KVStores::new();
    assert!(empty.is_empty());
    empty.put(key("k"), 1);
    assert_eq!(empty.get(&key("k")), None);
    empty.del(&key("k"));
}
