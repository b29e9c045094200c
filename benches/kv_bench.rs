//! Benchmarks for agentipc key-value stores

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use agentipc::kv::{KVMap, KVRef, KVStore, KVStores};

fn kv_benchmarks(c: &mut Criterion) {
    let map: KVMap<String, u64> = KVMap::new();
    let keys: Vec<String> = (0..1024).map(|i| format!("key-{}", i)).collect();

    c.bench_function("kvmap_put", |b| {
        let mut i = 0;
        b.iter(|| {
            map.put(keys[i % keys.len()].clone(), i as u64);
            i += 1;
        })
    });

    c.bench_function("kvmap_get", |b| {
        let mut i = 0;
        b.iter(|| {
            black_box(map.get(&keys[i % keys.len()]));
            i += 1;
        })
    });

    c.bench_function("kvmap_ref_with_hit", |b| {
        let mut i = 0;
        b.iter(|| {
            black_box(map.ref_with(keys[i % keys.len()].clone(), || 0));
            i += 1;
        })
    });

    c.bench_function("kvstores_get_second_layer", |b| {
        let top: Arc<KVMap<String, u64>> = Arc::new(KVMap::new());
        let bottom: Arc<KVMap<String, u64>> = Arc::new(KVMap::new());
        bottom.put("k".to_string(), 1);

        let top: Arc<dyn KVStore<String, u64>> = top;
        let bottom: Arc<dyn KVStore<String, u64>> = bottom;
        let stores = KVStores::new().with(Some(top)).with(Some(bottom));
        let key = "k".to_string();

        b.iter(|| black_box(stores.get(&key)))
    });

    c.bench_function("kvmap_ref_with_contended", |b| {
        b.iter(|| {
            let map: Arc<KVMap<String, u64>> = Arc::new(KVMap::new());
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let map = Arc::clone(&map);
                    thread::spawn(move || {
                        for i in 0..64u64 {
                            map.ref_with(format!("key-{}", i % 8), || i);
                        }
                    })
                })
                .collect();
            for h in handles {
                let _ = h.join();
            }
        })
    });
}

criterion_group!(benches, kv_benchmarks);
criterion_main!(benches);
