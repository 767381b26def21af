//! Benchmark: allocate/free throughput across size classes, single-threaded
//! and under multi-threaded lock contention.

use criterion::{criterion_group, criterion_main, Criterion};
use diehard_core::CombinedHeap;
use std::hint::black_box;
use std::time::Duration;

fn bench_small_alloc_free(c: &mut Criterion) {
    c.bench_function("small_alloc_free_32", |b| {
        let heap = CombinedHeap::new();
        b.iter(|| {
            let p = heap.allocate(black_box(32));
            black_box(p);
            heap.free(p);
        });
    });
}

fn bench_large_alloc_free(c: &mut Criterion) {
    c.bench_function("large_alloc_free_64kib", |b| {
        let heap = CombinedHeap::new();
        b.iter(|| {
            let p = heap.allocate(black_box(64 * 1024));
            black_box(p);
            heap.free(p);
        });
    });
}

fn bench_mixed_size_classes(c: &mut Criterion) {
    c.bench_function("mixed_size_classes_1000", |b| {
        let heap = CombinedHeap::new();
        let sizes = [8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096];
        b.iter(|| {
            let mut ptrs = Vec::with_capacity(1000);
            for i in 0..1000 {
                let sz = sizes[i % sizes.len()];
                ptrs.push(heap.allocate(sz));
            }
            for p in ptrs {
                heap.free(p);
            }
        });
    });
}

fn bench_sustained_churn(c: &mut Criterion) {
    c.bench_function("sustained_churn_64_objects", |b| {
        let heap = CombinedHeap::new();
        b.iter(|| {
            let mut live = Vec::new();
            for _ in 0..64 {
                let p = heap.allocate(64);
                if !p.is_null() {
                    live.push(p);
                }
            }
            for p in live {
                heap.free(p);
            }
        });
    });
}

fn bench_contended_heap(c: &mut Criterion) {
    use std::sync::Arc;
    c.bench_function("contended_alloc_free_4_threads", |b| {
        let heap = Arc::new(CombinedHeap::new());
        b.iter(|| {
            let mut handles = Vec::new();
            for _ in 0..4 {
                let heap = Arc::clone(&heap);
                handles.push(std::thread::spawn(move || {
                    for _ in 0..100 {
                        let p = heap.allocate(48);
                        if !p.is_null() {
                            heap.free(p);
                        }
                    }
                }));
            }
            for h in handles {
                h.join().unwrap();
            }
        });
    });
}

criterion_group!(
    name = alloc_benchmark;
    config = Criterion::default()
        .sample_size(30)
        .warm_up_time(Duration::from_millis(200))
        .measurement_time(Duration::from_secs(2))
        .noise_threshold(0.05)
        .confidence_level(0.99);
    targets =
        bench_small_alloc_free,
        bench_large_alloc_free,
        bench_mixed_size_classes,
        bench_sustained_churn,
        bench_contended_heap,
);

criterion_main!(alloc_benchmark);
