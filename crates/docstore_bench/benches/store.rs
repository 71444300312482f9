//! Store operation benchmarks over the in-memory backend.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docstore_bench::person_payload;
use docstore_core::{Context, DocumentStore, MemoryBackend, StoreConfig, Telemetry};
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn open(rt: &Runtime) -> DocumentStore<MemoryBackend> {
    let config = StoreConfig::new("bench", "persons");
    rt.block_on(DocumentStore::with_backend(
        config,
        MemoryBackend::new(),
        Telemetry::silent(),
    ))
    .unwrap()
}

/// Benchmark single inserts.
fn bench_insert(c: &mut Criterion) {
    let rt = runtime();
    let store = open(&rt);
    let ctx = Context::background();
    let payload = person_payload(1);

    c.bench_function("insert_one", |b| {
        b.iter(|| {
            let id = rt
                .block_on(store.insert_one(&ctx, black_box(&payload)))
                .unwrap();
            black_box(id);
        });
    });
}

/// Benchmark filtered reads over collections of growing size.
fn bench_find_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_many_filter_json");
    let rt = runtime();
    let ctx = Context::background();

    for count in [100, 1000, 10000].iter() {
        let store = open(&rt);
        for i in 0..*count {
            rt.block_on(store.insert_one(&ctx, &person_payload(i)))
                .unwrap();
        }

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| {
                let found = rt
                    .block_on(store.find_many_filter_json(&ctx, br#"{"Gender":"female"}"#))
                    .unwrap();
                black_box(found);
            });
        });
    }
    group.finish();
}

/// Benchmark lookups by identifier.
fn bench_find_by_id(c: &mut Criterion) {
    let rt = runtime();
    let store = open(&rt);
    let ctx = Context::background();
    let ids: Vec<_> = (0..1000)
        .map(|i| rt.block_on(store.insert_one(&ctx, &person_payload(i))).unwrap())
        .collect();

    c.bench_function("find_by_id", |b| {
        let mut next = 0;
        b.iter(|| {
            let doc = rt.block_on(store.find_by_id(&ctx, ids[next % ids.len()])).unwrap();
            next += 1;
            black_box(doc);
        });
    });
}

criterion_group!(benches, bench_insert, bench_find_many, bench_find_by_id);
criterion_main!(benches);
