//! Save and load throughput.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docvault_core::{BackupService, Config};
use serde_json::json;
use tempfile::tempdir;

/// Build a to-do style document with `items` entries.
fn document(items: usize) -> Vec<u8> {
    let items: Vec<_> = (0..items)
        .map(|i| json!({ "id": i, "title": format!("task {i}"), "done": i % 3 == 0 }))
        .collect();
    serde_json::to_vec(&json!({ "items": items, "meta": { "author": "bench" } })).unwrap()
}

/// Benchmark full saves (validate, replace, commit).
fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save");
    group.sample_size(20);

    for items in [10, 100, 1000].iter() {
        let body = document(*items);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &body, |b, body| {
            let temp = tempdir().unwrap();
            let service =
                BackupService::open(temp.path(), Config::default().sync_on_commit(false)).unwrap();

            b.iter(|| {
                service.save(black_box(body)).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark loads of the working document.
fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");

    for items in [10, 100, 1000].iter() {
        let body = document(*items);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(items), &body, |b, body| {
            let temp = tempdir().unwrap();
            let service = BackupService::open(temp.path(), Config::default()).unwrap();
            service.save(body).unwrap();

            b.iter(|| {
                black_box(service.load().unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_save, bench_load);
criterion_main!(benches);
