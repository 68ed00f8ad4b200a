// Criterion benchmarks for devradar

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use devradar::core::{
    distance::{calculate_bounding_box, haversine_distance},
    NotificationDispatcher, RecordStore, SubscriptionRegistry,
};
use devradar::models::{BoundingBox, Record, TagFilter};
use std::sync::Arc;

const TAGS: &[&str] = &["clinic", "shelter", "pharmacy", "police", "hospital"];

fn create_record(id: usize) -> Record {
    // Spread records over roughly a 2°x2° area around Recife
    let lat = -9.0 + ((id * 7919) % 2000) as f64 * 0.001;
    let lon = -36.0 + ((id * 104_729) % 2000) as f64 * 0.001;
    Record::new(format!("r{}", id), lat, lon, [TAGS[id % TAGS.len()]])
}

fn viewport() -> BoundingBox {
    BoundingBox::new(-8.13, -8.09, -34.99, -34.95).unwrap()
}

fn bench_haversine_distance(c: &mut Criterion) {
    c.bench_function("haversine_distance", |b| {
        b.iter(|| {
            haversine_distance(
                black_box(-8.11),
                black_box(-34.97),
                black_box(-8.05),
                black_box(-34.90),
            )
        });
    });
}

fn bench_bounding_box(c: &mut Criterion) {
    c.bench_function("bounding_box_calculation", |b| {
        b.iter(|| calculate_bounding_box(black_box(-8.11), black_box(-34.97), black_box(10.0)));
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for record_count in [1_000, 10_000, 100_000].iter() {
        let store = RecordStore::new(0.05);
        for id in 0..*record_count {
            store.put(create_record(id)).unwrap();
        }

        group.bench_with_input(
            BenchmarkId::new("viewport_any_tag", record_count),
            record_count,
            |b, _| b.iter(|| store.query(black_box(&viewport()), black_box(&TagFilter::any()))),
        );

        let filter = TagFilter::new(["clinic"]);
        group.bench_with_input(
            BenchmarkId::new("viewport_clinic", record_count),
            record_count,
            |b, _| b.iter(|| store.query(black_box(&viewport()), black_box(&filter))),
        );
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    for subscription_count in [10, 100, 1_000].iter() {
        let registry = Arc::new(SubscriptionRegistry::new(1));
        let dispatcher = NotificationDispatcher::new(Arc::clone(&registry));
        let receivers: Vec<_> = (0..*subscription_count)
            .map(|i| {
                let offset = (i % 100) as f64 * 0.01;
                let area = BoundingBox::new(-9.0 + offset, -8.0 + offset, -36.0, -35.0).unwrap();
                registry.subscribe(&format!("c{}", i), area, TagFilter::any()).unwrap()
            })
            .collect();

        let record = Arc::new(create_record(42));
        group.bench_with_input(
            BenchmarkId::new("dispatch_record", subscription_count),
            subscription_count,
            |b, _| b.iter(|| dispatcher.dispatch(black_box(&record))),
        );

        drop(receivers);
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_haversine_distance,
    bench_bounding_box,
    bench_search,
    bench_dispatch
);

criterion_main!(benches);
