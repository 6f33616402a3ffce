//! Benchmarks for collection mutations and emission.
//!
//! Run with: cargo bench -p obslist --bench collection_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use obslist::{ObservableCollection, Subscription};
use std::cell::Cell;
use std::hint::black_box;
use std::rc::Rc;

fn counting_subscriber(collection: &ObservableCollection<u32>) -> (Rc<Cell<usize>>, Subscription) {
    let records = Rc::new(Cell::new(0usize));
    let records_clone = Rc::clone(&records);
    let sub = collection.subscribe(move |event| {
        if let Some(batch) = event.value() {
            records_clone.set(records_clone.get() + batch.len());
        }
    });
    (records, sub)
}

// =============================================================================
// Append
// =============================================================================

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/append");

    for n in [100u32, 1_000, 10_000] {
        group.throughput(Throughput::Elements(u64::from(n)));
        group.bench_with_input(BenchmarkId::new("one_by_one", n), &n, |b, &n| {
            b.iter(|| {
                let mut collection = ObservableCollection::new();
                let (_records, _sub) = counting_subscriber(&collection);
                for v in 0..n {
                    collection.append(v).unwrap();
                }
                black_box(collection.count())
            })
        });
        group.bench_with_input(BenchmarkId::new("batch", n), &n, |b, &n| {
            b.iter(|| {
                let mut collection = ObservableCollection::new();
                let (_records, _sub) = counting_subscriber(&collection);
                collection.append_all(0..n).unwrap();
                black_box(collection.count())
            })
        });
    }

    group.finish();
}

// =============================================================================
// Remove
// =============================================================================

fn bench_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection/remove");

    for n in [100u32, 1_000] {
        group.throughput(Throughput::Elements(u64::from(n)));
        group.bench_with_input(BenchmarkId::new("by_value_from_back", n), &n, |b, &n| {
            b.iter(|| {
                let mut collection = ObservableCollection::from_values(0..n).unwrap();
                for v in (0..n).rev() {
                    collection.remove(&v).unwrap();
                }
                black_box(collection.is_empty())
            })
        });
    }

    group.finish();
}

// =============================================================================
// Grouping and nested forwarding
// =============================================================================

fn bench_grouped(c: &mut Criterion) {
    c.bench_function("collection/grouped_1000", |b| {
        b.iter(|| {
            let mut collection = ObservableCollection::new();
            let (records, _sub) = counting_subscriber(&collection);
            collection.start_grouping_changes().unwrap();
            for v in 0..1_000u32 {
                collection.append(v).unwrap();
            }
            collection.stop_grouping_changes().unwrap();
            black_box(records.get())
        })
    });
}

fn bench_nested_forward(c: &mut Criterion) {
    c.bench_function("collection/nested_forward_100x10", |b| {
        b.iter(|| {
            let mut inner: Vec<_> = (0..100).map(|_| ObservableCollection::<u32>::new()).collect();
            let mut outer = ObservableCollection::from_values(0..100u32).unwrap();
            let (records, _sub) = counting_subscriber(&outer);
            let streams: Vec<_> = inner.iter().map(ObservableCollection::changes).collect();
            outer.observe("inner", move |sink, id| {
                let sink = sink.clone();
                let id = *id;
                Some(streams[id as usize].subscribe(move |event| {
                    if let Some(batch) = event.value() {
                        sink.send_nested(id, batch.iter().cloned());
                    }
                }))
            });
            for collection in &mut inner {
                for v in 0..10 {
                    collection.append(v).unwrap();
                }
            }
            black_box(records.get())
        })
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_remove,
    bench_grouped,
    bench_nested_forward
);
criterion_main!(benches);
