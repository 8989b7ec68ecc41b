use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use tincan_bind::runtime::Host;
use tincan_bind::{combine, use_store, use_stores, Store};

fn store_set_benchmark(c: &mut Criterion) {
    let store = Store::new(0usize);

    c.bench_function("store_set", |b| {
        let mut i = 0;
        b.iter(|| {
            store.set(black_box(i));
            i += 1;
        });
    });
}

fn store_subscribe_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_subscribe");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(0usize);
        let subscriptions: Vec<_> = (0..*subscriber_count)
            .map(|_| {
                store.subscribe(|_| {
                    // Empty subscriber
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.update(|_| black_box(i));
                    i += 1;
                });
            },
        );
        drop(subscriptions);
    }
    group.finish();
}

fn combine_benchmark(c: &mut Criterion) {
    let inputs: Vec<Store<usize>> = (0..16).map(Store::new).collect();
    let combined = combine(inputs.clone());
    let _subscription = combined.subscribe(|values: &Vec<usize>| {
        black_box(values.len());
    });

    c.bench_function("combine_input_change", |b| {
        let mut i = 0;
        b.iter(|| {
            inputs[i % 16].set(black_box(i));
            i += 1;
        });
    });
}

fn use_store_flush_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("use_store_flush");

    for component_count in [1, 10, 100].iter() {
        let host = Host::default();
        let store = Store::new(0usize);
        let views: Vec<_> = (0..*component_count)
            .map(|_| {
                host.mount_fn({
                    let store = store.clone();
                    move |scope| use_store(scope, &store)
                })
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(component_count),
            component_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    store.set(black_box(i));
                    i += 1;
                    host.flush().unwrap()
                });
            },
        );
        drop(views);
    }
    group.finish();
}

fn use_stores_rebuild_benchmark(c: &mut Criterion) {
    let host = Host::default();
    let pool: Vec<Store<usize>> = (0..8).map(Store::new).collect();
    let rotation = std::rc::Rc::new(std::cell::Cell::new(0usize));

    let view = host.mount_fn({
        let pool = pool.clone();
        let rotation = rotation.clone();
        move |scope| {
            let mut stores = pool.clone();
            stores.rotate_left(rotation.get() % pool.len());
            use_stores(scope, &stores).len()
        }
    });

    c.bench_function("use_stores_rebuild", |b| {
        b.iter(|| {
            rotation.set(rotation.get() + 1);
            view.update(|_| {}).unwrap();
            host.flush().unwrap()
        });
    });
}

criterion_group!(
    benches,
    store_set_benchmark,
    store_subscribe_benchmark,
    combine_benchmark,
    use_store_flush_benchmark,
    use_stores_rebuild_benchmark,
);
criterion_main!(benches);
