use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use topicbus::{Endpoint, EventBus};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn bench_subscribe_unsubscribe(c: &mut Criterion) {
    let bus = EventBus::<u64>::new();
    // держим один подписчик, чтобы топик не пересоздавался на каждой итерации
    let _anchor = bus.subscribe("chan");
    c.bench_function("subscribe_unsubscribe", |b| {
        b.iter(|| {
            let mut ep = bus.subscribe(black_box("chan"));
            bus.unsubscribe("chan", &mut ep).unwrap();
        })
    });
}

/// Публикация с N подписчиками; подписчики вычитываются сразу после
/// каждой публикации, чтобы не упираться в ёмкость endpoint'а.
fn bench_publish_fanout(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish_fanout");

    for n in [1usize, 10, 100] {
        let bus = EventBus::<u64>::new();
        let mut endpoints: Vec<Endpoint<u64>> = (0..n).map(|_| bus.subscribe("chan")).collect();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                rt.block_on(async {
                    bus.publish("chan", black_box(42)).await;
                });
                for ep in endpoints.iter_mut() {
                    black_box(ep.try_recv().unwrap());
                }
            })
        });
    }
    group.finish();
}

fn bench_publish_no_subscribers(c: &mut Criterion) {
    let rt = runtime();
    let bus = EventBus::<u64>::new();
    c.bench_function("publish_no_subscribers", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(bus.publish("empty", 1).await) })
    });
}

criterion_group!(
    benches,
    bench_subscribe_unsubscribe,
    bench_publish_fanout,
    bench_publish_no_subscribers,
);
criterion_main!(benches);
