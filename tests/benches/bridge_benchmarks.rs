//! # Topic-ORM Bridge Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Topic addressing | build + format + parse | < 5µs |
//! | Correlation table | register + complete | < 5µs |
//! | Full call | read through broker and database module | < 1ms |

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orm_client::{request_topic, CorrelationTable, RequestId, ResponseTopic};
use orm_tests::integration::Harness;
use serde_json::json;
use shared_types::{Identity, ModuleKind, Operation, ReadRequest};
use std::time::Duration;

fn bench_topic_addressing(c: &mut Criterion) {
    let identity = Identity::new("memory://local", "db-0", ModuleKind::Backend, "backend-0");
    let mut group = c.benchmark_group("topic-addressing");

    group.bench_function("request_to_response_round_trip", |b| {
        b.iter(|| {
            let request = request_topic(&identity, RequestId::new(), Operation::Read);
            let wire = request.to_response().to_string();
            black_box(ResponseTopic::parse(&wire))
        })
    });

    group.finish();
}

fn bench_correlation_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlation-table");

    for preloaded in [0usize, 1_000, 10_000] {
        let table = CorrelationTable::new(Duration::from_secs(60));
        for _ in 0..preloaded {
            table
                .register(RequestId::new(), Box::new(|_: Bytes| {}), None)
                .expect("fresh id");
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("register_complete", preloaded),
            &preloaded,
            |b, _| {
                b.iter(|| {
                    let id = RequestId::new();
                    table
                        .register(id, Box::new(|payload: Bytes| drop(black_box(payload))), None)
                        .expect("fresh id");
                    black_box(table.complete(&id, Bytes::from_static(b"{}")))
                })
            },
        );
    }

    group.finish();
}

fn bench_full_call(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("runtime");
    let harness = runtime.block_on(Harness::start(Duration::from_secs(5)));
    harness.db.store().create("bench", json!({"n": 1})).expect("seed");

    let mut group = c.benchmark_group("full-call");
    group.measurement_time(Duration::from_secs(10));

    let request = ReadRequest { id: "bench".into() };
    group.bench_function("read", |b| {
        b.iter(|| runtime.block_on(harness.client.read(black_box(&request))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_topic_addressing,
    bench_correlation_table,
    bench_full_call
);
criterion_main!(benches);
