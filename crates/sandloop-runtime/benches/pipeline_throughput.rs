//! Throughput of the update loop.
//!
//! Measures messages per second through accept -> reduce -> render for the
//! inline configuration, the worker-thread configuration, and a loop where
//! every message triggers a command.
//!
//! Run with: cargo bench -p sandloop-runtime --bench pipeline_throughput

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sandloop_core::{Return, WorkerThread};
use sandloop_runtime::Sandbox;
use sandloop_runtime::dispatcher::{dispatch, stream};

const BATCHES: &[u64] = &[100, 1_000, 10_000];

fn bench_inline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/inline");
    for &n in BATCHES {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let sandbox = Sandbox::pure(0u64, |m: u64, s: &u64| s.wrapping_add(m), |s: &u64| {
                black_box(*s);
            })
            .start()
            .unwrap();
            b.iter(|| {
                for i in 0..n {
                    sandbox.accept(black_box(i));
                }
            });
        });
    }
    group.finish();
}

fn bench_worker(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/worker");
    group.measurement_time(Duration::from_secs(5));
    for &n in BATCHES {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let rendered = Arc::new(AtomicU64::new(0));
            let counter = Arc::clone(&rendered);
            let sandbox = Sandbox::pure(0u64, |m: u64, s: &u64| s.wrapping_add(m), move |_: &u64| {
                counter.fetch_add(1, Ordering::Release);
            })
            .update_context(WorkerThread::start("bench-update").unwrap())
            .start()
            .unwrap();
            b.iter(|| {
                let target = rendered.load(Ordering::Acquire) + n;
                for i in 0..n {
                    sandbox.accept(black_box(i));
                }
                while rendered.load(Ordering::Acquire) < target {
                    std::hint::spin_loop();
                }
            });
        });
    }
    group.finish();
}

#[derive(Debug, Clone, Copy)]
enum Msg {
    Request(u64),
    Reply(u64),
}

fn bench_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/commands");
    for &n in BATCHES {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let sandbox = Sandbox::create(
                Return::Pure(0u64),
                |msg: Msg, s: &u64| match msg {
                    Msg::Request(x) => Return::Effect(*s, x),
                    Msg::Reply(x) => Return::Pure(s.wrapping_add(x)),
                },
                |s: &u64| {
                    black_box(*s);
                },
                dispatch(
                    |x: &u64| stream::just::<Msg, ()>(Msg::Reply(*x)),
                    |x: u64, _: ()| Msg::Reply(x),
                ),
            );
            b.iter(|| {
                for i in 0..n {
                    sandbox.accept(Msg::Request(black_box(i)));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_inline, bench_worker, bench_commands);
criterion_main!(benches);
