use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use cpio::core_async::{ActivityId, AsyncContext, ExecutionResult, FnOperation};
use cpio::observability::testing::CapturingLogProvider;
use cpio::observability::{log_every_n, log_every_period, EveryN, EveryPeriod, Severity};
use cpio::resilience::{RateController, RateControllerConfig};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

/// Raw throttle primitives without any logging behind them
fn bench_throttle_primitives(c: &mut Criterion) {
    let mut group = c.benchmark_group("throttle_primitives");
    group.throughput(Throughput::Elements(1));

    let period = EveryPeriod::new();
    group.bench_function("every_period", |b| {
        b.iter(|| black_box(period.should_log(Duration::from_secs(1))));
    });

    let every_n = EveryN::new();
    group.bench_function("every_n", |b| {
        b.iter(|| black_box(every_n.should_log(1_000)));
    });

    group.finish();
}

/// Throttled macros with a capturing sink; almost every call is suppressed
fn bench_throttled_macros(c: &mut Criterion) {
    let capture = CapturingLogProvider::new();
    let logger = capture.logger();
    let id = ActivityId::generate();

    let mut group = c.benchmark_group("throttled_macros");

    group.bench_function("log_every_period", |b| {
        b.iter(|| {
            log_every_period!(
                logger = logger;
                Severity::Info,
                Duration::from_secs(60),
                "Bench",
                id,
                "value {}",
                black_box(42)
            );
        });
    });

    for n in [10_u64, 1_000] {
        group.bench_with_input(BenchmarkId::new("log_every_n", n), &n, |b, &n| {
            b.iter(|| {
                log_every_n!(logger = logger; Severity::Info, n, "Bench", id, "value {}", 42);
            });
            capture.clear();
        });
    }

    group.finish();
}

/// Admit-and-complete round trip through a rate controller
fn bench_rate_controller(c: &mut Criterion) {
    let mut group = c.benchmark_group("rate_controller");

    for config in [
        RateControllerConfig::with_max(1_000),
        RateControllerConfig::with_max(1_000).strict(),
    ] {
        let label = format!("{:?}", config.admission);
        let controller = RateController::new(
            "bench",
            FnOperation::new(|ctx: AsyncContext<u64, u64>| {
                let value = *ctx.request;
                ctx.finish_with_response(value);
                ExecutionResult::success()
            }),
            config,
        )
        .unwrap();
        let request = Arc::new(7_u64);

        group.bench_function(BenchmarkId::new("submit", label), |b| {
            b.iter(|| {
                let ctx = AsyncContext::new(Arc::clone(&request), |ctx: AsyncContext<u64, u64>| {
                    black_box(ctx.response);
                });
                black_box(controller.submit(ctx))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_throttle_primitives,
    bench_throttled_macros,
    bench_rate_controller,
);

criterion_main!(benches);
