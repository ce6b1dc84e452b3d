//! Criterion benchmark untuk CycleClock
//!
//! Run dengan: cargo bench --bench clock_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tickwire::clock::{read_cycles, read_wall_ns, sync_time, CycleClock};

fn bench_reads(c: &mut Criterion) {
    let mut group = c.benchmark_group("clock");

    let clock = CycleClock::new();
    clock.init(20_000_000, 3_000_000_000);

    group.bench_function("read_cycles", |b| b.iter(|| black_box(read_cycles())));
    group.bench_function("read_wall_ns", |b| b.iter(|| black_box(read_wall_ns())));
    group.bench_function("now_ns", |b| b.iter(|| black_box(clock.now_ns())));
    group.bench_function("cycles_to_ns", |b| {
        let cycles = read_cycles();
        b.iter(|| black_box(clock.cycles_to_ns(black_box(cycles))))
    });

    // Jalur skip: belum waktunya rekalibrasi
    group.bench_function("calibrate_skip", |b| b.iter(|| clock.calibrate()));
    group.bench_function("sync_time", |b| b.iter(|| black_box(sync_time())));

    group.finish();
}

criterion_group!(benches, bench_reads);
criterion_main!(benches);
