//! Criterion benchmark untuk VarQueue
//!
//! Run dengan: cargo bench --bench var_queue_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tickwire::core::VarQueue;

#[derive(Clone, Copy, Default)]
struct BenchHeader {
    id: u32,
    timestamp: u64,
}

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("var_queue");
    group.throughput(Throughput::Elements(1));

    // Push+pop cycle, payload 4 bytes
    group.bench_function("push_pop_cycle_4b", |b| {
        let mut q: VarQueue<BenchHeader, 65536> = VarQueue::new();
        let (mut tx, mut rx) = q.split();
        let mut header = BenchHeader::default();
        let mut out = [0u8; 4];
        let mut i = 0u32;
        b.iter(|| {
            let sent = BenchHeader {
                id: i,
                timestamp: u64::from(i),
            };
            tx.push(black_box(&sent), black_box(&i.to_ne_bytes()));
            black_box(rx.pop(&mut header, &mut out));
            i = i.wrapping_add(1);
        });
    });

    // Payload 256 bytes, sering wrap di arena kecil
    group.bench_function("push_pop_cycle_256b_wrapping", |b| {
        let mut q: VarQueue<BenchHeader, 1000> = VarQueue::new();
        let (mut tx, mut rx) = q.split();
        let payload = [0x5Au8; 256];
        let mut header = BenchHeader::default();
        let mut out = [0u8; 256];
        b.iter(|| {
            tx.push(black_box(&BenchHeader::default()), black_box(&payload));
            black_box(rx.pop(&mut header, &mut out));
        });
    });

    group.finish();
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");

    // Batch operations
    for batch_size in [100u32, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(u64::from(*batch_size)));
        group.bench_function(format!("batch_{}", batch_size), |b| {
            let mut q: VarQueue<BenchHeader, { 1024 * 1024 }> = VarQueue::new();
            let (mut tx, mut rx) = q.split();
            let mut header = BenchHeader::default();
            let mut out = [0u8; 4];
            b.iter(|| {
                for i in 0..*batch_size {
                    let sent = BenchHeader {
                        id: i,
                        timestamp: 0,
                    };
                    tx.push(black_box(&sent), &i.to_ne_bytes());
                }
                for _ in 0..*batch_size {
                    black_box(rx.pop(&mut header, &mut out));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_throughput);
criterion_main!(benches);
