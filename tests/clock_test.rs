//! Cycle Clock Test - Drift & Concurrent Readers
//!
//! Usage:
//!   cargo test --release --test clock_test -- --nocapture

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tickwire::clock::{read_wall_ns, sync_time, ClockConfig, CycleClock, HAS_CYCLE_COUNTER};

/// Batas drift default 50μs; host yang sibuk bisa override lewat
/// `TICKWIRE_DRIFT_BOUND_NS`
fn drift_bound_ns() -> i64 {
    std::env::var("TICKWIRE_DRIFT_BOUND_NS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(50_000)
}

#[test]
fn test_drift_stays_bounded_with_calibration() {
    let clock = CycleClock::from_config(&ClockConfig {
        warmup: Duration::from_millis(100),
        calibrate_interval: Duration::from_millis(500),
    });

    let start = Instant::now();
    let mut max_abs_drift = 0i64;

    while start.elapsed() < Duration::from_secs(3) {
        thread::sleep(Duration::from_millis(50));
        clock.calibrate();

        let (cycles, sys_ns) = sync_time();
        let drift = clock.cycles_to_ns(cycles) - sys_ns;
        max_abs_drift = max_abs_drift.max(drift.abs());
    }

    println!(
        "📊 Max |drift| over 3s: {:.2} μs (hardware counter: {})",
        max_abs_drift as f64 / 1000.0,
        HAS_CYCLE_COUNTER
    );

    let bound = drift_bound_ns();
    assert!(
        max_abs_drift < bound,
        "drift {}ns exceeds bound {}ns",
        max_abs_drift,
        bound
    );
}

#[test]
fn test_readers_during_calibration() {
    let config = ClockConfig {
        warmup: Duration::from_millis(20),
        calibrate_interval: Duration::from_millis(2),
    };
    let clock = CycleClock::from_config(&config);
    let done = AtomicBool::new(false);
    let (clock, done) = (&clock, &done);

    thread::scope(|s| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(move || {
                    let mut reads = 0u64;
                    while !done.load(Ordering::Relaxed) {
                        let diff = clock.now_ns() - read_wall_ns();
                        assert!(diff.abs() < 50_000_000, "reader off by {}ns", diff);
                        reads += 1;
                    }
                    reads
                })
            })
            .collect();

        // Satu writer: calibrate terus selama 300ms
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(300) {
            clock.calibrate();
            thread::yield_now();
        }
        done.store(true, Ordering::Relaxed);

        let total: u64 = readers.into_iter().map(|r| r.join().unwrap()).sum();
        println!("📊 {} concurrent reads during recalibration", total);
    });
}

#[test]
fn test_now_ns_monotonic_across_recalibration() {
    if !HAS_CYCLE_COUNTER {
        return;
    }

    let clock = CycleClock::from_config(&ClockConfig {
        warmup: Duration::from_millis(20),
        calibrate_interval: Duration::from_millis(1),
    });

    let start = Instant::now();
    let mut last = clock.now_ns();
    while start.elapsed() < Duration::from_millis(200) {
        clock.calibrate();
        let now = clock.now_ns();
        assert!(now >= last, "clock went backwards by {}ns", last - now);
        last = now;
    }
}
