//! Tickwire - SPSC Throughput & Latency Demo
//!
//! Satu producer dan satu consumer thread memindahkan `--messages` record
//! lewat `VarQueue`. Header membawa id + timestamp dari `CycleClock`,
//! payload adalah index 4-byte. Consumer memverifikasi urutan FIFO dan
//! mencatat latency end-to-end.
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use tracing::info;

use tickwire::clock::{ClockConfig, CycleClock};
use tickwire::core::{Consumer, VarQueue};

const QUEUE_CAPACITY: usize = 1024 * 1024;

/// Header yang menempel di setiap record
#[repr(C)]
#[derive(Clone, Copy, Default)]
struct TestHeader {
    id: u32,
    timestamp: u64,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "tickwire",
    about = "SPSC queue throughput and latency demo with TSC timestamps",
    version
)]
struct Args {
    /// Jumlah message yang dikirim.
    #[arg(long, short = 'n', default_value_t = 1_000_000)]
    messages: u32,

    /// Clock config file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Warmup kalibrasi awal, misal "20ms" (override config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    warmup: Option<Duration>,

    /// Interval rekalibrasi, misal "3s" (override config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// Latency Statistics
struct LatencyStats {
    samples: Vec<u64>,
    min_ns: u64,
    max_ns: u64,
    total_ns: u64,
}

impl LatencyStats {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            min_ns: u64::MAX,
            max_ns: 0,
            total_ns: 0,
        }
    }

    fn record(&mut self, latency_ns: u64) {
        self.samples.push(latency_ns);
        self.min_ns = self.min_ns.min(latency_ns);
        self.max_ns = self.max_ns.max(latency_ns);
        self.total_ns += latency_ns;
    }

    fn print_report(&mut self) {
        if self.samples.is_empty() {
            println!("  No samples collected");
            return;
        }

        self.samples.sort_unstable();
        let percentile = |p: f64| {
            let idx = ((self.samples.len() as f64 * p / 100.0) as usize).min(self.samples.len() - 1);
            self.samples[idx]
        };

        let avg_ns = self.total_ns / self.samples.len() as u64;

        println!("  Samples:    {}", self.samples.len());
        println!("  Min:        {:.2} μs ({} ns)", self.min_ns as f64 / 1000.0, self.min_ns);
        println!("  Max:        {:.2} μs ({} ns)", self.max_ns as f64 / 1000.0, self.max_ns);
        println!("  Avg:        {:.2} μs ({} ns)", avg_ns as f64 / 1000.0, avg_ns);
        println!("  P50:        {:.2} μs", percentile(50.0) as f64 / 1000.0);
        println!("  P99:        {:.2} μs", percentile(99.0) as f64 / 1000.0);
        println!("  P99.9:      {:.2} μs", percentile(99.9) as f64 / 1000.0);
    }
}

fn init_logging(level: &str) {
    let filter = format!("tickwire={}", level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

fn load_clock_config(args: &Args) -> Result<ClockConfig> {
    ClockConfig::load(args.config.as_deref(), args.warmup, args.interval)
        .context("invalid clock configuration")
}

/// Set flag saat consumer selesai, termasuk saat unwinding
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

/// Jalankan producer + consumer, return latency per message
fn run_pipeline(clock: &CycleClock, messages: u32) -> Result<LatencyStats> {
    let mut queue: VarQueue<TestHeader, QUEUE_CAPACITY> = VarQueue::new();
    let (mut producer, consumer) = queue.split();
    let stop = AtomicBool::new(false);
    let stop = &stop;

    thread::scope(|s| {
        s.spawn(move || {
            for i in 0..messages {
                let header = TestHeader {
                    id: i,
                    timestamp: clock.now_ns() as u64,
                };
                while !producer.push(&header, &i.to_ne_bytes()) {
                    if stop.load(Ordering::Relaxed) {
                        return;
                    }
                    thread::yield_now();
                }
                // Murah jika belum jadwalnya
                clock.calibrate();
            }
        });

        let consumer_thread = s.spawn(move || {
            // Error atau panic: producer jangan menunggu ruang yang tidak akan pernah kosong
            let _guard = StopOnDrop(stop);
            consume(consumer, clock, messages)
        });

        consumer_thread
            .join()
            .map_err(|_| anyhow!("consumer thread panicked"))?
    })
}

/// Pop semua message dan verifikasi urutan FIFO
fn consume(
    mut consumer: Consumer<'_, TestHeader, QUEUE_CAPACITY>,
    clock: &CycleClock,
    messages: u32,
) -> Result<LatencyStats> {
    let mut stats = LatencyStats::with_capacity(messages as usize);
    let mut header = TestHeader::default();
    let mut data = [0u8; 4];

    for i in 0..messages {
        let size = loop {
            match consumer.pop(&mut header, &mut data) {
                Some(size) => break size,
                None => thread::yield_now(),
            }
        };

        ensure!(size == 4, "message {} has payload size {}", i, size);
        ensure!(header.id == i, "expected id {}, got {}", i, header.id);
        let value = u32::from_ne_bytes(data);
        ensure!(value == i, "expected payload {}, got {}", i, value);

        let latency = clock.now_ns() - header.timestamp as i64;
        stats.record(latency.max(0) as u64);
    }

    Ok(stats)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_clock_config(&args)?;

    println!("🚀 Tickwire - SPSC Queue + Cycle Clock");
    println!("=======================================\n");

    info!(
        warmup = %humantime::format_duration(config.warmup),
        interval = %humantime::format_duration(config.calibrate_interval),
        "Calibrating cycle clock"
    );
    let clock = CycleClock::from_config(&config);
    println!("  Counter frequency: {:.3} GHz\n", clock.cycles_per_ns());

    println!("📊 Transfer test ({} messages, {} KB arena)", args.messages, QUEUE_CAPACITY / 1024);
    println!("---------------------------------------------");

    let start = Instant::now();
    let mut stats = run_pipeline(&clock, args.messages)?;
    let elapsed = start.elapsed();

    println!("  Duration:   {:.2} ms", elapsed.as_secs_f64() * 1000.0);
    println!(
        "  Throughput: {:.2} M msgs/sec\n",
        f64::from(args.messages) / elapsed.as_secs_f64() / 1_000_000.0
    );

    println!("Latency (push -> pop):");
    stats.print_report();

    println!("\n✅ All {} messages arrived in order", args.messages);
    Ok(())
}
