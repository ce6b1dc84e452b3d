//! Clock Drift Monitor
//!
//! Bandingkan `CycleClock::now_ns` dengan wall clock sistem secara
//! periodik, sambil memanggil `calibrate` di setiap tick.
//!
//! Usage:
//!   cargo run --release --bin clock_drift -- [OPTIONS]

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use tickwire::clock::{sync_time, ClockConfig, CycleClock, HAS_CYCLE_COUNTER};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "clock_drift",
    about = "Measure cycle clock drift against the system clock",
    version
)]
struct Args {
    /// Lama monitoring, misal "30s".
    #[arg(long, short = 'd', default_value = "10s", value_parser = humantime::parse_duration)]
    duration: Duration,

    /// Jarak antar sample, misal "250ms".
    #[arg(long, short = 't', default_value = "250ms", value_parser = humantime::parse_duration)]
    tick: Duration,

    /// Clock config file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Warmup kalibrasi awal (override config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    warmup: Option<Duration>,

    /// Interval rekalibrasi (override config file).
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "debug")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = format!("tickwire={},clock_drift={}", level, level);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .init();
}

fn load_clock_config(args: &Args) -> Result<ClockConfig> {
    ClockConfig::load(args.config.as_deref(), args.warmup, args.interval)
        .context("invalid clock configuration")
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_clock_config(&args)?;

    println!("⏱️  Clock Drift Monitor");
    println!("======================\n");
    println!("  Duration:   {}", humantime::format_duration(args.duration));
    println!("  Tick:       {}", humantime::format_duration(args.tick));
    println!("  Warmup:     {}", humantime::format_duration(config.warmup));
    println!("  Interval:   {}\n", humantime::format_duration(config.calibrate_interval));

    if !HAS_CYCLE_COUNTER {
        warn!("No hardware cycle counter, clock reads the system clock directly");
    }

    let clock = CycleClock::from_config(&config);
    info!(ghz = clock.cycles_per_ns(), "Clock ready");

    let start = Instant::now();
    let mut max_abs_drift = 0i64;
    let mut total_abs_drift = 0i64;
    let mut samples = 0i64;

    while start.elapsed() < args.duration {
        thread::sleep(args.tick);
        clock.calibrate();

        let (cycles, sys_ns) = sync_time();
        let drift = clock.cycles_to_ns(cycles) - sys_ns;

        max_abs_drift = max_abs_drift.max(drift.abs());
        total_abs_drift += drift.abs();
        samples += 1;

        println!(
            "  t={:>7.2}s  drift={:>8} ns  ghz={:.6}",
            start.elapsed().as_secs_f64(),
            drift,
            clock.cycles_per_ns()
        );
    }

    println!("\n📊 Drift Summary");
    println!("   Samples:      {}", samples);
    if samples > 0 {
        println!("   Avg |drift|:  {:.2} μs", total_abs_drift as f64 / samples as f64 / 1000.0);
    }
    println!("   Max |drift|:  {:.2} μs", max_abs_drift as f64 / 1000.0);

    Ok(())
}
