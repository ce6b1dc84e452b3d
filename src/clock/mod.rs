//! Clock module: Cycle-Counter Clock dengan rekalibrasi periodik
//!
//! Prinsip desain:
//! - No-Syscall: `now_ns` hanya membaca cycle counter + snapshot parameter
//! - Lock-Free: Parameter dijaga seqlock, reader tidak pernah blocking
//! - Fallback: Tanpa cycle counter, clock membaca wall clock langsung

mod config;
mod counter;
mod seqlock;
mod sync;
mod tsc_clock;

pub use config::{ClockConfig, ConfigError, MIN_CALIBRATE_INTERVAL_NS};
pub use counter::{read_cycles, read_wall_ns, HAS_CYCLE_COUNTER};
pub use seqlock::Calibration;
pub use sync::sync_time;
pub use tsc_clock::CycleClock;

/// Nanoseconds per detik
pub const NS_PER_SEC: i64 = 1_000_000_000;
