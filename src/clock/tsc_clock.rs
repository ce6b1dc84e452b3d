//! Cycle Clock: cycle counter -> wall-clock nanoseconds tanpa syscall
//!
//! Model linear `ns = base_ns + (cycles - base_cycles) * ns_per_cycle`
//! dijaga seqlock: reader tidak pernah lock, writer (`calibrate`) hanya
//! jalan sekali per interval.
//!
//! Rekalibrasi bersifat prediktif: error yang diamati diproyeksikan ke
//! titik kalibrasi berikutnya, lalu slope dikoreksi supaya proyeksi itu
//! mendekati nol.

use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;

use tracing::{debug, info, warn};

use super::config::ClockConfig;
use super::counter::{read_cycles, read_wall_ns, HAS_CYCLE_COUNTER};
use super::seqlock::{Calibration, ParamLock};
use super::sync::sync_time;

/// Margin (ns) supaya kalibrasi terjadwal sedikit sebelum interval habis
const SCHEDULE_MARGIN_NS: i64 = 1_000;

/// TSC-based clock, aman dibaca dari banyak thread sekaligus
///
/// Bisa disimpan di `static`:
///
/// ```
/// use tickwire::clock::CycleClock;
///
/// static CLOCK: CycleClock = CycleClock::new();
///
/// CLOCK.init(1_000_000, 3_000_000_000);
/// let ts = CLOCK.now_ns();
/// assert!(ts > 0);
/// ```
///
/// `calibrate` boleh dipanggil dari thread manapun, tapi pemanggilan
/// bersamaan dari beberapa thread harus di-serialize oleh caller.
pub struct CycleClock {
    params: ParamLock,
    // Field sisi writer
    calibrate_interval_ns: AtomicI64,
    base_ns_err: AtomicI64,
    next_calibrate_cycles: AtomicI64,
}

impl Default for CycleClock {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleClock {
    /// Clock yang belum diinisialisasi.
    ///
    /// Sebelum [`init`](Self::init), `cycles_to_ns` selalu 0 dan
    /// `calibrate` tidak melakukan apa-apa.
    pub const fn new() -> Self {
        Self {
            params: ParamLock::new(),
            calibrate_interval_ns: AtomicI64::new(0),
            base_ns_err: AtomicI64::new(0),
            next_calibrate_cycles: AtomicI64::new(i64::MAX),
        }
    }

    /// Buat clock dan langsung init dengan `config`
    pub fn from_config(config: &ClockConfig) -> Self {
        let clock = Self::new();
        clock.init_with(config);
        clock
    }

    /// Init dengan nilai dari [`ClockConfig`]
    pub fn init_with(&self, config: &ClockConfig) {
        self.init(config.warmup_ns(), config.calibrate_interval_ns());
    }

    /// Hitung slope awal.
    ///
    /// Ambil pasangan referensi, busy-wait (yield) minimal `warmup_ns`,
    /// ambil pasangan kedua, slope = delta ns / delta cycles. Blocking
    /// selama warmup.
    pub fn init(&self, warmup_ns: i64, calibrate_interval_ns: i64) {
        self.calibrate_interval_ns
            .store(calibrate_interval_ns, Ordering::Relaxed);

        let (base_cycles, base_ns) = sync_time();
        let expire_ns = base_ns.saturating_add(warmup_ns);

        // Polling dengan yield; kedua delta harus positif supaya slope valid
        let (delayed_cycles, delayed_ns) = loop {
            while read_wall_ns() < expire_ns {
                thread::yield_now();
            }
            let (cycles, ns) = sync_time();
            if cycles > base_cycles && ns > base_ns {
                break (cycles, ns);
            }
            thread::yield_now();
        };

        let ns_per_cycle = (delayed_ns - base_ns) as f64 / (delayed_cycles - base_cycles) as f64;
        self.save_params(base_cycles, base_ns, base_ns, ns_per_cycle);

        info!(
            ns_per_cycle,
            ghz = 1.0 / ns_per_cycle,
            warmup_ns,
            calibrate_interval_ns,
            hardware_counter = HAS_CYCLE_COUNTER,
            "Cycle clock initialized"
        );
    }

    /// Rekalibrasi jika jadwal sudah lewat.
    ///
    /// Murah jika belum waktunya (satu counter read + satu compare), jadi
    /// aman dipanggil setiap iterasi loop.
    #[inline(always)]
    pub fn calibrate(&self) {
        if !HAS_CYCLE_COUNTER {
            return;
        }
        if read_cycles() < self.next_calibrate_cycles.load(Ordering::Relaxed) {
            return;
        }
        self.recalibrate();
    }

    #[cold]
    fn recalibrate(&self) {
        let (cycles, ns) = sync_time();
        let current = self.params.read();
        let calculated_ns = current.cycles_to_ns(cycles);
        let ns_err = calculated_ns - ns;

        let interval_ns = self.calibrate_interval_ns.load(Ordering::Relaxed);
        let base_ns_err = self.base_ns_err.load(Ordering::Relaxed);
        // Waktu sistem yang berlalu sejak kalibrasi sebelumnya
        let elapsed_ns = ns - current.base_ns + base_ns_err;

        if elapsed_ns <= 0 {
            warn!(elapsed_ns, "Wall clock did not advance since last calibration, keeping slope");
            self.save_params(cycles, calculated_ns, ns, current.ns_per_cycle);
            return;
        }

        // Proyeksi error pada kalibrasi berikutnya jika slope tidak diubah
        let drift = i128::from(ns_err - base_ns_err) * i128::from(interval_ns) / i128::from(elapsed_ns);
        let drift = drift.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64;
        let expected_err = ns_err.saturating_add(drift);

        let mut ns_per_cycle =
            current.ns_per_cycle * (1.0 - expected_err as f64 / interval_ns as f64);

        if !(ns_per_cycle.is_finite() && ns_per_cycle > 0.0) {
            warn!(ns_err, expected_err, "Rejected slope correction");
            ns_per_cycle = current.ns_per_cycle;
        }

        self.save_params(cycles, calculated_ns, ns, ns_per_cycle);

        debug!(
            ns_err,
            expected_err,
            ns_per_cycle,
            "Cycle clock recalibrated"
        );
    }

    fn save_params(&self, base_cycles: i64, base_ns: i64, sys_ns: i64, ns_per_cycle: f64) {
        self.base_ns_err.store(base_ns - sys_ns, Ordering::Relaxed);

        let interval_ns = self.calibrate_interval_ns.load(Ordering::Relaxed);
        let next = base_cycles + ((interval_ns - SCHEDULE_MARGIN_NS) as f64 / ns_per_cycle) as i64;
        self.next_calibrate_cycles.store(next, Ordering::Relaxed);

        self.params.write(Calibration {
            base_cycles,
            base_ns,
            ns_per_cycle,
        });
    }

    /// Konversi cycle count ke nanoseconds epoch. Lock-free.
    #[inline(always)]
    pub fn cycles_to_ns(&self, cycles: i64) -> i64 {
        self.params.read().cycles_to_ns(cycles)
    }

    /// Waktu sekarang dalam nanoseconds epoch
    #[inline(always)]
    pub fn now_ns(&self) -> i64 {
        if !HAS_CYCLE_COUNTER {
            return read_wall_ns();
        }
        self.cycles_to_ns(read_cycles())
    }

    /// Frekuensi counter dalam GHz (cycles per nanosecond)
    pub fn cycles_per_ns(&self) -> f64 {
        1.0 / self.params.read().ns_per_cycle
    }

    /// Snapshot parameter kalibrasi saat ini
    pub fn snapshot(&self) -> Calibration {
        self.params.read()
    }

    /// Cek apakah `init` sudah pernah dipanggil
    pub fn is_initialized(&self) -> bool {
        self.params.read().ns_per_cycle > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WARMUP_NS: i64 = 10_000_000;

    #[test]
    fn test_uninitialized_clock() {
        let clock = CycleClock::new();
        assert!(!clock.is_initialized());
        assert_eq!(clock.cycles_to_ns(123_456), 0);

        clock.calibrate();
        assert_eq!(clock.snapshot().ns_per_cycle, 0.0);
    }

    #[test]
    fn test_init_tracks_wall_clock() {
        let clock = CycleClock::new();
        clock.init(WARMUP_NS, 3_000_000_000);

        assert!(clock.is_initialized());
        assert!(clock.cycles_per_ns() > 0.0);

        let diff = clock.now_ns() - read_wall_ns();
        assert!(diff.abs() < 1_000_000, "clock off by {diff}ns");
    }

    #[test]
    fn test_now_ns_non_decreasing() {
        let clock = CycleClock::from_config(&ClockConfig {
            warmup: Duration::from_millis(10),
            ..ClockConfig::default()
        });

        if !HAS_CYCLE_COUNTER {
            return;
        }

        let mut last = clock.now_ns();
        for _ in 0..100_000 {
            let now = clock.now_ns();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_calibrate_skips_before_schedule() {
        let clock = CycleClock::new();
        clock.init(WARMUP_NS, 3_000_000_000);

        let before = clock.snapshot();
        for _ in 0..1_000 {
            clock.calibrate();
        }
        assert_eq!(clock.snapshot(), before);
    }

    #[test]
    fn test_calibrate_after_interval() {
        if !HAS_CYCLE_COUNTER {
            return;
        }

        let clock = CycleClock::new();
        clock.init(WARMUP_NS, 2_000_000);
        let before = clock.snapshot();

        thread::sleep(Duration::from_millis(5));
        clock.calibrate();

        let after = clock.snapshot();
        assert!(after.base_cycles > before.base_cycles);
        assert!(after.ns_per_cycle > 0.0);

        let diff = clock.now_ns() - read_wall_ns();
        assert!(diff.abs() < 1_000_000, "clock off by {diff}ns");
    }

    #[test]
    fn test_static_clock() {
        static CLOCK: CycleClock = CycleClock::new();
        CLOCK.init(WARMUP_NS, 3_000_000_000);
        assert!(CLOCK.now_ns() > 0);
    }
}
