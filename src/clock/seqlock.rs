//! Seqlock untuk parameter kalibrasi
//!
//! Writer: seq jadi ganjil, tulis field, seq jadi genap.
//! Reader: baca seq, baca field, baca seq lagi; ulangi jika beda atau ganjil.
//!
//! Field disimpan sebagai atomic (relaxed) supaya pembacaan yang bertabrakan
//! dengan writer tidak menjadi data race, hanya snapshot yang dibuang.

use std::hint;
use std::sync::atomic::{fence, AtomicI64, AtomicU32, AtomicU64, Ordering};

/// Model linear `ns = base_ns + (cycles - base_cycles) * ns_per_cycle`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Cycle count titik referensi
    pub base_cycles: i64,
    /// Nanoseconds (epoch) pada titik referensi
    pub base_ns: i64,
    /// Slope: nanoseconds per cycle
    pub ns_per_cycle: f64,
}

impl Calibration {
    /// Konversi cycle count ke nanoseconds dengan model ini.
    ///
    /// Input ekstrem (mis. `i64::MIN`) saturate ke batas `i64`, tidak overflow.
    #[inline(always)]
    pub fn cycles_to_ns(&self, cycles: i64) -> i64 {
        let delta = cycles.saturating_sub(self.base_cycles);
        self.base_ns
            .saturating_add((delta as f64 * self.ns_per_cycle) as i64)
    }
}

/// Parameter set yang dijaga generation counter
#[repr(C, align(64))]
pub(crate) struct ParamLock {
    seq: AtomicU32,
    base_cycles: AtomicI64,
    base_ns: AtomicI64,
    // f64 bits
    ns_per_cycle: AtomicU64,
}

impl ParamLock {
    pub(crate) const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            base_cycles: AtomicI64::new(0),
            base_ns: AtomicI64::new(0),
            ns_per_cycle: AtomicU64::new(0),
        }
    }

    /// Snapshot konsisten. Lock-free, retry selama writer aktif.
    #[inline(always)]
    pub(crate) fn read(&self) -> Calibration {
        loop {
            let before = self.seq.load(Ordering::Acquire);

            if before & 1 == 0 {
                let snapshot = Calibration {
                    base_cycles: self.base_cycles.load(Ordering::Relaxed),
                    base_ns: self.base_ns.load(Ordering::Relaxed),
                    ns_per_cycle: f64::from_bits(self.ns_per_cycle.load(Ordering::Relaxed)),
                };

                // Field load di atas tidak boleh turun melewati seq load kedua
                fence(Ordering::Acquire);
                let after = self.seq.load(Ordering::Relaxed);

                if before == after {
                    return snapshot;
                }
            }

            hint::spin_loop();
        }
    }

    /// Publish parameter baru. Writer/writer tidak di-serialize di sini.
    #[inline]
    pub(crate) fn write(&self, calibration: Calibration) {
        self.write_with(calibration, || {});
    }

    /// `between` dipanggil saat seq ganjil, di tengah update field
    fn write_with(&self, calibration: Calibration, between: impl FnOnce()) {
        let seq = self.seq.load(Ordering::Relaxed);
        self.seq.store(seq.wrapping_add(1), Ordering::Relaxed);
        // Seq ganjil visible sebelum field manapun berubah
        fence(Ordering::Release);

        self.base_cycles
            .store(calibration.base_cycles, Ordering::Relaxed);
        between();
        self.base_ns.store(calibration.base_ns, Ordering::Relaxed);
        self.ns_per_cycle
            .store(calibration.ns_per_cycle.to_bits(), Ordering::Relaxed);

        self.seq.store(seq.wrapping_add(2), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn generation(&self) -> u32 {
        self.seq.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    const MODEL_A: Calibration = Calibration {
        base_cycles: 0,
        base_ns: 0,
        ns_per_cycle: 1.0,
    };

    const MODEL_B: Calibration = Calibration {
        base_cycles: 1_000,
        base_ns: 5_000,
        ns_per_cycle: 2.0,
    };

    #[test]
    fn test_linear_mapping() {
        assert_eq!(MODEL_A.cycles_to_ns(10_000), 10_000);
        assert_eq!(MODEL_B.cycles_to_ns(10_000), 23_000);
        assert_eq!(MODEL_B.cycles_to_ns(1_000), 5_000);
        assert_eq!(MODEL_B.cycles_to_ns(0), 3_000);
    }

    #[test]
    fn test_extreme_cycles_saturate() {
        assert_eq!(MODEL_B.cycles_to_ns(i64::MAX), i64::MAX);
        assert_eq!(MODEL_B.cycles_to_ns(i64::MIN), i64::MIN + 5_000);
        assert_eq!(MODEL_A.cycles_to_ns(i64::MIN), i64::MIN);
    }

    #[test]
    fn test_write_then_read() {
        let lock = ParamLock::new();
        assert_eq!(lock.read().ns_per_cycle, 0.0);

        lock.write(MODEL_B);
        assert_eq!(lock.read(), MODEL_B);
        assert_eq!(lock.generation(), 2);

        lock.write(MODEL_A);
        assert_eq!(lock.read(), MODEL_A);
        assert_eq!(lock.generation(), 4);
    }

    #[test]
    fn test_generation_odd_during_write() {
        let lock = ParamLock::new();
        lock.write_with(MODEL_A, || {
            assert_eq!(lock.generation() & 1, 1);
        });
        assert_eq!(lock.generation() & 1, 0);
    }

    #[test]
    fn test_no_torn_reads_with_slow_writer() {
        const PROBE: i64 = 10_000;
        let lock = ParamLock::new();
        lock.write(MODEL_A);

        let valid = [MODEL_A.cycles_to_ns(PROBE), MODEL_B.cycles_to_ns(PROBE)];
        let done = AtomicBool::new(false);
        let (lock, valid, done) = (&lock, &valid, &done);

        thread::scope(|s| {
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(move || {
                        while !done.load(Ordering::Relaxed) {
                            let ns = lock.read().cycles_to_ns(PROBE);
                            assert!(valid.contains(&ns), "torn snapshot produced {ns}");
                        }
                    })
                })
                .collect();

            for round in 0..40 {
                let next = if round % 2 == 0 { MODEL_B } else { MODEL_A };
                // Jeda di tengah update memperlebar jendela torn read
                lock.write_with(next, || thread::sleep(Duration::from_micros(500)));
                thread::sleep(Duration::from_micros(100));
            }
            done.store(true, Ordering::Relaxed);

            for reader in readers {
                reader.join().unwrap();
            }
        });
    }
}
