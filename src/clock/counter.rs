//! Sumber waktu mentah: cycle counter hardware dan wall clock
//!
//! - x86 / x86_64: `rdtsc`
//! - aarch64: virtual counter `cntvct_el0`
//! - Lainnya: fallback ke wall clock (tidak ada keuntungan performa)

use super::NS_PER_SEC;

/// `true` jika platform punya free-running cycle counter yang murah.
///
/// Jika `false`, [`read_cycles`] hanya membaca wall clock dan kalibrasi
/// tidak dijalankan.
pub const HAS_CYCLE_COUNTER: bool = cfg!(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "aarch64"
));

/// Baca cycle counter hardware (monotonic, tanpa syscall)
#[inline(always)]
#[allow(unused_unsafe)]
pub fn read_cycles() -> i64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: rdtsc tersedia di semua CPU x86_64
        unsafe { std::arch::x86_64::_rdtsc() as i64 }
    }

    #[cfg(target_arch = "x86")]
    {
        // SAFETY: rdtsc tersedia di semua CPU x86 yang didukung Rust
        unsafe { std::arch::x86::_rdtsc() as i64 }
    }

    #[cfg(target_arch = "aarch64")]
    {
        let ticks: u64;
        // SAFETY: cntvct_el0 bisa dibaca dari EL0 di Linux/macOS
        unsafe {
            std::arch::asm!(
                "mrs {}, cntvct_el0",
                out(reg) ticks,
                options(nomem, nostack, preserves_flags)
            );
        }
        ticks as i64
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
    {
        read_wall_ns()
    }
}

/// Wall clock dalam nanoseconds sejak epoch (`CLOCK_REALTIME`)
#[cfg(unix)]
#[inline(always)]
#[allow(clippy::unnecessary_cast)]
pub fn read_wall_ns() -> i64 {
    // SAFETY: timespec adalah POD, semua-nol valid
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: pointer ke timespec lokal yang valid
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_REALTIME, &mut ts) };
    debug_assert_eq!(rc, 0, "clock_gettime(CLOCK_REALTIME) failed");
    ts.tv_sec as i64 * NS_PER_SEC + ts.tv_nsec as i64
}

/// Wall clock dalam nanoseconds sejak epoch
#[cfg(not(unix))]
#[inline(always)]
pub fn read_wall_ns() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64 * NS_PER_SEC + i64::from(d.subsec_nanos()))
        .unwrap_or(0)
}
