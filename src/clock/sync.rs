//! Sampling pasangan referensi (cycles, wall-clock ns)
//!
//! Ambil satu cycle reading, lalu N kali bergantian (wall clock, cycles).
//! Pasangan cycle berurutan dengan delta terkecil paling sedikit terganggu
//! antara dua pembacaan, jadi itu yang dipakai. Cycle referensi adalah titik
//! tengah pasangan tersebut.

use super::counter::{read_cycles, read_wall_ns};

// Windows: resolusi wall clock 100ns, butuh lebih banyak sample
#[cfg(windows)]
const SAMPLES: usize = 15;
#[cfg(not(windows))]
const SAMPLES: usize = 3;

/// Ambil satu pasangan referensi `(cycles, wall_ns)` dengan skew minimal
#[inline]
pub fn sync_time() -> (i64, i64) {
    let mut cycles = [0i64; SAMPLES + 1];
    let mut ns = [0i64; SAMPLES + 1];

    cycles[0] = read_cycles();
    for i in 1..=SAMPLES {
        ns[i] = read_wall_ns();
        cycles[i] = read_cycles();
    }

    pick_reference(&mut cycles, &mut ns, cfg!(windows))
}

/// Pilih pasangan dengan delta cycle terkecil.
///
/// `cycles[0]` adalah pembacaan awal; `ns[i]` diambil di antara
/// `cycles[i - 1]` dan `cycles[i]`. Dengan `collapse_ties`, wall clock yang
/// sama berturut-turut digabung, lalu sample pertama dan terakhir dibuang
/// karena mungkin tidak mencakup satu tick penuh.
#[allow(clippy::needless_range_loop)]
pub(crate) fn pick_reference(cycles: &mut [i64], ns: &mut [i64], collapse_ties: bool) -> (i64, i64) {
    debug_assert_eq!(cycles.len(), ns.len());
    let samples = cycles.len() - 1;

    let end = if collapse_ties {
        let mut j = 1;
        for i in 2..=samples {
            if ns[i] == ns[i - 1] {
                continue;
            }
            cycles[j - 1] = cycles[i - 1];
            ns[j] = ns[i];
            j += 1;
        }
        j - 1
    } else {
        samples + 1
    };

    let mut best = 1;
    for i in 2..end {
        if cycles[i] - cycles[i - 1] < cycles[best] - cycles[best - 1] {
            best = i;
        }
    }

    ((cycles[best] + cycles[best - 1]) >> 1, ns[best])
}
