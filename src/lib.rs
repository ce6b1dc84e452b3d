//! Tickwire - Low-Latency SPSC Transport + Cycle Clock
//!
//! Dua komponen independen yang biasanya dipakai bersama:
//! - [`core`](crate::core): Lock-free SPSC queue untuk message dengan ukuran variabel
//! - [`clock`](crate::clock): Clock berbasis cycle counter, konversi ke nanoseconds tanpa syscall

pub mod clock;
pub mod core;

pub use crate::clock::{ClockConfig, CycleClock};
pub use crate::core::{Consumer, Producer, VarQueue};
