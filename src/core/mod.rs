//! Core module: Lock-Free SPSC Variable-Length Queue
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic load/store pada dua cursor, tidak ada Mutex
//! - No-Allocation: Arena dialokasikan sekali saat init
//! - Two Threads: Tepat satu producer dan satu consumer

mod var_queue;

pub use var_queue::{Consumer, Producer, VarQueue};
