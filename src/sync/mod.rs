//! Synchronization primitives: the ASL and the global nucleus lock.

pub mod asl;
pub mod nucleus_lock;

pub use nucleus_lock::{charge_cpu_time, lock, NucleusGuard, NucleusState};
