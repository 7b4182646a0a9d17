//! The single global nucleus lock.
//!
//! Per spec §5, one shared lock guards the PCB pool, the ready queue, the
//! ASL, the device semaphore table, and per-CPU bookkeeping; every mutation
//! serializes through it. Matches the teacher's `SCHEDULER: Mutex<Scheduler>`
//! `lazy_static!` singleton in shape; the critical idiom this crate inherits
//! from the teacher's `scheduler::yield_now` is dropping the guard
//! *before* any call that can suspend the caller (dispatch, a blocking
//! syscall, a context switch) — see `sched::schedule` and
//! `trap::syscall::passeren` for the `drop(guard)`-then-suspend pattern.

use lazy_static::lazy_static;
use spin::{Mutex, MutexGuard};

use crate::bios;
use crate::list::IndexQueue;
use crate::memmap::{NCPU, SEMDEVLEN};
use crate::process::{PcbPool, SupportPool};
use crate::sync::asl::Asl;

pub struct NucleusState {
    pub pcbs: PcbPool,
    pub support: SupportPool,
    pub asl: Asl,
    pub ready_queue: IndexQueue,
    /// Index into `pcbs`, or `None`, for each CPU.
    pub current_process: [Option<usize>; NCPU],
    /// Device/pseudo-clock semaphore counters, per spec §4.7 / §6.
    pub device_semaphores: [i32; SEMDEVLEN],
    pub process_count: u32,
    /// PCBs currently blocked on something other than a device or the
    /// pseudo-clock (i.e. blocked inside the ASL on a "soft" semaphore).
    pub soft_blocked_count: u32,
    /// Per-CPU snapshot of the time-of-day clock at last dispatch, used to
    /// account elapsed CPU time (§10.6 supplemented `GETTIME` precision).
    pub last_tod: [u32; NCPU],
}

impl NucleusState {
    const fn new() -> Self {
        NucleusState {
            pcbs: PcbPool::new(),
            support: SupportPool::new(),
            asl: Asl::new(),
            ready_queue: IndexQueue::empty(),
            current_process: [None; NCPU],
            device_semaphores: [0; SEMDEVLEN],
            process_count: 0,
            soft_blocked_count: 0,
            last_tod: [0; NCPU],
        }
    }

    pub fn init(&mut self) {
        self.pcbs.init();
        self.asl.init();
        self.ready_queue = IndexQueue::empty();
        self.current_process = [None; NCPU];
        self.device_semaphores = [0; SEMDEVLEN];
        self.process_count = 0;
        self.soft_blocked_count = 0;
        self.last_tod = [0; NCPU];
    }
}

lazy_static! {
    static ref NUCLEUS: Mutex<NucleusState> = Mutex::new(NucleusState::new());
}

/// Owned handle on the global nucleus lock. Pass this by value (not by
/// reference) into any helper that may need to drop the lock itself before
/// a suspending BIOS call, per spec §5.
pub type NucleusGuard = MutexGuard<'static, NucleusState>;

pub fn lock() -> NucleusGuard {
    NUCLEUS.lock()
}

/// Credit elapsed CPU time (since this CPU's last accounting point) to
/// whichever process is currently running on it, then move the baseline
/// forward to now. Called at the top of every trap handler and at
/// dispatch, matching the original's practice of snapshotting `STCK()` at
/// every accounting boundary rather than only at context switch (§10.6
/// supplemented `GETTIME` precision).
pub fn charge_cpu_time(guard: &mut NucleusState, cpu: usize) {
    let now = bios::stck();
    if let Some(idx) = guard.current_process[cpu] {
        let elapsed = now.wrapping_sub(guard.last_tod[cpu]) as u64;
        guard.pcbs.get_mut(idx).cpu_time += elapsed;
    }
    guard.last_tod[cpu] = now;
}
