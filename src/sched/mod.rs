//! Per-CPU scheduler dispatch.
//!
//! Grounded on `examples/original_source/phase2/scheduler.c`: empty ready
//! queue + zero processes ⇒ HALT; empty ready queue + some process blocked
//! elsewhere ⇒ unmask interrupts and WAIT; otherwise pop the ready queue's
//! head and dispatch it with a fresh timeslice. The lock-acquire/mutate/
//! drop-before-suspend shape is adapted from the teacher's
//! `scheduler::yield_now`, which drops its `Mutex<Scheduler>` guard before
//! calling `context::switch_context` — the same rule applies here before
//! `bios::wait()` or `bios::ldst()`, both of which suspend this CPU.

use crate::bios;
use crate::memmap::{TIMESLICE, TPR};
use crate::sync::{self, NucleusState};

/// Select and dispatch the next process on this CPU. Never returns: either
/// a process is resumed via `LDST`, the CPU halts (no processes remain), or
/// it waits for the next interrupt (nothing ready, something blocked).
pub fn schedule() -> ! {
    let cpu = bios::get_prid();
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);

    let head = guard.pcbs.dequeue(&mut guard.ready_queue);
    match head {
        None => {
            if guard.process_count == 0 {
                crate::log_info!("cpu {}: no processes remain, halting", cpu);
                drop(guard);
                bios::halt();
            }
            if guard.soft_blocked_count > 0 {
                write_tpr(1);
                drop(guard);
                bios::wait();
                schedule()
            } else {
                crate::log_error!("cpu {}: ready queue empty, processes live, none blocked", cpu);
                panic!("scheduler deadlock: no runnable or blockable process");
            }
        }
        Some(idx) => {
            guard.current_process[cpu] = Some(idx);
            bios::set_timer(TIMESLICE);
            write_tpr(0);
            let state = guard.pcbs.get(idx).state;
            drop(guard);
            unsafe { bios::ldst(&state) }
        }
    }
}

fn write_tpr(value: u32) {
    unsafe {
        core::ptr::write_volatile(TPR as *mut u32, value);
    }
}

/// Re-enqueue `idx` at the tail of the ready queue. Used by interrupt and
/// syscall handlers after they finish mutating a PCB that is returning to
/// ready.
pub fn make_ready(guard: &mut NucleusState, idx: usize) {
    guard.pcbs.enqueue(&mut guard.ready_queue, idx);
}
