//! Trap entry and CAUSE-based dispatch.
//!
//! Grounded on `examples/original_source/phase2/exceptions.c`'s
//! `exceptionHandler`: interrupts dispatch to `interrupt::handle`; syscall
//! and breakpoint exception codes dispatch to `syscall::handle`; TLB
//! exception codes dispatch to `handle_tlb_exception`; anything else is a
//! program trap. Every path here runs with the faulting CPU's current
//! process still installed in `NucleusState::current_process`; whichever
//! branch finishes always ends by calling [`crate::sched::schedule`] or
//! resuming a process directly via `LDST`, so this function never returns.

pub mod exception;
pub mod interrupt;
pub mod syscall;
pub mod tlb_refill;

use crate::bios::{self, ProcessorState};
use crate::memmap::{
    CAUSE_EXCCODE_MASK, CAUSE_EXCCODE_SHIFT, EXC_BREAKPOINT, EXC_SYSCALL, EXC_TLB_INVALID_LOAD,
    EXC_TLB_INVALID_STORE,
};

/// Top bit of `CAUSE` flags it as an interrupt rather than an exception,
/// matching the simulator's convention.
const CAUSE_INTERRUPT_BIT: u32 = 1 << 31;

/// Entry point called from the BIOS-installed exception vector for this
/// CPU with its just-saved processor state. Never returns.
pub fn handle_exception(cpu: usize, state: ProcessorState) -> ! {
    if state.cause & CAUSE_INTERRUPT_BIT != 0 {
        interrupt::handle(cpu, state);
    }

    let exc_code = (state.cause >> CAUSE_EXCCODE_SHIFT) & CAUSE_EXCCODE_MASK;
    match exc_code {
        EXC_SYSCALL | EXC_BREAKPOINT => syscall::handle(cpu, state),
        EXC_TLB_INVALID_LOAD | EXC_TLB_INVALID_STORE => {
            tlb_refill::handle_tlb_exception(cpu, state)
        }
        _ => exception::handle_program_trap(cpu, state),
    }
}

/// Resume `state` directly, without going back through the scheduler. Used
/// by fast paths (non-blocking syscall return, interrupt return-to-same-
/// process) that don't need a fresh dispatch decision.
pub fn resume(state: &ProcessorState) -> ! {
    unsafe { bios::ldst(state) }
}
