//! Process lifecycle and program-trap/TLB pass-up handling.
//!
//! Grounded on `examples/original_source/phase2/exceptions.c`:
//! `createProcess`, `terminateProcess`/`terminateProcessSubTree` (recursive
//! child-then-sibling teardown, orphaning live descendants is never
//! needed since the whole subtree is always torn down together),
//! `passUpToSupportLevel` (copy the saved state into the support struct's
//! exception-state slot, then `LDCXT` into its exception-context slot), and
//! `handleProgramTrap`/`handleTLBException` (pass up if the process has a
//! support struct, else kill it).

use crate::bios::ProcessorState;
use crate::process::state::ExceptionKind;
use crate::sched;
use crate::sync::{self, NucleusState, NucleusGuard};

/// Create a child of `parent_idx` with the given initial processor state
/// and (optionally) a support-struct index. Returns the new PCB's pid, or
/// `None` if the PCB pool is exhausted (`CREATEPROCESS` returns -1 to the
/// caller in that case, per spec §4.6).
pub fn create_process(
    guard: &mut NucleusState,
    parent_idx: usize,
    initial_state: ProcessorState,
    support_idx: Option<usize>,
) -> Option<u32> {
    let child_idx = guard.pcbs.alloc()?;
    {
        let child = guard.pcbs.get_mut(child_idx);
        child.state = initial_state;
        child.support = support_idx;
    }
    guard.pcbs.insert_child(parent_idx, child_idx);
    guard.pcbs.enqueue(&mut guard.ready_queue, child_idx);
    guard.process_count += 1;
    Some(guard.pcbs.get(child_idx).pid)
}

/// Terminate `idx` and its entire subtree: every descendant is recursively
/// torn down depth-first before `idx` itself, matching
/// `terminateProcessSubTree`'s recursion order.
pub fn terminate_subtree(guard: &mut NucleusState, idx: usize) {
    while guard.pcbs.has_children(idx) {
        let child = guard.pcbs.remove_child(idx).expect("has_children implies remove_child succeeds");
        terminate_subtree(guard, child);
    }
    reap(guard, idx);
}

/// Remove a single (already-childless) PCB from whichever queue holds it
/// and return it to the free pool.
fn reap(guard: &mut NucleusState, idx: usize) {
    if guard.pcbs.get(idx).sem_addr.is_some() {
        guard.asl.out_blocked(idx);
        guard.soft_blocked_count = guard.soft_blocked_count.saturating_sub(1);
    } else {
        guard.pcbs.out_of_queue(&mut guard.ready_queue, idx);
    }
    for cpu_slot in guard.current_process.iter_mut() {
        if *cpu_slot == Some(idx) {
            *cpu_slot = None;
        }
    }
    guard.pcbs.out_child(idx);
    guard.process_count -= 1;
    guard.pcbs.free(idx);
}

/// `TERMPROCESS` syscall body: pid 0 means "the caller"; otherwise the
/// named process (which must be a descendant of the caller, per spec
/// §4.6's scoping rule) and its subtree are torn down. Never returns —
/// always falls through to the scheduler.
pub fn terminate_process(cpu: usize, target_idx: usize) -> ! {
    let mut guard = sync::lock();
    terminate_subtree(&mut *guard, target_idx);
    drop(guard);
    let _ = cpu;
    sched::schedule()
}

/// Copy `state` into the support struct's saved-exception slot for `kind`
/// and resume execution at the corresponding pass-up context. Takes
/// ownership of the nucleus lock guard so it can be dropped before the
/// suspending `LDCXT` call. Never returns.
pub fn pass_up_to_support_level(
    mut guard: NucleusGuard,
    pcb_idx: usize,
    kind: ExceptionKind,
    state: ProcessorState,
) -> ! {
    let support_idx = guard.pcbs.get(pcb_idx).support.expect("pass_up requires a support struct");
    let support = guard.support.get_mut(support_idx);
    support.exception_state[kind as usize] = state;
    let ctx = support.exception_context[kind as usize];
    drop(guard);
    unsafe { crate::bios::ldcxt(ctx.stack_ptr, ctx.status, ctx.pc) }
}

/// `handleProgramTrap`: pass the fault up if the faulting process has a
/// support struct, otherwise kill it (as if it had called `TERMPROCESS(0)`
/// itself). Never returns.
pub fn handle_program_trap(cpu: usize, state: ProcessorState) -> ! {
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    let pcb_idx = guard.current_process[cpu].expect("program trap with no current process");
    if guard.pcbs.get(pcb_idx).support.is_some() {
        pass_up_to_support_level(guard, pcb_idx, ExceptionKind::General, state)
    } else {
        drop(guard);
        terminate_process(cpu, pcb_idx)
    }
}
