//! The ten nucleus (kernel-level) syscalls.
//!
//! Grounded on `examples/original_source/phase2/exceptions.c`'s
//! `SYSCALL_handler`: syscall number in `a0`, arguments in `a1`..`a3`,
//! dispatch via the negative syscall codes in `memmap`. `PASSEREN`/
//! `VERHOGEN`/`DOIO` follow the original's exact blocking protocol: the
//! caller's state (with `pc_epc` already advanced past the `ECALL`) is
//! saved into its PCB *before* the process is removed from
//! `current_process` and the nucleus lock is dropped, so a blocked process
//! always has a resumable state sitting in its PCB.
//!
//! Two syscalls interpret their pointer-shaped arguments differently from
//! the original C, since this kernel tracks PCBs and support structs in
//! fixed index pools rather than addressing them by raw pointer (an Open
//! Question decision recorded in `DESIGN.md`):
//! - `CREATEPROCESS`'s support-struct argument (`a2`) is a support-pool
//!   index, or `u32::MAX` for "no support struct", rather than a pointer.
//! - `GETSUPPORTPTR` returns a support-pool index in `a0`, rather than a
//!   pointer.

use crate::bios::{ProcessorState, REG_A0, REG_A1, REG_A2, REG_A3};
use crate::memmap::{
    SYS_CLOCKWAIT, SYS_CREATEPROCESS, SYS_DOIO, SYS_GETPROCESSID, SYS_GETSUPPORTPTR, SYS_GETTIME,
    SYS_PASSEREN, SYS_TERMPROCESS, SYS_VERHOGEN, SYS_YIELD, PSEUDOCLOCK_INDEX,
};
use crate::sched;
use crate::sync::{self, NucleusGuard};
use crate::trap::exception;

const NO_SUPPORT: u32 = u32::MAX;

/// Dispatch a kernel syscall (or breakpoint) exception. Never returns.
pub fn handle(cpu: usize, mut state: ProcessorState) -> ! {
    state.pc_epc = state.pc_epc.wrapping_add(4);
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    let pcb_idx = guard.current_process[cpu].expect("syscall with no current process");

    if !caller_is_kernel_mode(&state) {
        drop(guard);
        crate::trap::exception::handle_program_trap(cpu, state);
    }

    let sys_num = state.reg[REG_A0] as i32;
    match sys_num {
        SYS_CREATEPROCESS => sys_create_process(cpu, guard, pcb_idx, &mut state),
        SYS_TERMPROCESS => sys_term_process(cpu, guard, pcb_idx, &state),
        SYS_PASSEREN => sys_passeren(cpu, guard, pcb_idx, state),
        SYS_VERHOGEN => sys_verhogen(cpu, guard, pcb_idx, state),
        SYS_DOIO => sys_do_io(cpu, guard, pcb_idx, state),
        SYS_GETTIME => sys_get_time(guard, pcb_idx, state),
        SYS_CLOCKWAIT => sys_clock_wait(cpu, guard, pcb_idx, state),
        SYS_GETSUPPORTPTR => sys_get_support_ptr(guard, pcb_idx, state),
        SYS_GETPROCESSID => sys_get_process_id(guard, pcb_idx, &state),
        SYS_YIELD => sys_yield(cpu, guard, pcb_idx, state),
        _ => {
            drop(guard);
            exception::handle_program_trap(cpu, state);
        }
    }
}

fn caller_is_kernel_mode(state: &ProcessorState) -> bool {
    use crate::bios::Status;
    let bits = Status::from_bits_truncate(state.status);
    bits.contains(Status::MPP_M)
}

fn sys_create_process(
    cpu: usize,
    mut guard: NucleusGuard,
    pcb_idx: usize,
    state: &mut ProcessorState,
) -> ! {
    let init_state = unsafe { *(state.reg[REG_A1] as usize as *const ProcessorState) };
    let support_raw = state.reg[REG_A2];
    let support_idx = if support_raw == NO_SUPPORT { None } else { Some(support_raw as usize) };
    match exception::create_process(&mut guard, pcb_idx, init_state, support_idx) {
        Some(pid) => state.reg[REG_A0] = pid,
        None => state.reg[REG_A0] = (-1i32) as u32,
    }
    guard.pcbs.get_mut(pcb_idx).state = *state;
    drop(guard);
    crate::trap::resume(state)
}

fn sys_term_process(cpu: usize, guard: NucleusGuard, pcb_idx: usize, state: &ProcessorState) -> ! {
    let target_pid = state.reg[REG_A1];
    let target_idx = if target_pid == 0 {
        pcb_idx
    } else {
        match guard.pcbs.pid_to_index(target_pid) {
            Some(idx) => idx,
            None => {
                drop(guard);
                exception::handle_program_trap(cpu, *state);
            }
        }
    };
    drop(guard);
    exception::terminate_process(cpu, target_idx)
}

/// `passeren`: binary semaphore, not a counting one. `*sem == 0` means held
/// (block the caller); any other value means free, in which case either a
/// waiter is promoted to ready or, if none, `*sem` is set to 0 to mark it
/// held. Mirrors [`sys_verhogen`] with the held/free values swapped.
fn sys_passeren(cpu: usize, mut guard: NucleusGuard, pcb_idx: usize, state: ProcessorState) -> ! {
    let sem_key = state.reg[REG_A1];
    let sem_ptr = sem_key as usize as *mut i32;
    let current = unsafe { *sem_ptr };
    if current == 0 {
        guard.pcbs.get_mut(pcb_idx).state = state;
        guard.pcbs.get_mut(pcb_idx).sem_addr = Some(sem_key as usize);
        guard.asl.insert_blocked(sem_key, pcb_idx);
        guard.soft_blocked_count += 1;
        guard.current_process[cpu] = None;
        drop(guard);
        sched::schedule()
    } else {
        if let Some(woken) = guard.asl.remove_blocked(sem_key) {
            guard.pcbs.get_mut(woken).sem_addr = None;
            guard.soft_blocked_count = guard.soft_blocked_count.saturating_sub(1);
            sched::make_ready(&mut guard, woken);
        } else {
            unsafe { *sem_ptr = 0 };
        }
        guard.pcbs.get_mut(pcb_idx).state = state;
        let resume_state = guard.pcbs.get(pcb_idx).state;
        drop(guard);
        crate::trap::resume(&resume_state)
    }
}

/// `verhogen`: symmetric to [`sys_passeren`]. `*sem == 1` means held by
/// someone who is about to V it while another waiter already exists on this
/// path — block the caller. Any other value (0, meaning free/no holder)
/// either promotes a waiter or sets `*sem` to 1.
fn sys_verhogen(cpu: usize, mut guard: NucleusGuard, pcb_idx: usize, state: ProcessorState) -> ! {
    let sem_key = state.reg[REG_A1];
    let sem_ptr = sem_key as usize as *mut i32;
    let current = unsafe { *sem_ptr };
    if current == 1 {
        guard.pcbs.get_mut(pcb_idx).state = state;
        guard.pcbs.get_mut(pcb_idx).sem_addr = Some(sem_key as usize);
        guard.asl.insert_blocked(sem_key, pcb_idx);
        guard.soft_blocked_count += 1;
        guard.current_process[cpu] = None;
        drop(guard);
        sched::schedule()
    } else {
        if let Some(woken) = guard.asl.remove_blocked(sem_key) {
            guard.pcbs.get_mut(woken).sem_addr = None;
            guard.soft_blocked_count = guard.soft_blocked_count.saturating_sub(1);
            sched::make_ready(&mut guard, woken);
        } else {
            unsafe { *sem_ptr = 1 };
        }
        guard.pcbs.get_mut(pcb_idx).state = state;
        let resume_state = guard.pcbs.get(pcb_idx).state;
        drop(guard);
        crate::trap::resume(&resume_state)
    }
}

/// `DOIO`: write the device command, then unconditionally block the caller
/// on that device's semaphore until the interrupt handler wakes it, per
/// the original's `doIo` (it never polls for completion itself).
fn sys_do_io(cpu: usize, mut guard: NucleusGuard, pcb_idx: usize, state: ProcessorState) -> ! {
    let cmd_addr = state.reg[REG_A1] as usize;
    let cmd_value = state.reg[REG_A2];
    let sem_index = state.reg[REG_A3] as usize;
    unsafe {
        core::ptr::write_volatile(cmd_addr as *mut u32, cmd_value);
    }
    guard.device_semaphores[sem_index] -= 1;
    guard.pcbs.get_mut(pcb_idx).state = state;
    guard.pcbs.get_mut(pcb_idx).sem_addr = Some(sem_index);
    guard.asl.insert_blocked(sem_index as u32, pcb_idx);
    guard.soft_blocked_count += 1;
    guard.current_process[cpu] = None;
    drop(guard);
    sched::schedule()
}

fn sys_get_time(mut guard: NucleusGuard, pcb_idx: usize, mut state: ProcessorState) -> ! {
    let cpu_time = guard.pcbs.get(pcb_idx).cpu_time;
    state.reg[REG_A0] = (cpu_time & 0xFFFF_FFFF) as u32;
    guard.pcbs.get_mut(pcb_idx).state = state;
    drop(guard);
    crate::trap::resume(&state)
}

fn sys_clock_wait(cpu: usize, mut guard: NucleusGuard, pcb_idx: usize, state: ProcessorState) -> ! {
    guard.device_semaphores[PSEUDOCLOCK_INDEX] -= 1;
    guard.pcbs.get_mut(pcb_idx).state = state;
    guard.pcbs.get_mut(pcb_idx).sem_addr = Some(PSEUDOCLOCK_INDEX);
    guard.asl.insert_blocked(PSEUDOCLOCK_INDEX as u32, pcb_idx);
    guard.soft_blocked_count += 1;
    guard.current_process[cpu] = None;
    drop(guard);
    sched::schedule()
}

fn sys_get_support_ptr(mut guard: NucleusGuard, pcb_idx: usize, mut state: ProcessorState) -> ! {
    state.reg[REG_A0] = guard.pcbs.get(pcb_idx).support.map(|i| i as u32).unwrap_or(NO_SUPPORT);
    guard.pcbs.get_mut(pcb_idx).state = state;
    drop(guard);
    crate::trap::resume(&state)
}

fn sys_get_process_id(mut guard: NucleusGuard, pcb_idx: usize, state: &ProcessorState) -> ! {
    let mut state = *state;
    let target = state.reg[REG_A1];
    state.reg[REG_A0] = if target == 0 {
        guard.pcbs.get(pcb_idx).pid
    } else {
        let parent = guard.pcbs.get(pcb_idx).parent;
        if parent == crate::list::NIL { 0 } else { guard.pcbs.get(parent).pid }
    };
    guard.pcbs.get_mut(pcb_idx).state = state;
    drop(guard);
    crate::trap::resume(&state)
}

fn sys_yield(cpu: usize, mut guard: NucleusGuard, pcb_idx: usize, state: ProcessorState) -> ! {
    guard.pcbs.get_mut(pcb_idx).state = state;
    guard.current_process[cpu] = None;
    sched::make_ready(&mut guard, pcb_idx);
    drop(guard);
    sched::schedule()
}
