//! Interrupt dispatch: local timer, pseudo-clock, and device lines.
//!
//! Grounded on `examples/original_source/phase2/interrupts.c`:
//! `getLineNo`/`getHighestPriorityDeviceNumber` identify which line and
//! device raised the interrupt; `handleDeviceInterrupt` ACKs the device,
//! delivers its status word into the unblocked process's `a0`, and resets
//! the semaphore to the "available" state; `handlePseudoClockInterrupt`
//! re-arms the pseudo-clock and drains *every* waiter (a batched wake-up,
//! not a single `V()`); `handleProcessLocalTimerInterrupt` re-arms this
//! CPU's timeslice timer and returns the interrupted process straight to
//! ready.

use crate::bios::{self, ProcessorState, REG_A0};
use crate::device;
use crate::memmap::{
    dev_base, CAUSE_IP_MASK, DEVS_PER_LINE, DEV_BITMAP_BASE, IL_CPUTIMER, IL_DISK, IL_ETHERNET,
    IL_FLASH, IL_INTERVAL_TIMER, IL_PRINTER, IL_TERMINAL, PSECOND, PSEUDOCLOCK_INDEX,
    TERM_RECV_COMMAND_OFFSET, TERM_RECV_STATUS_OFFSET, TERM_TRANSM_COMMAND_OFFSET,
    TERM_TRANSM_STATUS_OFFSET, TIMESLICE,
};
use crate::sched;
use crate::sync;

/// Map the pending-interrupt bits in `CAUSE` to a single line number, per
/// `getLineNo`. Prefers the lowest-numbered pending line, matching the
/// original's priority order (timer > pseudo-clock > disk > flash >
/// ethernet > printer > terminal).
fn highest_priority_line(cause: u32) -> Option<usize> {
    let pending = (cause & CAUSE_IP_MASK) >> 8;
    for line in [
        IL_CPUTIMER,
        IL_INTERVAL_TIMER,
        IL_DISK,
        IL_FLASH,
        IL_ETHERNET,
        IL_PRINTER,
        IL_TERMINAL,
    ] {
        if pending & (1 << line) != 0 {
            return Some(line);
        }
    }
    None
}

fn highest_priority_device(line: usize) -> usize {
    let bitmap = unsafe { core::ptr::read_volatile((DEV_BITMAP_BASE + line * 4) as *const u32) };
    for dev in 0..DEVS_PER_LINE {
        if bitmap & (1 << dev) != 0 {
            return dev;
        }
    }
    panic!("interrupt pending on line {} but no device bit set", line);
}

pub fn handle(cpu: usize, state: ProcessorState) -> ! {
    let line = highest_priority_line(state.cause).expect("interrupt CAUSE with no pending line");
    match line {
        IL_CPUTIMER => handle_local_timer(cpu, state),
        IL_INTERVAL_TIMER => handle_pseudo_clock(cpu, state),
        _ => handle_device(cpu, state, line),
    }
}

fn handle_local_timer(cpu: usize, state: ProcessorState) -> ! {
    bios::set_timer(TIMESLICE);
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    if let Some(idx) = guard.current_process[cpu] {
        guard.pcbs.get_mut(idx).state = state;
        guard.current_process[cpu] = None;
        sched::make_ready(&mut guard, idx);
    }
    drop(guard);
    sched::schedule()
}

fn handle_pseudo_clock(cpu: usize, state: ProcessorState) -> ! {
    bios::ldit(PSECOND);
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    if let Some(idx) = guard.current_process[cpu] {
        guard.pcbs.get_mut(idx).state = state;
    }
    guard.device_semaphores[PSEUDOCLOCK_INDEX] = 0;
    while let Some(woken) = guard.asl.remove_blocked(PSEUDOCLOCK_INDEX as u32) {
        guard.pcbs.get_mut(woken).sem_addr = None;
        guard.soft_blocked_count = guard.soft_blocked_count.saturating_sub(1);
        sched::make_ready(&mut guard, woken);
    }
    let resume = guard.current_process[cpu].map(|idx| guard.pcbs.get(idx).state);
    drop(guard);
    match resume {
        Some(resume_state) => crate::trap::resume(&resume_state),
        None => sched::schedule(),
    }
}

fn handle_device(cpu: usize, state: ProcessorState, line: usize) -> ! {
    let dev = highest_priority_device(line);
    let base = dev_base(line, dev);

    let (sem_index, status, ack_offset) = if line == IL_TERMINAL {
        let transmit_status =
            unsafe { core::ptr::read_volatile((base + TERM_TRANSM_STATUS_OFFSET) as *const u32) };
        if transmit_status & 0xFF != 0 && transmit_status & 0xFF != 1 {
            let idx = device::terminal_semaphore_index(base + TERM_TRANSM_STATUS_OFFSET);
            (idx, transmit_status, TERM_TRANSM_COMMAND_OFFSET)
        } else {
            let receive_status =
                unsafe { core::ptr::read_volatile((base + TERM_RECV_STATUS_OFFSET) as *const u32) };
            let idx = device::terminal_semaphore_index(base + TERM_RECV_STATUS_OFFSET);
            (idx, receive_status, TERM_RECV_COMMAND_OFFSET)
        }
    } else {
        let status = unsafe { core::ptr::read_volatile(base as *const u32) };
        let idx = device::semaphore_index(line, dev);
        (idx, status, 0usize)
    };

    unsafe {
        core::ptr::write_volatile((base + ack_offset) as *mut u32, crate::memmap::DEV_ACK);
    }

    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    if let Some(idx) = guard.current_process[cpu] {
        guard.pcbs.get_mut(idx).state = state;
    }
    guard.device_semaphores[sem_index] += 1;
    if guard.device_semaphores[sem_index] <= 0 {
        if let Some(woken) = guard.asl.remove_blocked(sem_index as u32) {
            guard.pcbs.get_mut(woken).sem_addr = None;
            guard.pcbs.get_mut(woken).state.reg[REG_A0] = status;
            guard.soft_blocked_count = guard.soft_blocked_count.saturating_sub(1);
            sched::make_ready(&mut guard, woken);
        }
    }
    let resume = guard.current_process[cpu].map(|idx| guard.pcbs.get(idx).state);
    drop(guard);
    match resume {
        Some(resume_state) => crate::trap::resume(&resume_state),
        None => sched::schedule(),
    }
}
