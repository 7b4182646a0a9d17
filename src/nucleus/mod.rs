//! Nucleus bring-up: pass-up vector wiring, per-CPU boot PCBs, device
//! semaphore table, and the kickoff of the first (`test`) process.
//!
//! Grounded on `examples/original_source/phase2/initial.c`'s `main()`:
//! zero the device semaphore table, install the pass-up vector entries
//! (TLB-refill and general-exception handlers plus their stack pointers),
//! bring up CPU 0's first PCB running `support::init::test`, bring up every
//! other CPU with its PCB parked in the scheduler, then call
//! [`crate::sched::schedule`].

use crate::bios::{ProcessorState, Status};
use crate::memmap::{BIOSDATAPAGE, NCPU, PASSUPVECTOR, RAMSTART, STATESIZE};
use crate::sched;
use crate::sync;

const NUCLEUS_STACK_SIZE: usize = 4096;

/// One fixed-size kernel stack per CPU, reserved for the scheduler's own
/// execution (not any process's kernel stack) — matches the teacher's
/// static stack arrays in `gdt.rs` (`KERNEL_STACK`, `DF_STACK`).
static mut CPU_STACKS: [[u8; NUCLEUS_STACK_SIZE]; NCPU] = [[0; NUCLEUS_STACK_SIZE]; NCPU];

fn cpu_stack_top(cpu: usize) -> u32 {
    unsafe { (core::ptr::addr_of!(CPU_STACKS[cpu]) as usize + NUCLEUS_STACK_SIZE) as u32 }
}

/// Pass-up vector entry: where the BIOS resumes execution for a given
/// exception class on this CPU, before any process-specific dispatch runs.
#[repr(C)]
struct PassUpEntry {
    handler: u32,
    stack_ptr: u32,
}

fn write_pass_up_entry(slot: usize, handler: extern "C" fn() -> !, stack_top: u32) {
    let entry = PassUpEntry { handler: handler as usize as u32, stack_ptr: stack_top };
    let addr = (PASSUPVECTOR + slot * core::mem::size_of::<PassUpEntry>()) as *mut PassUpEntry;
    unsafe { core::ptr::write_volatile(addr, entry) };
}

/// Read the per-CPU exception state the BIOS saved just before the
/// pass-up, at `BIOSDATAPAGE + cpu * STATESIZE` (spec §6).
fn exception_state_for(cpu: usize) -> ProcessorState {
    let addr = (BIOSDATAPAGE + cpu * STATESIZE) as *const ProcessorState;
    unsafe { core::ptr::read_volatile(addr) }
}

extern "C" fn tlb_refill_trampoline() -> ! {
    let cpu = crate::bios::get_prid();
    let state = exception_state_for(cpu);
    crate::trap::tlb_refill::refill(cpu, state)
}

extern "C" fn exception_trampoline() -> ! {
    let cpu = crate::bios::get_prid();
    let state = exception_state_for(cpu);
    crate::trap::handle_exception(cpu, state)
}

/// Install the pass-up vector: slot 0 is the TLB-refill handler, slot 1 is
/// the general exception handler, one per CPU stack.
fn init_pass_up_vector() {
    for cpu in 0..NCPU {
        write_pass_up_entry(cpu * 2, tlb_refill_trampoline, cpu_stack_top(cpu));
        write_pass_up_entry(cpu * 2 + 1, exception_trampoline, cpu_stack_top(cpu));
    }
}

fn boot_state(entry: u32, stack_top: u32, kernel_mode: bool) -> ProcessorState {
    let mut state = ProcessorState::zeroed();
    state.pc_epc = entry;
    state.reg[crate::bios::REG_SP] = stack_top;
    state.status = if kernel_mode {
        (Status::MPP_M | Status::MIE | Status::MPIE).bits()
    } else {
        (Status::IEC | Status::KUC | Status::IEP | Status::KUP).bits()
    };
    state
}

/// Nucleus entry point, called once from `main.rs` after the BIOS has
/// released CPU 0. Never returns.
pub fn init() -> ! {
    crate::serial::init();
    crate::log_info!("nucleus: initializing");

    {
        let mut guard = sync::lock();
        guard.init();
    }

    init_pass_up_vector();

    {
        let mut guard = sync::lock();
        let first_idx = guard
            .pcbs
            .alloc()
            .expect("PCB pool exhausted during boot, should be impossible");
        let entry = crate::support::init::test as usize as u32;
        guard.pcbs.get_mut(first_idx).state =
            boot_state(entry, cpu_stack_top(0) - NUCLEUS_STACK_SIZE as u32 / 2, true);
        guard.pcbs.enqueue(&mut guard.ready_queue, first_idx);
        guard.process_count += 1;

        for cpu in 1..NCPU {
            // Secondary CPUs don't get a PCB of their own: they boot
            // straight into the scheduler, which has no notion of "current
            // process" until it dispatches one.
            let scheduler_entry = sched::schedule as usize as u32;
            let state = boot_state(scheduler_entry, cpu_stack_top(cpu), true);
            unsafe { crate::bios::initcpu(cpu, &state) };
        }
    }

    crate::log_info!("nucleus: boot complete, entering scheduler");
    let _ = RAMSTART;
    sched::schedule()
}
