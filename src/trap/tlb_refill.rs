//! TLB refill and TLB-exception handling.
//!
//! Grounded on `examples/original_source/phase2/exceptions.c`'s
//! `uTLB_RefillHandler` (compute the page-table index from the faulting
//! VPN, write `entry_hi`/`entry_lo` from the current process's private
//! page table, `TLBWR`, resume) and `handleTLBException` (pass the fault
//! up to the support level's page-fault vector if the process has a
//! support struct, else kill it — identical shape to
//! `trap::exception::handle_program_trap` but tagged
//! `ExceptionKind::PageFault`).

use crate::bios::ProcessorState;
use crate::memmap::{GETPAGENO, USTACK_PAGETBL_INDEX, VPNSHIFT};
use crate::process::state::ExceptionKind;
use crate::sync;
use crate::trap::exception;

/// The uTLB-Refill fast path, invoked directly by the BIOS exception
/// vector for this CPU before the general `CAUSE` dispatch runs — the
/// simulator routes refill misses here, not through
/// [`crate::trap::handle_exception`].
pub fn refill(cpu: usize, state: ProcessorState) -> ! {
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    let pcb_idx = guard.current_process[cpu].expect("TLB refill with no current process");
    let vpn = (state.entry_hi & GETPAGENO) >> VPNSHIFT;
    let page_index = page_table_index(vpn);
    let support_idx = guard.pcbs.get(pcb_idx).support;
    let (entry_hi, entry_lo) = match support_idx {
        Some(idx) => {
            let pte = guard.support.get(idx).page_table[page_index];
            (pte.entry_hi, pte.entry_lo)
        }
        None => (state.entry_hi, 0),
    };
    drop(guard);
    unsafe {
        crate::bios::write_entry_hi(entry_hi);
        crate::bios::write_entry_lo(entry_lo);
        crate::bios::tlbwr();
    }
    crate::trap::resume(&state)
}

fn page_table_index(vpn: u32) -> usize {
    let top_vpn = 0xBFFFF;
    if vpn == top_vpn {
        USTACK_PAGETBL_INDEX
    } else {
        (vpn as usize) & 0xFF
    }
}

/// Dispatch for `CAUSE` exception codes 25/26 (TLB-Invalid load/store):
/// pass up to the support level's page-fault vector, or kill the process if
/// it has no support struct. Never returns.
pub fn handle_tlb_exception(cpu: usize, state: ProcessorState) -> ! {
    let mut guard = sync::lock();
    sync::charge_cpu_time(&mut guard, cpu);
    let pcb_idx = guard.current_process[cpu].expect("TLB exception with no current process");
    if guard.pcbs.get(pcb_idx).support.is_some() {
        exception::pass_up_to_support_level(guard, pcb_idx, ExceptionKind::PageFault, state)
    } else {
        drop(guard);
        exception::terminate_process(cpu, pcb_idx)
    }
}
