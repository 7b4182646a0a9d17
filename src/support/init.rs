//! Support-level instantiator: `test()`, the nucleus's first process.
//!
//! Grounded on `examples/original_source/phase3/initProc.c`: initialize the
//! swap pool, create one U-proc per ASID (1..=UPROCMAX) with a private
//! page table and pass-up exception contexts pointing at
//! `generalExceptionHandler`/`TLB_Handler`, then block on a master
//! semaphore once per U-proc so `test()` only exits after every U-proc has
//! terminated and released it.
//!
//! `test()` issues real `ECALL`-based syscalls via `bios::syscall` rather
//! than calling `trap::syscall`'s handlers directly, since those handlers
//! assume they're entered from a trap with a freshly captured
//! `ProcessorState` to save — issuing a genuine syscall is the only way for
//! `test()` (itself a scheduled, trap-entered PCB) to block and be resumed
//! correctly.

use crate::bios::{self, ProcessorState, Status};
use crate::memmap::{
    ASIDSHIFT, DIRTYON, SYS_CREATEPROCESS, SYS_PASSEREN, SYS_TERMPROCESS, UPROCMAX,
    UPROCSTARTADDR, USERSTACKTOP, USTACK_VPN,
};
use crate::process::state::{ExceptionContext, PageTableEntry};
use crate::sync;

static mut MASTER_SEMAPHORE: i32 = 0;

const SUPPORT_STACK_SIZE: usize = 1024;
static mut SUPPORT_STACKS: [[[u8; SUPPORT_STACK_SIZE]; 2]; UPROCMAX] =
    [[[0; SUPPORT_STACK_SIZE]; 2]; UPROCMAX];

fn support_stack_top(uproc: usize, which: usize) -> u32 {
    unsafe { (core::ptr::addr_of!(SUPPORT_STACKS[uproc][which]) as usize + SUPPORT_STACK_SIZE) as u32 }
}

/// `_initState`: a fresh U-proc always starts at `UPROCSTARTADDR` with user
/// mode + interrupts + the VM-on status bits set, and its ASID loaded into
/// `entry_hi`.
fn init_u_proc_state(asid: u32) -> ProcessorState {
    let mut state = ProcessorState::zeroed();
    state.pc_epc = UPROCSTARTADDR;
    state.reg[bios::REG_SP] = USERSTACKTOP;
    state.status = (Status::IEC | Status::KUC | Status::IEP | Status::KUP | Status::TE_BIT_ON).bits();
    state.entry_hi = asid << ASIDSHIFT;
    state
}

/// `_initSupport`: pre-fill the private page table so every entry already
/// carries the right ASID and VPN, with the stack page pinned at the last
/// table slot.
fn init_support_page_table(asid: u32) -> [PageTableEntry; crate::memmap::USERPGTBLSIZE] {
    let mut table = [PageTableEntry::empty(); crate::memmap::USERPGTBLSIZE];
    for (i, entry) in table.iter_mut().enumerate().take(crate::memmap::USERPGTBLSIZE - 1) {
        entry.entry_hi = (0x8000_0000u32 + ((i as u32) << 12)) | (asid << ASIDSHIFT);
        entry.entry_lo = DIRTYON;
    }
    let last = crate::memmap::USTACK_PAGETBL_INDEX;
    table[last].entry_hi = ((USTACK_VPN as u32) << 12) | (asid << ASIDSHIFT);
    table[last].entry_lo = DIRTYON;
    table
}

/// Allocate a support struct for `asid`, fill its page table and pass-up
/// exception contexts, and return its pool index.
fn init_support_struct(asid: u32) -> usize {
    let mut guard = sync::lock();
    let idx = guard.support.alloc().expect("support pool exhausted during U-proc boot");
    let support = guard.support.get_mut(idx);
    support.asid = asid;
    support.page_table = init_support_page_table(asid);
    support.exception_context[crate::process::state::ExceptionKind::General as usize] = ExceptionContext {
        stack_ptr: support_stack_top(idx, 0),
        status: (Status::MPP_M | Status::MIE).bits(),
        pc: crate::support::syscall::general_exception_handler as usize as u32,
    };
    support.exception_context[crate::process::state::ExceptionKind::PageFault as usize] = ExceptionContext {
        stack_ptr: support_stack_top(idx, 1),
        status: (Status::MPP_M | Status::MIE).bits(),
        pc: crate::support::vm::tlb_handler as usize as u32,
    };
    idx
}

/// The nucleus's first process. Never returns.
pub fn test() -> ! {
    crate::log_info!("test: starting");
    crate::support::vm::init_swap_structures();

    for asid in 1..=(UPROCMAX as u32) {
        let init_state = init_u_proc_state(asid);
        let support_idx = init_support_struct(asid);
        let pid = unsafe {
            bios::syscall(
                SYS_CREATEPROCESS,
                &init_state as *const ProcessorState as usize as u32,
                support_idx as u32,
                0,
            )
        };
        if (pid as i32) < 0 {
            crate::log_error!("test: failed to create U-proc for asid {}", asid);
        }
    }

    for _ in 0..UPROCMAX {
        unsafe {
            bios::syscall(SYS_PASSEREN, core::ptr::addr_of!(MASTER_SEMAPHORE) as u32, 0, 0);
        }
    }

    crate::log_info!("test: all U-procs terminated, exiting");
    unsafe {
        bios::syscall(SYS_TERMPROCESS, 0, 0, 0);
    }
    unreachable!("TERMPROCESS never returns");
}

/// Address callers in `support::syscall::terminate_u_proc` use to release
/// `test()`'s wait.
pub fn master_semaphore_addr() -> u32 {
    unsafe { core::ptr::addr_of!(MASTER_SEMAPHORE) as u32 }
}
