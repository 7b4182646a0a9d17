//! Swap pool and TLB fault handler.
//!
//! Grounded on `examples/original_source/phase3/vmSupport.c`: a fixed
//! `SWAP_POOL_SIZE`-entry swap table records which ASID/VPN occupies each
//! physical frame; `TLB_Handler` locks the swap-pool mutex, checks whether
//! the faulting page is already resident (race with another CPU), else
//! picks the next frame round-robin, writes back a dirty victim, reads the
//! faulting page in from flash, updates the swap table and the owning
//! ASID's page-table entry, then probes/updates the TLB before resuming.

use crate::bios::{self, ProcessorState};
use crate::memmap::{
    DIRTYON, EXC_TLB_INVALID_LOAD, EXC_TLB_INVALID_STORE, FLASHREAD, FLASHWRITE, GETPAGENO,
    SWAP_POOL_SIZE, SWAP_POOL_STARTADDR, SYS_GETSUPPORTPTR, SYS_PASSEREN, SYS_VERHOGEN,
    USTACK_PAGETBL_INDEX, VALIDON, VPNSHIFT,
};
use crate::sync;

static mut SWAP_MUTEX: i32 = 1;

/// ASID currently holding `SWAP_MUTEX`, or `-1` if unheld. Lets
/// [`release_asid`] release the mutex on behalf of a U-proc that is
/// terminated mid-pagefault, per `AsidInSwapPool`.
static mut SWAP_MUTEX_HOLDER: i32 = -1;

#[derive(Clone, Copy)]
struct SwapEntry {
    asid: i32,
    vpn: u32,
}

impl SwapEntry {
    const fn empty() -> Self {
        SwapEntry { asid: -1, vpn: 0 }
    }
}

static mut SWAP_TABLE: [SwapEntry; SWAP_POOL_SIZE] = [SwapEntry::empty(); SWAP_POOL_SIZE];
static mut NEXT_VICTIM: usize = 0;

pub fn init_swap_structures() {
    unsafe {
        for entry in core::ptr::addr_of_mut!(SWAP_TABLE).as_mut().unwrap().iter_mut() {
            *entry = SwapEntry::empty();
        }
        NEXT_VICTIM = 0;
    }
}

fn lock_swap_pool(asid: u32) {
    unsafe {
        bios::syscall(SYS_PASSEREN, core::ptr::addr_of!(SWAP_MUTEX) as u32, 0, 0);
        SWAP_MUTEX_HOLDER = asid as i32;
    }
}

fn unlock_swap_pool() {
    unsafe {
        SWAP_MUTEX_HOLDER = -1;
        bios::syscall(SYS_VERHOGEN, core::ptr::addr_of!(SWAP_MUTEX) as u32, 0, 0);
    }
}

fn frame_addr(frame: usize) -> usize {
    SWAP_POOL_STARTADDR + frame * crate::memmap::PAGESIZE
}

fn page_table_index(vpn: u32) -> usize {
    if vpn == 0xBFFFF {
        USTACK_PAGETBL_INDEX
    } else {
        (vpn as usize) & 0xFF
    }
}

fn next_victim_frame() -> usize {
    unsafe {
        let frame = NEXT_VICTIM;
        NEXT_VICTIM = (NEXT_VICTIM + 1) % SWAP_POOL_SIZE;
        frame
    }
}

/// Marshal a flash read/write for `asid`'s device (flash devices are keyed
/// 1:1 with ASIDs, per the original's `dev = asid - 1`), transferring one
/// page at `frame_addr` to/from flash block `vpn`.
fn flash_io(asid: u32, vpn: u32, frame: usize, op: u32) -> bool {
    let dev = (asid - 1) as usize;
    let base = crate::memmap::dev_base(crate::memmap::IL_FLASH, dev);
    let data0 = base + 0x4;
    unsafe {
        core::ptr::write_volatile(data0 as *mut u32, frame_addr(frame) as u32);
    }
    let cmd = (vpn << 8) | op;
    let sem_index = crate::device::semaphore_index(crate::memmap::IL_FLASH, dev);
    let status = unsafe { bios::syscall(crate::memmap::SYS_DOIO, base as u32, cmd, sem_index as u32) };
    status & 0xFF == crate::memmap::DEV_READY
}

fn update_tlb_probe(entry_hi: u32, entry_lo: u32) {
    unsafe {
        bios::write_entry_hi(entry_hi);
        bios::tlbp();
        if bios::tlbp_found() {
            bios::write_entry_lo(entry_lo);
            bios::tlbwi();
        }
    }
}

/// The page-fault pass-up entry point. Never returns.
pub extern "C" fn tlb_handler() -> ! {
    let support_idx = unsafe { bios::syscall(SYS_GETSUPPORTPTR, 0, 0, 0) } as usize;
    let state = {
        let guard = sync::lock();
        guard.support.get(support_idx).exception_state[crate::process::state::ExceptionKind::PageFault as usize]
    };
    let exc_code = (state.cause >> crate::memmap::CAUSE_EXCCODE_SHIFT) & crate::memmap::CAUSE_EXCCODE_MASK;
    if exc_code != EXC_TLB_INVALID_LOAD && exc_code != EXC_TLB_INVALID_STORE {
        crate::support::syscall::terminate_u_proc(support_idx);
    }

    let asid = { sync::lock().support.get(support_idx).asid };
    lock_swap_pool(asid);
    let vpn = (state.entry_hi & GETPAGENO) >> VPNSHIFT;
    let page_index = page_table_index(vpn);

    // Already resident? Another CPU may have paged it in between the
    // fault and our acquiring the swap-pool mutex.
    {
        let guard = sync::lock();
        let pte = guard.support.get(support_idx).page_table[page_index];
        if pte.entry_lo & VALIDON != 0 {
            drop(guard);
            update_tlb_probe(pte.entry_hi, pte.entry_lo);
            unlock_swap_pool();
            resume_faulting_proc(state);
        }
    }

    let frame = next_victim_frame();
    let victim = unsafe { core::ptr::addr_of!(SWAP_TABLE)[frame] };
    if victim.asid >= 0 {
        // Evict: clear the victim's PTE so no stale TLB entry survives,
        // write its contents back to flash.
        let mut guard = sync::lock();
        if let Some(victim_support) = find_support_by_asid(&guard, victim.asid as u32) {
            let victim_index = page_table_index(victim.vpn);
            guard.support.get_mut(victim_support).page_table[victim_index].entry_lo &= !VALIDON;
            let entry_hi = guard.support.get(victim_support).page_table[victim_index].entry_hi;
            drop(guard);
            update_tlb_probe(entry_hi, 0);
            flash_io(victim.asid as u32, victim.vpn, frame, FLASHWRITE);
        }
    }

    if !flash_io(asid, vpn, frame, FLASHREAD) {
        unlock_swap_pool();
        crate::support::syscall::terminate_u_proc(support_idx);
    }

    unsafe {
        core::ptr::addr_of_mut!(SWAP_TABLE)
            .as_mut()
            .unwrap()[frame] = SwapEntry { asid: asid as i32, vpn };
    }
    let new_entry_lo = (frame_addr(frame) as u32 & 0xFFFF_F000) | VALIDON | DIRTYON;
    let new_entry_hi = {
        let mut guard = sync::lock();
        let entry_hi = guard.support.get(support_idx).page_table[page_index].entry_hi;
        guard.support.get_mut(support_idx).page_table[page_index].entry_lo = new_entry_lo;
        entry_hi
    };
    update_tlb_probe(new_entry_hi, new_entry_lo);

    unlock_swap_pool();
    resume_faulting_proc(state);
}

fn find_support_by_asid(guard: &sync::NucleusState, asid: u32) -> Option<usize> {
    for idx in 0..crate::memmap::UPROCMAX {
        if guard.support.get(idx).asid == asid {
            return Some(idx);
        }
    }
    let _ = guard;
    None
}

fn resume_faulting_proc(state: ProcessorState) -> ! {
    unsafe { bios::ldst(&state) }
}

/// Invalidate every swap-table entry (and corresponding PTE) belonging to
/// `asid`, and release the swap-pool mutex if this ASID happened to hold
/// it mid-fault. Called from `terminate_u_proc`.
pub fn release_asid(asid: u32) {
    unsafe {
        for entry in core::ptr::addr_of_mut!(SWAP_TABLE).as_mut().unwrap().iter_mut() {
            if entry.asid == asid as i32 {
                *entry = SwapEntry::empty();
            }
        }
        if SWAP_MUTEX_HOLDER == asid as i32 {
            unlock_swap_pool();
        }
    }
}
