//! Support-level syscall handler and pass-up entry points.
//!
//! Grounded on `examples/original_source/phase3/sysSupport.c`:
//! `generalExceptionHandler` checks whether the pass-up was for a genuine
//! `SYSCALL`/breakpoint (dispatches to `syscallHandler`) or any other trap
//! (`programTrapExceptionHandler`, which is just `terminateUProc`).
//! `writePrinter`/`writeTerminal`/`readTerminal` all hold a per-device
//! mutex (so concurrent U-procs don't interleave on the same physical
//! device), validate the user buffer against `_is_valid_address`, and drive
//! the device with `DOIO`.

use crate::bios::{self, ProcessorState, REG_A0, REG_A1, REG_A2};
use crate::device;
use crate::memmap::{
    dev_base, CAUSE_EXCCODE_MASK, CAUSE_EXCCODE_SHIFT, EXC_SYSCALL, IL_PRINTER, IL_TERMINAL,
    KUSEG, MAXSTRLENG, NSUPPSEM, PRINTCHR, RECEIVECHAR, SUPP_READTERMINAL, SUPP_TERMINATE,
    SUPP_WRITEPRINTER, SUPP_WRITETERMINAL, SYS_GETSUPPORTPTR, SYS_PASSEREN, SYS_TERMPROCESS,
    SYS_VERHOGEN, TERM_RECV_COMMAND_OFFSET, TERM_RECV_STATUS_OFFSET, TERM_TRANSM_COMMAND_OFFSET,
    TERM_TRANSM_STATUS_OFFSET, USERSTACKTOP,
};
use crate::sync;

const PRINTER_LINE: usize = IL_PRINTER;
const TERMINAL_LINE: usize = IL_TERMINAL;
const CODE_STACK_END: u32 = (KUSEG as u32) + 0x0001_E000;

/// Per-device mutual-exclusion semaphores at the support level, one per
/// (line, device, direction) slot in the same index space
/// `device::semaphore_index`/`terminal_semaphore_index` already use for the
/// nucleus's device-interrupt semaphores — a distinct array from those,
/// since a mutex (initialized to 1, held for the whole transfer) and a
/// blocking-on-DOIO semaphore serve different purposes. Grounded on
/// `original_source/phase3/sysSupport.c`'s `SupportDeviceSemaphores`, a real
/// `NSUPPSEM`-entry array initialized to 1, not a bare integer key.
static mut SUPPORT_DEVICE_MUTEXES: [i32; NSUPPSEM] = [1; NSUPPSEM];

fn is_valid_address(addr: u32, len: u32) -> bool {
    if len > MAXSTRLENG as u32 {
        return false;
    }
    let end = addr.saturating_add(len);
    let in_code_data = addr >= KUSEG as u32 && end <= CODE_STACK_END;
    let in_stack = addr >= 0xBFFF_F000 && end <= USERSTACKTOP as u32;
    in_code_data || in_stack
}

/// `generalExceptionHandler`: find our own support struct via
/// `GETSUPPORTPTR`, then route genuine syscalls to [`syscall_handler`] and
/// everything else to `terminate_u_proc`. Never returns.
pub extern "C" fn general_exception_handler() -> ! {
    let support_idx = unsafe { bios::syscall(SYS_GETSUPPORTPTR, 0, 0, 0) } as usize;
    let state = {
        let guard = sync::lock();
        guard.support.get(support_idx).exception_state[crate::process::state::ExceptionKind::General as usize]
    };
    let exc_code = (state.cause >> CAUSE_EXCCODE_SHIFT) & CAUSE_EXCCODE_MASK;
    if exc_code == EXC_SYSCALL {
        syscall_handler(support_idx, state)
    } else {
        terminate_u_proc(support_idx)
    }
}

fn syscall_handler(support_idx: usize, mut state: ProcessorState) -> ! {
    let call = state.reg[REG_A0] as i32;
    let result = match call {
        SUPP_TERMINATE => {
            terminate_u_proc(support_idx);
        }
        SUPP_WRITEPRINTER => write_printer(support_idx, state.reg[REG_A1], state.reg[REG_A2]),
        SUPP_WRITETERMINAL => write_terminal(support_idx, state.reg[REG_A1], state.reg[REG_A2]),
        SUPP_READTERMINAL => read_terminal(support_idx, state.reg[REG_A1]),
        _ => {
            crate::log_warn!("support: unknown syscall {} for asid {}", call, asid_of(support_idx));
            -1
        }
    };
    state.reg[REG_A0] = result as u32;
    state.pc_epc = state.pc_epc.wrapping_add(4);
    unsafe { bios::ldst(&state) }
}

fn asid_of(support_idx: usize) -> u32 {
    sync::lock().support.get(support_idx).asid
}

fn device_mutex_addr(index: usize) -> u32 {
    unsafe { core::ptr::addr_of_mut!(SUPPORT_DEVICE_MUTEXES[index]) as u32 }
}

fn device_mutex_value(index: usize) -> i32 {
    unsafe { core::ptr::read_volatile(core::ptr::addr_of!(SUPPORT_DEVICE_MUTEXES[index])) }
}

fn lock_device(index: usize) {
    unsafe { bios::syscall(SYS_PASSEREN, device_mutex_addr(index), 0, 0) };
}

fn unlock_device(index: usize) {
    unsafe { bios::syscall(SYS_VERHOGEN, device_mutex_addr(index), 0, 0) };
}

/// This ASID's three device-mutex slots (printer, terminal-transmit,
/// terminal-receive) — the only devices a U-proc ever touches, since
/// `dev = asid - 1` gives it exclusive ownership of one device per line.
fn device_mutex_indices(asid: u32) -> [usize; 3] {
    let dev = (asid - 1) as usize;
    let term_base = dev_base(TERMINAL_LINE, dev);
    [
        device::semaphore_index(PRINTER_LINE, dev),
        device::terminal_semaphore_index(term_base + TERM_TRANSM_STATUS_OFFSET),
        device::terminal_semaphore_index(term_base),
    ]
}

/// `writePrinter`: print up to `len` characters from the U-proc's buffer,
/// one `DOIO` per character, holding this ASID's printer mutex for the
/// whole transfer.
fn write_printer(support_idx: usize, buf_addr: u32, len: u32) -> i32 {
    if !is_valid_address(buf_addr, len) {
        return -1;
    }
    let asid = asid_of(support_idx);
    let dev = (asid - 1) as usize;
    let sem_index = device::semaphore_index(PRINTER_LINE, dev);
    lock_device(sem_index);
    let base = dev_base(PRINTER_LINE, dev);
    let mut sent = 0u32;
    while sent < len {
        let ch = unsafe { core::ptr::read_volatile((buf_addr + sent) as *const u8) };
        let cmd = PRINTCHR | ((ch as u32) << 8);
        let status = unsafe {
            bios::syscall(crate::memmap::SYS_DOIO, (base as u32), cmd, sem_index as u32)
        };
        if status & 0xFF != crate::memmap::DEV_READY {
            unlock_device(sem_index);
            return -((status & 0xFF) as i32);
        }
        sent += 1;
    }
    unlock_device(sem_index);
    sent as i32
}

/// `writeTerminal`: identical shape to `write_printer`, but each character
/// is a `PRINTCHR` command to the terminal's transmit half, and status must
/// equal `CHARTRANSM`.
fn write_terminal(support_idx: usize, buf_addr: u32, len: u32) -> i32 {
    if !is_valid_address(buf_addr, len) {
        return -1;
    }
    let asid = asid_of(support_idx);
    let dev = (asid - 1) as usize;
    let base = dev_base(TERMINAL_LINE, dev);
    let sem_index = device::terminal_semaphore_index(base + TERM_TRANSM_STATUS_OFFSET);
    lock_device(sem_index);
    let mut sent = 0u32;
    while sent < len {
        let ch = unsafe { core::ptr::read_volatile((buf_addr + sent) as *const u8) };
        let cmd = PRINTCHR | ((ch as u32) << 8);
        let status = unsafe {
            bios::syscall(
                crate::memmap::SYS_DOIO,
                (base + TERM_TRANSM_COMMAND_OFFSET) as u32,
                cmd,
                sem_index as u32,
            )
        };
        if status & 0xFF != crate::memmap::CHARTRANSM {
            unlock_device(sem_index);
            return -((status & 0xFF) as i32);
        }
        sent += 1;
    }
    unlock_device(sem_index);
    sent as i32
}

/// `readTerminal`: receive characters until `\n`/`\r` or `MAXSTRLENG`,
/// NUL-terminating the buffer, matching the original's line-oriented read.
fn read_terminal(support_idx: usize, buf_addr: u32) -> i32 {
    if !is_valid_address(buf_addr, MAXSTRLENG as u32) {
        return -1;
    }
    let asid = asid_of(support_idx);
    let dev = (asid - 1) as usize;
    let base = dev_base(TERMINAL_LINE, dev);
    let sem_index = device::terminal_semaphore_index(base);
    lock_device(sem_index);
    let mut count = 0u32;
    loop {
        let cmd = RECEIVECHAR;
        let status = unsafe {
            bios::syscall(
                crate::memmap::SYS_DOIO,
                (base + TERM_RECV_COMMAND_OFFSET) as u32,
                cmd,
                sem_index as u32,
            )
        };
        if status & 0xFF != crate::memmap::CHARRECV {
            unlock_device(sem_index);
            return -((status & 0xFF) as i32);
        }
        let ch = ((status >> 8) & 0xFF) as u8;
        if ch == b'\n' || ch == b'\r' || count >= MAXSTRLENG as u32 - 1 {
            unsafe { core::ptr::write_volatile((buf_addr + count) as *mut u8, crate::memmap::EOS) };
            break;
        }
        unsafe { core::ptr::write_volatile((buf_addr + count) as *mut u8, ch) };
        count += 1;
    }
    unlock_device(sem_index);
    count as i32
}

/// `terminateUProc`: release every device mutex this ASID might still
/// hold, invalidate its swap-pool frames, release the swap-pool mutex if
/// this ASID was mid-pagefault, wake `test()`'s master-semaphore wait, and
/// terminate via `TERMPROCESS(0)`. Never returns.
pub fn terminate_u_proc(support_idx: usize) -> ! {
    let asid = asid_of(support_idx);
    for index in device_mutex_indices(asid) {
        if device_mutex_value(index) == 0 {
            unlock_device(index);
        }
    }
    crate::support::vm::release_asid(asid);
    unsafe {
        bios::syscall(SYS_VERHOGEN, crate::support::init::master_semaphore_addr(), 0, 0);
        bios::syscall(SYS_TERMPROCESS, 0, 0, 0);
    }
    unreachable!("TERMPROCESS never returns");
}
