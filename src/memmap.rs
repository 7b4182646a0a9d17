//! Memory map and numeric constants from the simulator's hardware contract.
//!
//! Values are taken verbatim from the spec's memory map and from
//! `examples/original_source/headers/const.h`, the C header this kernel's
//! constants were checked against.

/// Page size in bytes.
pub const PAGESIZE: usize = 4096;
/// Machine word size in bytes.
pub const WORDLEN: usize = 4;

/// Maximum number of simultaneously allocated processes.
pub const MAXPROC: usize = 20;
/// Number of hardware CPUs.
pub const NCPU: usize = 8;
/// Maximum number of user processes (one per ASID, 1..=UPROCMAX).
pub const UPROCMAX: usize = 8;
/// Entries in a user process's private page table.
pub const USERPGTBLSIZE: usize = 32;
/// Frames in the swap pool (2 * UPROCMAX).
pub const SWAP_POOL_SIZE: usize = 2 * UPROCMAX;

/// Process-local timeslice, in microseconds.
pub const TIMESLICE: u32 = 5_000;
/// Pseudo-clock tick period, in microseconds.
pub const PSECOND: u32 = 100_000;
/// Max length for WRITEPRINTER/WRITETERMINAL buffers.
pub const MAXSTRLENG: usize = 128;
/// Size in bytes of a saved processor state (BIOS contract).
pub const STATESIZE: usize = 0x8C;

/// Number of device interrupt semaphores: 8 devices * 5 non-terminal lines,
/// plus 8 terminal-send + 8 terminal-receive, plus the pseudo-clock.
pub const SEMDEVLEN: usize = 49;
/// Index of the pseudo-clock semaphore within the device semaphore table.
pub const PSEUDOCLOCK_INDEX: usize = SEMDEVLEN - 1;
/// Number of device semaphores used at the support level (excludes pseudo-clock).
pub const NSUPPSEM: usize = SEMDEVLEN - 1;

/// BIOS data page base. Per-CPU saved exception state lives at
/// `BIOSDATAPAGE + i * STATESIZE`.
pub const BIOSDATAPAGE: usize = 0x0FFF_F000;
/// Pass-up vector table base. Entry i is at `PASSUPVECTOR + i * 0x10`.
pub const PASSUPVECTOR: usize = 0x0FFF_F900;

/// Bus register window.
pub const RAMBASEADDR: usize = 0x1000_0000;
pub const RAMBASESIZE: usize = 0x1000_0004;
pub const TODLOADDR: usize = 0x1000_001C;
pub const INTERVALTMR: usize = 0x1000_0020;
pub const TIMESCALEADDR: usize = 0x1000_0024;

/// Per-interrupt-line device bit words (5 words, lines 3..=7).
pub const DEV_BITMAP_BASE: usize = 0x1000_0040;

/// Base of the device register window. Line L (3..=7), device D (0..=7)
/// sits at `START_DEVREG + (L - 3) * 0x80 + D * 0x10`.
pub const START_DEVREG: usize = 0x1000_0054;
pub const DEVREGSIZE: usize = 0x10;
pub const INT_LINE_STRIDE: usize = 0x80;
pub const DEVS_PER_LINE: usize = 8;
pub const IL_FIRST_DEVICE_LINE: usize = 3;
pub const IL_TERMINAL_LINE: usize = 7;

/// Terminal device register window, used by the device-semaphore index
/// formula (§4.4): line 7 devices occupy [0x10000254, 0x10000354).
pub const TERM_DEVREG_START: usize = 0x1000_0254;
pub const TERM_DEVREG_END: usize = 0x1000_0354;
pub const TERM_RECV_STATUS_OFFSET: usize = 0x0;
pub const TERM_RECV_COMMAND_OFFSET: usize = 0x4;
pub const TERM_TRANSM_STATUS_OFFSET: usize = 0x8;
pub const TERM_TRANSM_COMMAND_OFFSET: usize = 0xC;

/// Interrupt Routing Table: 48 entries of 4 bytes each.
pub const IRT_START: usize = 0x1000_0300;
pub const IRT_NUM_ENTRY: usize = 48;
pub const IRT_RP_BIT_ON: u32 = 1 << 28;

/// Task Priority Register.
pub const TPR: usize = 0x1000_0408;

/// RAM base for general allocation.
pub const RAMSTART: usize = 0x2000_0000;
/// Swap pool begins after the OS's 32 kernel frames and NCPU per-CPU stack
/// frames.
pub const SWAP_POOL_STARTADDR: usize = RAMSTART + (32 + NCPU) * PAGESIZE;

/// User virtual address space.
pub const KUSEG: usize = 0x8000_0000;
pub const UPROCSTARTADDR: usize = 0x8000_00B0;
pub const USERSTACKTOP: usize = 0xC000_0000;
/// Stack page VPN, and its fixed page-table index (last entry).
pub const USTACK_VPN: usize = 0xBFFFF;
pub const USTACK_PAGETBL_INDEX: usize = USERPGTBLSIZE - 1;

/// Device status / command codes.
pub const DEV_READY: u32 = 1;
pub const DEV_ACK: u32 = 1;
pub const CHARRECV: u32 = 5;
pub const CHARTRANSM: u32 = 5;
pub const FLASHREAD: u32 = 2;
pub const FLASHWRITE: u32 = 3;
pub const PRINTCHR: u32 = 2;
pub const RECEIVECHAR: u32 = 2;

/// EntryLO flag bits.
pub const VALIDON: u32 = 0x0000_0200;
pub const DIRTYON: u32 = 0x0000_0400;

/// EntryHI helpers.
pub const VPNSHIFT: u32 = 12;
pub const ASIDSHIFT: u32 = 6;
pub const GETPAGENO: u32 = 0x3FFF_F000;

/// NUL terminator for support-level string buffers.
pub const EOS: u8 = 0;

/// Translate a (line, device) pair into the base address of its register
/// block.
pub const fn dev_base(line: usize, dev: usize) -> usize {
    START_DEVREG + (line - IL_FIRST_DEVICE_LINE) * INT_LINE_STRIDE + dev * DEVREGSIZE
}

/// Debug UART for kernel logging (§10.2 of SPEC_FULL.md) — ambient, not
/// part of the simulated device window above.
pub const DEBUG_UART_BASE: usize = 0x1000_2000;

/// Interrupt line numbers, as decoded from `CAUSE` by `getLineNo`.
pub const IL_CPUTIMER: usize = 1;
pub const IL_INTERVAL_TIMER: usize = 2;
pub const IL_DISK: usize = 3;
pub const IL_FLASH: usize = 4;
pub const IL_ETHERNET: usize = 5;
pub const IL_PRINTER: usize = 6;
pub const IL_TERMINAL: usize = 7;

/// `CAUSE` exception codes this kernel dispatches on.
pub const EXC_INTERRUPT: u32 = 0;
pub const EXC_SYSCALL: u32 = 8;
pub const EXC_BREAKPOINT: u32 = 9;
/// TLB-invalid exception codes (§4.9): load-miss and store-miss are
/// reported distinctly, both routed to the same page-fault handler.
pub const EXC_TLB_INVALID_LOAD: u32 = 25;
pub const EXC_TLB_INVALID_STORE: u32 = 26;

/// Mask/shift to extract the exception code from `CAUSE`.
pub const CAUSE_EXCCODE_SHIFT: u32 = 2;
pub const CAUSE_EXCCODE_MASK: u32 = 0x1F;
pub const CAUSE_IP_MASK: u32 = 0x0000_FF00;

/// Nucleus syscall numbers (negative codes, argument in `a0`).
pub const SYS_CREATEPROCESS: i32 = -1;
pub const SYS_TERMPROCESS: i32 = -2;
pub const SYS_PASSEREN: i32 = -3;
pub const SYS_VERHOGEN: i32 = -4;
pub const SYS_DOIO: i32 = -5;
pub const SYS_GETTIME: i32 = -6;
pub const SYS_CLOCKWAIT: i32 = -7;
pub const SYS_GETSUPPORTPTR: i32 = -8;
pub const SYS_GETPROCESSID: i32 = -9;
pub const SYS_YIELD: i32 = -10;

/// Support-level syscall numbers (positive codes, argument in `a0`).
pub const SUPP_TERMINATE: i32 = 2;
pub const SUPP_WRITEPRINTER: i32 = 3;
pub const SUPP_WRITETERMINAL: i32 = 4;
pub const SUPP_READTERMINAL: i32 = 5;
