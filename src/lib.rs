#![no_std]

//! A small multi-processor RISC-V nucleus: process/semaphore management,
//! exception and syscall dispatch, a per-CPU round-robin scheduler, and a
//! support level providing U-process instantiation, device I/O syscalls,
//! and demand-paged virtual memory backed by a swap pool.

pub mod bios;
pub mod device;
pub mod list;
pub mod memmap;
pub mod nucleus;
pub mod process;
pub mod sched;
pub mod serial;
pub mod support;
pub mod sync;
pub mod trap;

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log_error!("{}", info);
    bios::halt();
}
