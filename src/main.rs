//! Kernel entry point.
//!
//! The teacher's `_start` is called by a multiboot2 bootloader into the
//! `atomic_os` lib crate; this nucleus is instead entered by `riscv-rt`'s
//! runtime, which brings up CPU 0 in machine mode with a valid stack before
//! handing off to `#[entry]`. All further bring-up (serial, the global
//! nucleus lock, the pass-up vector, secondary CPUs) happens in
//! `nucleus::init`.

#![no_std]
#![no_main]

use riscv_rt::entry;

#[entry]
fn start() -> ! {
    riscv_nucleus::nucleus::init()
}
