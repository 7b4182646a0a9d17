//! Support level: the pass-up targets nucleus processes run to, one layer
//! above the nucleus itself — U-proc instantiation, support-level syscalls,
//! and the swap-pool/TLB page-fault manager.

pub mod init;
pub mod syscall;
pub mod vm;
