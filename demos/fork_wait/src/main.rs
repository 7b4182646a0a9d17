//! Touches a range of private data pages well past the first one, forcing
//! several TLB misses and the swap-pool page-in path, then reports success
//! on the terminal. Stands in for the teacher's `fork_wait` demo, which
//! exercised process lifecycle rather than paging; this nucleus has no
//! user-visible fork, so the closest analogous stress is demand paging.

#![no_std]
#![no_main]

uruntime::uentry!(main);

const PAGE: usize = 4096;
const TOUCHED_PAGES: usize = 6;

fn main() {
    let base = 0x8000_0000usize;
    let mut sum: u32 = 0;
    for page in 0..TOUCHED_PAGES {
        let addr = (base + page * PAGE) as *const u32;
        sum = sum.wrapping_add(unsafe { core::ptr::read_volatile(addr) });
    }
    let _ = sum;
    uruntime::write_terminal(b"fork_wait: paging exercise complete\n");
}
