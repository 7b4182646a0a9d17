//! Active Semaphore List.
//!
//! Grounded on `examples/original_source/phase1/asl.c`: a fixed pool of
//! SEMD descriptors, an active list holding one descriptor per semaphore
//! currently blocking at least one process, and a free list for descriptors
//! not in use. `findSemd` looks a descriptor up by semaphore key (the
//! original compares pointer addresses for equality; here the key is the
//! `u32` "semaphore address" a syscall argument carries — see
//! `trap::syscall::passeren`/`verhogen`, which dereference that same value
//! as the semaphore's integer count). `insertSem`'s ad-hoc singly-linked
//! tail-append (an Open Question in spec §9) is kept as an explicit FIFO
//! append on the active list.

use crate::list::{IndexQueue, Link, NIL};
use crate::memmap::MAXPROC;
use crate::process::pcb::link_of as pcb_link_of;

#[derive(Clone, Copy)]
struct Semd {
    in_use: bool,
    key: u32,
    blocked: IndexQueue,
}

impl Semd {
    const fn empty() -> Self {
        Semd { in_use: false, key: 0, blocked: IndexQueue::empty() }
    }
}

static mut SEMD_LINKS: [Link; MAXPROC] = [Link::unlinked(); MAXPROC];

fn semd_link_of(i: usize) -> &'static mut Link {
    unsafe { &mut (*core::ptr::addr_of_mut!(SEMD_LINKS))[i] }
}

pub struct Asl {
    semds: [Semd; MAXPROC],
    free: IndexQueue,
    /// Descriptors currently blocking at least one process, in the order
    /// they were first allocated (tail-append, per the Open Question
    /// decision recorded in DESIGN.md).
    active: IndexQueue,
}

impl Asl {
    pub const fn new() -> Self {
        Asl {
            semds: [Semd::empty(); MAXPROC],
            free: IndexQueue::empty(),
            active: IndexQueue::empty(),
        }
    }

    pub fn init(&mut self) {
        self.free = IndexQueue::empty();
        self.active = IndexQueue::empty();
        for i in 0..MAXPROC {
            self.semds[i] = Semd::empty();
            *semd_link_of(i) = Link::unlinked();
        }
        for i in (0..MAXPROC).rev() {
            self.free.push_back(i, semd_link_of);
        }
    }

    fn find(&self, key: u32) -> Option<usize> {
        let mut cursor = self.active.head();
        while let Some(idx) = cursor {
            if self.semds[idx].key == key {
                return Some(idx);
            }
            cursor = {
                let next = semd_link_of(idx).next;
                if next == NIL { None } else { Some(next) }
            };
        }
        None
    }

    /// Block `pcb` on the semaphore identified by `key`, allocating a new
    /// descriptor if none exists yet. Returns `false` if the descriptor
    /// pool is exhausted (per spec §7/§9, this is unreachable under
    /// `MAXPROC` PCBs and is treated as fatal by the caller).
    pub fn insert_blocked(&mut self, key: u32, pcb: usize) -> bool {
        let idx = match self.find(key) {
            Some(idx) => idx,
            None => {
                let idx = match self.free.pop_front(semd_link_of) {
                    Some(idx) => idx,
                    None => return false,
                };
                self.semds[idx] = Semd { in_use: true, key, blocked: IndexQueue::empty() };
                self.active.push_back(idx, semd_link_of);
                idx
            }
        };
        self.semds[idx].blocked.push_back(pcb, pcb_link_of);
        true
    }

    /// Pop the head of the blocked queue for `key`. Recycles the
    /// descriptor back to the free list once its queue empties.
    pub fn remove_blocked(&mut self, key: u32) -> Option<usize> {
        let idx = self.find(key)?;
        let pcb = self.semds[idx].blocked.pop_front(pcb_link_of)?;
        if self.semds[idx].blocked.is_empty() {
            self.active.remove(idx, semd_link_of);
            self.semds[idx] = Semd::empty();
            self.free.push_back(idx, semd_link_of);
        }
        Some(pcb)
    }

    pub fn head_blocked(&self, key: u32) -> Option<usize> {
        let idx = self.find(key)?;
        self.semds[idx].blocked.head()
    }

    /// Remove `pcb` from whichever semaphore's blocked queue currently
    /// holds it (`outBlockedPID`'s full scan). Returns the key it was
    /// blocked on, if found.
    pub fn out_blocked(&mut self, pcb: usize) -> Option<u32> {
        let mut cursor = self.active.head();
        while let Some(idx) = cursor {
            let next = {
                let next = semd_link_of(idx).next;
                if next == NIL { None } else { Some(next) }
            };
            // A PCB embedded in a blocked queue carries no back-pointer to
            // its semaphore, so locate it by walking this descriptor's
            // queue directly.
            if self.contains(idx, pcb) {
                self.semds[idx].blocked.remove(pcb, pcb_link_of);
                let key = self.semds[idx].key;
                if self.semds[idx].blocked.is_empty() {
                    self.active.remove(idx, semd_link_of);
                    self.semds[idx] = Semd::empty();
                    self.free.push_back(idx, semd_link_of);
                }
                return Some(key);
            }
            cursor = next;
        }
        None
    }

    fn contains(&self, semd_idx: usize, pcb: usize) -> bool {
        let mut cursor = self.semds[semd_idx].blocked.head();
        while let Some(idx) = cursor {
            if idx == pcb {
                return true;
            }
            cursor = {
                let next = pcb_link_of(idx).next;
                if next == NIL { None } else { Some(next) }
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Asl {
        let mut asl = Asl::new();
        asl.init();
        asl
    }

    #[test]
    fn block_and_wake_fifo() {
        let mut asl = fresh();
        assert!(asl.insert_blocked(100, 0));
        assert!(asl.insert_blocked(100, 1));
        assert!(asl.insert_blocked(100, 2));
        assert_eq!(asl.head_blocked(100), Some(0));
        assert_eq!(asl.remove_blocked(100), Some(0));
        assert_eq!(asl.remove_blocked(100), Some(1));
        assert_eq!(asl.remove_blocked(100), Some(2));
        assert_eq!(asl.remove_blocked(100), None);
    }

    #[test]
    fn descriptor_recycled_after_drain() {
        let mut asl = fresh();
        asl.insert_blocked(7, 0);
        asl.remove_blocked(7);
        // Different key reuses freed descriptor slots without collision.
        assert!(asl.insert_blocked(9, 1));
        assert_eq!(asl.head_blocked(9), Some(1));
        assert_eq!(asl.head_blocked(7), None);
    }

    #[test]
    fn out_blocked_arbitrary_pcb() {
        let mut asl = fresh();
        asl.insert_blocked(5, 0);
        asl.insert_blocked(5, 1);
        asl.insert_blocked(5, 2);
        assert_eq!(asl.out_blocked(1), Some(5));
        assert_eq!(asl.remove_blocked(5), Some(0));
        assert_eq!(asl.remove_blocked(5), Some(2));
    }
}
