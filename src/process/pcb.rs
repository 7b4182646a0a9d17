//! PCB pool and process tree.
//!
//! Grounded on `examples/original_source/phase1/pcb.c`: a fixed
//! `MAXPROC`-sized pool with a free list (`allocPcb`/`freePcb`), a FIFO
//! ready/blocked queue primitive (`insertProcQ`/`removeProcQ`/`headProcQ`/
//! `outProcQ`), and a process tree (`insertChild`/`removeChild` — earliest
//! child — /`outChild`/`emptyChild`). Queue membership is represented with
//! [`crate::list::IndexQueue`]/[`crate::list::Link`] rather than an owning
//! `Vec`, per spec §9.

use crate::bios::ProcessorState;
use crate::list::{IndexQueue, Link, NIL};
use crate::memmap::MAXPROC;
use crate::process::state::SupportStruct;

/// A process control block. Lives in a fixed pool; `slot_used` distinguishes
/// a live entry from a free one.
#[derive(Clone, Copy)]
pub struct Pcb {
    pub slot_used: bool,
    pub pid: u32,
    pub parent: usize,
    pub child: usize,
    pub sibling: usize,
    pub state: ProcessorState,
    /// Index into the support-struct pool, if this process has one.
    pub support: Option<usize>,
    /// Accumulated CPU time, in microseconds.
    pub cpu_time: u64,
    /// Index of the semaphore this PCB is blocked on, if any.
    pub sem_addr: Option<usize>,
}

impl Pcb {
    const fn empty() -> Self {
        Pcb {
            slot_used: false,
            pid: 0,
            parent: NIL,
            child: NIL,
            sibling: NIL,
            state: ProcessorState::zeroed(),
            support: None,
            cpu_time: 0,
            sem_addr: None,
        }
    }
}

/// The PCB pool plus free list and process tree bookkeeping. One instance
/// lives inside the global nucleus lock (`sync::nucleus_lock`).
pub struct PcbPool {
    pcbs: [Pcb; MAXPROC],
    free: IndexQueue,
    next_pid: u32,
}

/// # Safety
/// `link_of` hands out `&'static mut` references into `POOL_LINKS`, a
/// process-wide static; callers must only use them while holding the
/// nucleus lock, which this module's API enforces by taking `&mut PcbPool`.
static mut POOL_LINKS: [Link; MAXPROC] = [Link::unlinked(); MAXPROC];

/// Link accessor for the PCB pool's single embedded queue link. A PCB is a
/// member of at most one queue at a time (free, ready, or some semaphore's
/// blocked queue per [`crate::sync::asl`]), so one link field suffices —
/// exactly as the original's single `p_next`/`p_prev` pair does.
pub(crate) fn link_of(i: usize) -> &'static mut Link {
    unsafe { &mut (*core::ptr::addr_of_mut!(POOL_LINKS))[i] }
}

impl PcbPool {
    pub const fn new() -> Self {
        PcbPool {
            pcbs: [Pcb::empty(); MAXPROC],
            free: IndexQueue::empty(),
            next_pid: 1,
        }
    }

    /// Must be called exactly once before any other method.
    pub fn init(&mut self) {
        self.free = IndexQueue::empty();
        for i in 0..MAXPROC {
            self.pcbs[i] = Pcb::empty();
            *link_of(i) = Link::unlinked();
        }
        for i in (0..MAXPROC).rev() {
            self.free.push_back(i, link_of);
        }
    }

    pub fn get(&self, idx: usize) -> &Pcb {
        &self.pcbs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Pcb {
        &mut self.pcbs[idx]
    }

    /// Allocate a PCB from the free list, zeroing its fields and assigning
    /// a fresh pid. Returns `None` if the pool is exhausted.
    pub fn alloc(&mut self) -> Option<usize> {
        let idx = self.free.pop_front(link_of)?;
        let pid = self.next_pid;
        self.next_pid = self.next_pid.wrapping_add(1).max(1);
        self.pcbs[idx] = Pcb { slot_used: true, pid, ..Pcb::empty() };
        Some(idx)
    }

    /// Return a PCB to the free list. The caller must have already removed
    /// it from any ready/blocked queue and the process tree.
    pub fn free(&mut self, idx: usize) {
        self.pcbs[idx] = Pcb::empty();
        self.free.push_back(idx, link_of);
    }

    // --- ready/blocked queue primitives (insertProcQ/removeProcQ/outProcQ) ---

    pub fn enqueue(&mut self, queue: &mut IndexQueue, idx: usize) {
        queue.push_back(idx, link_of);
    }

    pub fn dequeue(&mut self, queue: &mut IndexQueue) -> Option<usize> {
        queue.pop_front(link_of)
    }

    pub fn head(&self, queue: &IndexQueue) -> Option<usize> {
        queue.head()
    }

    /// Remove the PCB with the given index from `queue`, wherever in the
    /// queue it sits — the index-based analogue of `outProcQ`'s pid scan
    /// (the caller already knows the index, since pid lookup happens via
    /// [`crate::process::pid_to_index`]).
    pub fn out_of_queue(&mut self, queue: &mut IndexQueue, idx: usize) {
        queue.remove(idx, link_of);
    }

    // --- process tree primitives (insertChild/removeChild/outChild) ---

    /// Append `child` at the tail of `parent`'s sibling chain, per
    /// `insertChild`'s `list_add_tail` — the earliest-inserted child always
    /// sits at the head, so [`Self::remove_child`] returns children in
    /// insertion order.
    pub fn insert_child(&mut self, parent: usize, child: usize) {
        self.pcbs[child].parent = parent;
        self.pcbs[child].sibling = NIL;
        let first = self.pcbs[parent].child;
        if first == NIL {
            self.pcbs[parent].child = child;
        } else {
            let mut cursor = first;
            while self.pcbs[cursor].sibling != NIL {
                cursor = self.pcbs[cursor].sibling;
            }
            self.pcbs[cursor].sibling = child;
        }
    }

    /// Remove and return the earliest-inserted child of `parent`.
    pub fn remove_child(&mut self, parent: usize) -> Option<usize> {
        let first = self.pcbs[parent].child;
        if first == NIL {
            return None;
        }
        self.pcbs[parent].child = self.pcbs[first].sibling;
        self.pcbs[first].sibling = NIL;
        self.pcbs[first].parent = NIL;
        Some(first)
    }

    /// Remove an arbitrary, already-located child from its parent's
    /// sibling chain.
    pub fn out_child(&mut self, idx: usize) {
        let parent = self.pcbs[idx].parent;
        if parent == NIL {
            return;
        }
        let mut cursor = self.pcbs[parent].child;
        if cursor == idx {
            self.pcbs[parent].child = self.pcbs[idx].sibling;
        } else {
            while cursor != NIL {
                let next = self.pcbs[cursor].sibling;
                if next == idx {
                    self.pcbs[cursor].sibling = self.pcbs[idx].sibling;
                    break;
                }
                cursor = next;
            }
        }
        self.pcbs[idx].sibling = NIL;
        self.pcbs[idx].parent = NIL;
    }

    pub fn has_children(&self, idx: usize) -> bool {
        self.pcbs[idx].child != NIL
    }

    pub fn children_of(&self, idx: usize) -> ChildIter<'_> {
        ChildIter { pool: self, cursor: self.pcbs[idx].child }
    }

    pub fn pid_to_index(&self, pid: u32) -> Option<usize> {
        self.pcbs.iter().position(|p| p.slot_used && p.pid == pid)
    }
}

pub struct ChildIter<'a> {
    pool: &'a PcbPool,
    cursor: usize,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = usize;
    fn next(&mut self) -> Option<usize> {
        if self.cursor == NIL {
            return None;
        }
        let idx = self.cursor;
        self.cursor = self.pool.pcbs[idx].sibling;
        Some(idx)
    }
}

/// A support struct pool, sized at `UPROCMAX`, allocated in lockstep with
/// the PCB pool's user-process PIDs but owned separately since the nucleus
/// itself never reads support-struct contents (spec §3).
pub struct SupportPool {
    structs: [SupportStruct; crate::memmap::UPROCMAX],
    used: [bool; crate::memmap::UPROCMAX],
}

impl SupportPool {
    pub const fn new() -> Self {
        SupportPool {
            structs: [SupportStruct::empty(); crate::memmap::UPROCMAX],
            used: [false; crate::memmap::UPROCMAX],
        }
    }

    pub fn alloc(&mut self) -> Option<usize> {
        let idx = self.used.iter().position(|&u| !u)?;
        self.used[idx] = true;
        self.structs[idx] = SupportStruct::empty();
        Some(idx)
    }

    pub fn free(&mut self, idx: usize) {
        self.used[idx] = false;
    }

    pub fn get(&self, idx: usize) -> &SupportStruct {
        &self.structs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut SupportStruct {
        &mut self.structs[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_pool() -> PcbPool {
        let mut pool = PcbPool::new();
        pool.init();
        pool
    }

    #[test]
    fn alloc_free_roundtrip() {
        let mut pool = fresh_pool();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert_ne!(a, b);
        assert_ne!(pool.get(a).pid, pool.get(b).pid);
        pool.free(a);
        let c = pool.alloc().unwrap();
        assert_eq!(c, a);
    }

    #[test]
    fn pool_exhaustion() {
        let mut pool = fresh_pool();
        for _ in 0..MAXPROC {
            pool.alloc().unwrap();
        }
        assert!(pool.alloc().is_none());
    }

    #[test]
    fn child_tree_earliest_removal() {
        let mut pool = fresh_pool();
        let parent = pool.alloc().unwrap();
        let c1 = pool.alloc().unwrap();
        let c2 = pool.alloc().unwrap();
        pool.insert_child(parent, c1);
        pool.insert_child(parent, c2);
        // c1 was inserted first, so it is the earliest child.
        assert_eq!(pool.remove_child(parent), Some(c1));
        assert_eq!(pool.remove_child(parent), Some(c2));
        assert_eq!(pool.remove_child(parent), None);
    }

    #[test]
    fn out_child_arbitrary() {
        let mut pool = fresh_pool();
        let parent = pool.alloc().unwrap();
        let c1 = pool.alloc().unwrap();
        let c2 = pool.alloc().unwrap();
        let c3 = pool.alloc().unwrap();
        pool.insert_child(parent, c1);
        pool.insert_child(parent, c2);
        pool.insert_child(parent, c3);
        pool.out_child(c2);
        let mut remaining = [NIL; 2];
        for (slot, idx) in remaining.iter_mut().zip(pool.children_of(parent)) {
            *slot = idx;
        }
        assert_eq!(remaining, [c1, c3]);
    }
}
