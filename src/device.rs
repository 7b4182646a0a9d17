//! Device-semaphore index formula and device register access, shared by
//! the nucleus's `DOIO`/interrupt handling and the support level's
//! per-device mutexes.
//!
//! Grounded on `examples/original_source/phase2/interrupts.c`'s
//! `getDeviceSemaphoreIndex`: non-terminal devices map line/device pairs to
//! `(line - 3) * 8 + device`; terminal devices (line 7) occupy a dedicated
//! register window `[0x10000254, 0x10000354)` and split into a receive
//! half (`32 + device*2`) and a transmit half (`32 + device*2 + 1`) based
//! on which half of the register block the faulting address falls in. An
//! address outside both windows is a malformed device command and panics,
//! matching the original's `PANIC()` call rather than returning a bogus
//! index (§10.6 supplemented behavior).

use crate::memmap::{
    DEVS_PER_LINE, IL_FIRST_DEVICE_LINE, IL_TERMINAL_LINE, TERM_DEVREG_END, TERM_DEVREG_START,
};

/// Resolve a (line, device) pair to its index in the device semaphore
/// table (and `DeviceSemaphores` array).
pub fn semaphore_index(line: usize, device: usize) -> usize {
    if line == IL_TERMINAL_LINE {
        panic!("semaphore_index: terminal line requires transmit/receive direction, use terminal_semaphore_index");
    }
    (line - IL_FIRST_DEVICE_LINE) * DEVS_PER_LINE + device
}

/// Resolve a terminal device's register address to its semaphore index,
/// distinguishing receive (even slot) from transmit (odd slot).
pub fn terminal_semaphore_index(reg_addr: usize) -> usize {
    if reg_addr < TERM_DEVREG_START || reg_addr >= TERM_DEVREG_END {
        panic!("terminal_semaphore_index: address {:#x} outside terminal register window", reg_addr);
    }
    let offset = reg_addr - TERM_DEVREG_START;
    let dev = offset / 0x10;
    let within = offset % 0x10;
    let base = (IL_TERMINAL_LINE - IL_FIRST_DEVICE_LINE) * DEVS_PER_LINE;
    if within < 0x8 {
        base + dev * 2
    } else {
        base + dev * 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_terminal_formula() {
        assert_eq!(semaphore_index(3, 0), 0);
        assert_eq!(semaphore_index(3, 7), 7);
        assert_eq!(semaphore_index(4, 0), 8);
        assert_eq!(semaphore_index(6, 7), 31);
    }

    #[test]
    fn terminal_receive_and_transmit() {
        let base = terminal_semaphore_index(TERM_DEVREG_START);
        assert_eq!(base, 32);
        assert_eq!(terminal_semaphore_index(TERM_DEVREG_START + 0x4), 32);
        assert_eq!(terminal_semaphore_index(TERM_DEVREG_START + 0x8), 33);
        assert_eq!(terminal_semaphore_index(TERM_DEVREG_START + 0xC), 33);
        assert_eq!(terminal_semaphore_index(TERM_DEVREG_START + 0x10), 34);
    }

    #[test]
    #[should_panic]
    fn out_of_range_panics() {
        terminal_semaphore_index(TERM_DEVREG_END);
    }
}
