//! Debug UART logging.
//!
//! Kept near-verbatim from the teacher's `serial.rs`: a `core::fmt::Write`
//! wrapper behind a `lazy_static!` + `spin::Mutex`, with `log_info!`/
//! `log_warn!`/`log_error!` macros prefixing a level tag. The teacher talks
//! to a 16550 UART over x86 I/O ports; this one talks to the same 16550
//! register layout but memory-mapped, via the `volatile` crate, since the
//! simulator has no I/O port space.

use lazy_static::lazy_static;
use spin::Mutex;
use volatile::Volatile;

use crate::memmap::DEBUG_UART_BASE;

pub struct SerialPort {
    base: usize,
}

unsafe impl Send for SerialPort {}

impl SerialPort {
    pub const unsafe fn new(base: usize) -> SerialPort {
        SerialPort { base }
    }

    fn reg(&self, offset: usize) -> &'static mut Volatile<u8> {
        unsafe { &mut *((self.base + offset) as *mut Volatile<u8>) }
    }

    pub fn init(&mut self) {
        self.reg(1).write(0x00);
        self.reg(3).write(0x80);
        self.reg(0).write(0x03);
        self.reg(1).write(0x00);
        self.reg(3).write(0x03);
        self.reg(2).write(0xC7);
        self.reg(4).write(0x0B);
        self.reg(1).write(0x01);
    }

    fn wait_for_tx_empty(&mut self) {
        while (self.reg(5).read() & 0x20) == 0 {
            core::hint::spin_loop();
        }
    }

    pub fn send(&mut self, data: u8) {
        self.wait_for_tx_empty();
        self.reg(0).write(data);
    }
}

impl core::fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for byte in s.bytes() {
            self.send(byte);
        }
        Ok(())
    }
}

lazy_static! {
    pub static ref SERIAL1: Mutex<SerialPort> = {
        let mut serial_port = unsafe { SerialPort::new(DEBUG_UART_BASE) };
        serial_port.init();
        Mutex::new(serial_port)
    };
}

#[doc(hidden)]
pub fn _print(args: ::core::fmt::Arguments) {
    use core::fmt::Write;
    SERIAL1.lock().write_fmt(args).expect("printing to serial failed");
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("[INFO] "));
        $crate::serial::_print(format_args!($($arg)*));
        $crate::serial::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("[WARN] "));
        $crate::serial::_print(format_args!($($arg)*));
        $crate::serial::_print(format_args!("\n"));
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::serial::_print(format_args!("[ERROR] "));
        $crate::serial::_print(format_args!($($arg)*));
        $crate::serial::_print(format_args!("\n"));
    };
}

pub fn init() {
    let _ = SERIAL1.lock();
}
