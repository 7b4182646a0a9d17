//! Writes a greeting to this U-proc's private terminal, then exits.

#![no_std]
#![no_main]

uruntime::uentry!(main);

fn main() {
    uruntime::write_terminal(b"Hello from a U-proc!\n");
}
