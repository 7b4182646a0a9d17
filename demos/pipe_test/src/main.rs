//! Echoes terminal input back to the same terminal a fixed number of
//! times, exercising `READTERMINAL`/`WRITETERMINAL` back to back the way
//! the teacher's `pipe_test` demo chains reads and writes across a pipe.

#![no_std]
#![no_main]

uruntime::uentry!(main);

fn main() {
    let mut buf = [0u8; 128];
    for _ in 0..4 {
        let n = uruntime::read_terminal(&mut buf);
        if n < 0 {
            break;
        }
        uruntime::write_terminal(&buf[..n as usize]);
        uruntime::write_terminal(b"\n");
    }
}
