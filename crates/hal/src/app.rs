//! The echo console: boot once, then poll-and-echo forever.

use crate::clock::configure_system_clock;
use crate::{RegisterFile, Serial, Wait};

pub const CONSOLE_BAUD: u32 = 115_200;

pub const BANNER: [&[u8]; 2] = [
    b"\r\n=== Stage 1: UART2 Bare-Metal Test ===\r\n",
    b"Type characters to echo them back.\r\n",
];

/// Clock tree, console UART, banner. The returned driver is ready for
/// [`echo_once`].
pub fn boot<R: RegisterFile, W: Wait>(mut regs: R, mut wait: W) -> Result<Serial<R, W>, W::Error> {
    configure_system_clock(&mut regs, &mut wait)?;
    let mut serial = Serial::init(regs, wait, CONSOLE_BAUD);
    for line in BANNER {
        serial.send_string(Some(line))?;
    }
    Ok(serial)
}

/// One pass of the main loop. Returns whether a byte was echoed; never blocks
/// when nothing has arrived.
pub fn echo_once<R: RegisterFile, W: Wait>(serial: &mut Serial<R, W>) -> Result<bool, W::Error> {
    if !serial.is_receive_ready() {
        return Ok(false);
    }
    let byte = serial.read_char()?;
    serial.send_char(byte)?;
    Ok(true)
}
