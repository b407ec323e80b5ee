#![no_std]
#![no_main]

use bringup_hal::wait::into_ok;
use bringup_hal::{app, Forever, Mmio};
use cortex_m_rt::entry;
use panic_halt as _;

#[entry]
fn main() -> ! {
    // Every driver below does plain read-modify-write on shared registers.
    cortex_m::interrupt::disable();

    // SAFETY: single call at reset, interrupts masked, nothing else owns the
    // RCC/FLASH/GPIOA/USART2 blocks.
    let regs = unsafe { Mmio::new() };
    let mut console = into_ok(app::boot(regs, Forever));

    loop {
        into_ok(app::echo_once(&mut console));
    }
}
