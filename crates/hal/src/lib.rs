//! Register-level bring-up for the STM32F401: PLL clock tree and a polling
//! USART2 driver.
//!
//! Every routine takes its hardware through a [`RegisterFile`]. On the target
//! that is [`Mmio`]; on the host it is the simulated bus from `bringup-sim`.

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod clock;
pub mod map;
pub mod regs;
pub mod serial;
pub mod wait;

#[cfg(test)]
mod testing;

pub use regs::{Mmio, RegisterFile};
pub use serial::Serial;
pub use wait::{Bounded, Forever, Wait, WaitTimeout};
