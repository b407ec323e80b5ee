//! Busy-wait policies for hardware status flags.
//!
//! All waits in this crate go through [`Wait::until`], so the same call sites
//! can spin forever on the target or give up after a number of polls on the
//! host.

use core::convert::Infallible;
use core::fmt;

pub trait Wait {
    type Error;

    /// Poll `ready` until it returns `true`.
    fn until<F: FnMut() -> bool>(&mut self, ready: F) -> Result<(), Self::Error>;
}

/// Spin with no timeout. A flag that never changes hangs the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct Forever;

impl Wait for Forever {
    type Error = Infallible;

    fn until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), Infallible> {
        while !ready() {
            core::hint::spin_loop();
        }
        Ok(())
    }
}

/// Give up after `max_polls` evaluations of the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounded {
    max_polls: u32,
}

impl Bounded {
    /// A bound of zero never evaluates the predicate and always times out.
    pub const fn new(max_polls: u32) -> Self {
        Self { max_polls }
    }

    pub const fn max_polls(&self) -> u32 {
        self.max_polls
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimeout {
    pub polls: u32,
}

impl fmt::Display for WaitTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hardware flag not observed after {} polls", self.polls)
    }
}

impl core::error::Error for WaitTimeout {}

impl Wait for Bounded {
    type Error = WaitTimeout;

    fn until<F: FnMut() -> bool>(&mut self, mut ready: F) -> Result<(), WaitTimeout> {
        for _ in 0..self.max_polls {
            if ready() {
                return Ok(());
            }
        }
        Err(WaitTimeout {
            polls: self.max_polls,
        })
    }
}

/// Unwrap a result whose error type cannot be constructed.
pub fn into_ok<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}
