pub mod board;
pub mod bus;
pub mod metrics;
pub mod peripherals;
pub mod snapshot;
pub mod terminal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
pub enum SimulationError {
    #[error("Unmapped bus access at {0:#010x}")]
    Unmapped(u32),
    #[error("Unaligned word access at {0:#010x}")]
    Unaligned(u32),
}

pub type SimResult<T> = Result<T, SimulationError>;

/// A hardware rule the firmware broke. Silicon would not report these, it
/// would just misbehave; the simulator records them so tests can.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// PLLCFGR written while RCC_CR.PLLON was set.
    PllReconfiguredWhileEnabled { value: u32 },
    /// PLLON cleared while the PLL drives SYSCLK. Hardware ignores the write.
    PllStopWhileSystemClock,
    /// HCLK switched above what the programmed flash wait states allow.
    FlashLatencyTooLow {
        hclk_hz: u32,
        latency: u32,
        required: u32,
    },
    BusOverclock {
        bus: &'static str,
        hz: u32,
        max_hz: u32,
    },
    /// Register access to a peripheral whose RCC clock enable bit is clear.
    ClockGated { peripheral: &'static str, addr: u32 },
}

/// Trait representing a memory-mapped peripheral.
pub trait Peripheral: std::fmt::Debug + Send {
    fn read(&mut self, offset: u32) -> u32;
    fn write(&mut self, offset: u32, value: u32);
    /// Advance internal state by one bus access.
    fn tick(&mut self) {}
    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}

/// Trait for observing bus traffic.
pub trait BusObserver: std::fmt::Debug + Send + Sync {
    fn on_read(&self, _addr: u32, _value: u32) {}
    fn on_write(&self, _addr: u32, _value: u32) {}
}
