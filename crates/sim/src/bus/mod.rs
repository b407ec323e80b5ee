use crate::peripherals::flash::{self, Flash};
use crate::peripherals::gpio::GpioPort;
use crate::peripherals::rcc::Rcc;
use crate::peripherals::usart::Usart;
use crate::snapshot::{BoardSnapshot, ClockSnapshot};
use crate::terminal::Terminal;
use crate::{BusObserver, Peripheral, SimResult, SimulationError, Violation};
use bringup_config::BoardConfig;
use bringup_hal::clock::{APB1_MAX_HZ, APB2_MAX_HZ};
use bringup_hal::map::{self, rcc};
use bringup_hal::serial::{RX_PIN, TX_PIN};
use std::collections::BTreeMap;
use std::sync::Arc;

const BLOCK_SIZE: u32 = 0x400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Rcc,
    Flash,
    GpioA,
    Usart2,
}

impl Block {
    const ALL: [(Block, u32); 4] = [
        (Block::Rcc, rcc::BASE),
        (Block::Flash, map::flash::BASE),
        (Block::GpioA, map::gpio::GPIOA_BASE),
        (Block::Usart2, map::usart::USART2_BASE),
    ];

    fn name(self) -> &'static str {
        match self {
            Block::Rcc => "RCC",
            Block::Flash => "FLASH",
            Block::GpioA => "GPIOA",
            Block::Usart2 => "USART2",
        }
    }

    fn decode(addr: u32) -> Option<(Block, u32)> {
        Self::ALL.iter().find_map(|&(block, base)| {
            let offset = addr.wrapping_sub(base);
            (offset < BLOCK_SIZE).then_some((block, offset))
        })
    }
}

/// The slice of the STM32F401 peripheral space the bring-up code touches.
/// Every word access advances all peripheral state machines by one step.
#[derive(Debug)]
pub struct SystemBus {
    pub rcc: Rcc,
    pub flash: Flash,
    pub gpioa: GpioPort,
    pub usart2: Usart,
    /// Accesses that would have bus-faulted on silicon.
    pub faults: Vec<SimulationError>,
    violations: Vec<Violation>,
    observers: Vec<Arc<dyn BusObserver>>,
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemBus {
    pub fn new() -> Self {
        Self::from_config(&BoardConfig::default(), Terminal::new())
    }

    pub fn from_config(board: &BoardConfig, terminal: Terminal) -> Self {
        Self {
            rcc: Rcc::new(board),
            flash: Flash::new(),
            gpioa: GpioPort::port_a(),
            usart2: Usart::new(board, terminal),
            faults: Vec::new(),
            violations: Vec::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BusObserver>) {
        self.observers.push(observer);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    fn peripheral(&mut self, block: Block) -> &mut dyn Peripheral {
        match block {
            Block::Rcc => &mut self.rcc,
            Block::Flash => &mut self.flash,
            Block::GpioA => &mut self.gpioa,
            Block::Usart2 => &mut self.usart2,
        }
    }

    fn clock_enabled(&self, block: Block) -> bool {
        match block {
            Block::Rcc | Block::Flash => true,
            Block::GpioA => self.rcc.ahb1_enabled(rcc::Ahb1enr::GPIOAEN),
            Block::Usart2 => self.rcc.apb1_enabled(rcc::Apb1enr::USART2EN),
        }
    }

    fn check_clock_limits(&mut self) {
        let hclk_hz = self.rcc.hclk_hz();
        let latency = self.flash.latency();
        let required = flash::required_latency(hclk_hz);
        if latency < required {
            tracing::warn!(
                "HCLK {} Hz needs {} flash wait states, {} programmed",
                hclk_hz,
                required,
                latency
            );
            self.violations.push(Violation::FlashLatencyTooLow {
                hclk_hz,
                latency,
                required,
            });
        }

        for (bus, hz, max_hz) in [
            ("APB1", self.rcc.pclk1_hz(), APB1_MAX_HZ),
            ("APB2", self.rcc.pclk2_hz(), APB2_MAX_HZ),
        ] {
            if hz > max_hz {
                tracing::warn!("{} at {} Hz exceeds {} Hz", bus, hz, max_hz);
                self.violations.push(Violation::BusOverclock { bus, hz, max_hz });
            }
        }
    }

    /// One bus access worth of elapsed time.
    fn step(&mut self) {
        self.rcc.tick();
        self.flash.tick();
        self.gpioa.tick();
        self.usart2.tick();

        if let Some(source) = self.rcc.take_switch_event() {
            tracing::info!(
                "SYSCLK switched to source {:#b}: {} Hz",
                source,
                self.rcc.sysclk_hz()
            );
            self.check_clock_limits();
        }

        self.usart2.set_kernel_clock(self.rcc.pclk1_hz());
        self.usart2.set_routing(
            self.gpioa.routes(TX_PIN, map::gpio::AF_USART2),
            self.gpioa.routes(RX_PIN, map::gpio::AF_USART2),
        );
    }

    fn access(&mut self, addr: u32) -> SimResult<Option<(Block, u32)>> {
        if addr % 4 != 0 {
            return Err(SimulationError::Unaligned(addr));
        }
        let (block, offset) = Block::decode(addr).ok_or(SimulationError::Unmapped(addr))?;
        self.step();
        if !self.clock_enabled(block) {
            tracing::warn!("{} accessed at {:#010x} with its clock gated", block.name(), addr);
            self.violations.push(Violation::ClockGated {
                peripheral: block.name(),
                addr,
            });
            return Ok(None);
        }
        Ok(Some((block, offset)))
    }

    fn drain_violations(&mut self) {
        self.violations.append(&mut self.rcc.violations);
    }

    pub fn read_word(&mut self, addr: u32) -> SimResult<u32> {
        let value = match self.access(addr)? {
            Some((block, offset)) => self.peripheral(block).read(offset),
            None => 0,
        };
        self.drain_violations();
        tracing::trace!("read  {:#010x} -> {:#010x}", addr, value);
        for observer in &self.observers {
            observer.on_read(addr, value);
        }
        Ok(value)
    }

    pub fn write_word(&mut self, addr: u32, value: u32) -> SimResult<()> {
        if let Some((block, offset)) = self.access(addr)? {
            self.peripheral(block).write(offset, value);
        }
        self.drain_violations();
        tracing::trace!("write {:#010x} <- {:#010x}", addr, value);
        for observer in &self.observers {
            observer.on_write(addr, value);
        }
        Ok(())
    }

    pub fn clocks(&self) -> ClockSnapshot {
        ClockSnapshot {
            sysclk_hz: self.rcc.sysclk_hz(),
            hclk_hz: self.rcc.hclk_hz(),
            pclk1_hz: self.rcc.pclk1_hz(),
            pclk2_hz: self.rcc.pclk2_hz(),
            pll48_hz: self.rcc.pll48_hz(),
        }
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        let mut peripherals = BTreeMap::new();
        peripherals.insert("rcc".to_string(), self.rcc.snapshot());
        peripherals.insert("flash".to_string(), self.flash.snapshot());
        peripherals.insert("gpioa".to_string(), self.gpioa.snapshot());
        peripherals.insert("usart2".to_string(), self.usart2.snapshot());
        BoardSnapshot {
            clocks: self.clocks(),
            peripherals,
            violations: self.violations.clone(),
            faults: self.faults.clone(),
        }
    }
}

/// Lets the bring-up code run against the simulator. Accesses that fault are
/// recorded in [`SystemBus::faults`]; reads then return zero.
impl bringup_hal::RegisterFile for SystemBus {
    fn read(&mut self, addr: u32) -> u32 {
        self.read_word(addr).unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            self.faults.push(e);
            0
        })
    }

    fn write(&mut self, addr: u32, value: u32) {
        if let Err(e) = self.write_word(addr, value) {
            tracing::warn!("{}", e);
            self.faults.push(e);
        }
    }
}
