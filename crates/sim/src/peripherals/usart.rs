use super::Transition;
use crate::terminal::Terminal;
use bringup_config::BoardConfig;
use bringup_hal::map::usart::{self, Cr1, Sr};

const SR_RESET: Sr = Sr::TXE.union(Sr::TC);
/// Flags software clears by writing zero.
const SR_RC_W0: Sr = Sr::RXNE.union(Sr::TC);
/// Flags cleared by an SR read followed by a DR read.
const SR_ERRORS: Sr = Sr::PE
    .union(Sr::FE)
    .union(Sr::NF)
    .union(Sr::ORE)
    .union(Sr::IDLE);
/// Receiver tolerance to a baud rate mismatch, in percent.
const BAUD_TOLERANCE_PCT: u64 = 2;

/// STM32F4 USART wired to a host [`Terminal`].
#[derive(Debug, serde::Serialize)]
pub struct Usart {
    sr: u32,
    rdr: u32,
    brr: u32,
    cr1: u32,
    cr2: u32,
    cr3: u32,
    gtpr: u32,
    kernel_clock_hz: u32,
    tx_routed: bool,
    rx_routed: bool,
    tx_busy: Transition,
    line_baud: Option<u32>,
    framing_errors: u64,
    dropped_tx: u64,
    #[serde(skip)]
    tx_busy_polls: u32,
    #[serde(skip)]
    status_read: bool,
    #[serde(skip)]
    terminal: Terminal,
}

impl Default for Usart {
    fn default() -> Self {
        Self::new(&BoardConfig::default(), Terminal::new())
    }
}

impl Usart {
    pub fn new(board: &BoardConfig, terminal: Terminal) -> Self {
        Self {
            sr: SR_RESET.bits(),
            rdr: 0,
            brr: 0,
            cr1: 0,
            cr2: 0,
            cr3: 0,
            gtpr: 0,
            kernel_clock_hz: 0,
            tx_routed: false,
            rx_routed: false,
            tx_busy: Transition::Idle,
            line_baud: board.line_baud,
            framing_errors: 0,
            dropped_tx: 0,
            tx_busy_polls: board.tx_busy_polls,
            status_read: false,
            terminal,
        }
    }

    fn sr_flags(&self) -> Sr {
        Sr::from_bits_retain(self.sr)
    }

    fn cr1_flags(&self) -> Cr1 {
        Cr1::from_bits_retain(self.cr1)
    }

    /// Bus clock feeding the baud generator (PCLK1 for USART2).
    pub fn set_kernel_clock(&mut self, hz: u32) {
        self.kernel_clock_hz = hz;
    }

    /// Whether the TX and RX pins are connected to this USART.
    pub fn set_routing(&mut self, tx: bool, rx: bool) {
        self.tx_routed = tx;
        self.rx_routed = rx;
    }

    /// Baud rate the current BRR produces with 16x oversampling.
    pub fn effective_baud(&self) -> u32 {
        match self.brr {
            0 => 0,
            brr => self.kernel_clock_hz / brr,
        }
    }

    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    pub fn dropped_tx(&self) -> u64 {
        self.dropped_tx
    }

    fn baud_matches_line(&self) -> bool {
        let Some(line) = self.line_baud else {
            return true;
        };
        let actual = u64::from(self.effective_baud());
        let line = u64::from(line);
        actual.abs_diff(line) * 100 <= line * BAUD_TOLERANCE_PCT
    }

    fn transmit(&mut self, byte: u8) {
        if !self.tx_routed {
            self.dropped_tx += 1;
            tracing::warn!("USART2: TX pin not routed, byte {:#04x} lost", byte);
            return;
        }
        if !self.baud_matches_line() {
            self.framing_errors += 1;
            tracing::warn!(
                "USART2: sending at {} baud, terminal expects {:?}",
                self.effective_baud(),
                self.line_baud
            );
            return;
        }
        self.terminal.push_output(byte);
    }

    fn receiver_running(&self) -> bool {
        self.cr1_flags().contains(Cr1::UE | Cr1::RE) && self.rx_routed
    }

    fn read_dr(&mut self) -> u32 {
        let mut sr = self.sr_flags();
        sr.remove(Sr::RXNE);
        if self.status_read {
            sr.remove(SR_ERRORS);
        }
        self.sr = sr.bits();
        self.status_read = false;
        self.rdr
    }

    fn write_dr(&mut self, value: u32) {
        if !self.cr1_flags().contains(Cr1::UE | Cr1::TE) {
            tracing::debug!("USART2: DR write with transmitter disabled, ignored");
            return;
        }
        let mut sr = self.sr_flags();
        sr.remove(Sr::TXE | Sr::TC);
        self.sr = sr.bits();
        self.tx_busy = Transition::After(self.tx_busy_polls);
        self.transmit((value & usart::DATA_MASK) as u8);
    }

    fn write_sr(&mut self, value: u32) {
        let mut sr = self.sr_flags();
        sr.remove(SR_RC_W0.difference(Sr::from_bits_retain(value)));
        self.sr = sr.bits();
    }
}

impl crate::Peripheral for Usart {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            usart::SR => {
                self.status_read = true;
                self.sr
            }
            usart::DR => self.read_dr(),
            usart::BRR => self.brr,
            usart::CR1 => self.cr1,
            usart::CR2 => self.cr2,
            usart::CR3 => self.cr3,
            usart::GTPR => self.gtpr,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        match offset {
            usart::SR => self.write_sr(value),
            usart::DR => self.write_dr(value),
            usart::BRR => self.brr = value & 0xFFFF,
            usart::CR1 => self.cr1 = value & 0xFFFF,
            usart::CR2 => self.cr2 = value & 0x7F7F,
            usart::CR3 => self.cr3 = value & 0x0FFF,
            usart::GTPR => self.gtpr = value & 0xFFFF,
            _ => {}
        }
    }

    fn tick(&mut self) {
        if self.tx_busy.tick() {
            let mut sr = self.sr_flags();
            sr.insert(Sr::TXE | Sr::TC);
            self.sr = sr.bits();
        }

        if !self.receiver_running() || self.sr_flags().contains(Sr::RXNE) {
            return;
        }
        let Some(byte) = self.terminal.pop_input() else {
            return;
        };
        let mut sr = self.sr_flags();
        if self.baud_matches_line() {
            self.rdr = u32::from(byte);
            sr.insert(Sr::RXNE);
        } else {
            self.framing_errors += 1;
            sr.insert(Sr::FE);
            tracing::warn!("USART2: framing error on received byte {:#04x}", byte);
        }
        self.sr = sr.bits();
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn enabled(terminal: &Terminal, brr: u32) -> Usart {
        let mut dev = Usart::new(&BoardConfig::default(), terminal.clone());
        dev.set_kernel_clock(42_000_000);
        dev.set_routing(true, true);
        dev.write(usart::BRR, brr);
        dev.write(usart::CR1, (Cr1::UE | Cr1::TE | Cr1::RE).bits());
        dev
    }

    #[test]
    fn test_reset_state() {
        let mut dev = Usart::default();
        assert_eq!(dev.read(usart::SR), 0xC0);
        assert_eq!(dev.effective_baud(), 0);
    }

    #[test]
    fn test_transmit_busy_then_ready() {
        let terminal = Terminal::new();
        let mut dev = enabled(&terminal, 365);
        dev.write(usart::DR, u32::from(b'A'));
        assert_eq!(dev.read(usart::SR) & Sr::TXE.bits(), 0);
        dev.tick();
        assert_ne!(dev.read(usart::SR) & Sr::TXE.bits(), 0);
        assert_eq!(terminal.received(), b"A");
    }

    #[test]
    fn test_write_ignored_when_disabled() {
        let terminal = Terminal::new();
        let mut dev = Usart::new(&BoardConfig::default(), terminal.clone());
        dev.write(usart::DR, u32::from(b'A'));
        assert!(terminal.received().is_empty());
        assert_eq!(dev.read(usart::SR), 0xC0);
    }

    #[test]
    fn test_receive_and_clear_on_read() {
        let terminal = Terminal::new();
        let mut dev = enabled(&terminal, 365);
        terminal.type_bytes(b"xy");
        dev.tick();
        assert_ne!(dev.read(usart::SR) & Sr::RXNE.bits(), 0);
        // RXNE holds the next byte back until DR is read.
        dev.tick();
        assert_eq!(terminal.pending_input(), 1);
        assert_eq!(dev.read(usart::DR), u32::from(b'x'));
        assert_eq!(dev.read(usart::SR) & Sr::RXNE.bits(), 0);
    }

    #[test]
    fn test_unrouted_tx_is_dropped() {
        let terminal = Terminal::new();
        let mut dev = enabled(&terminal, 365);
        dev.set_routing(false, true);
        dev.write(usart::DR, u32::from(b'A'));
        assert!(terminal.received().is_empty());
        assert_eq!(dev.dropped_tx(), 1);
    }

    #[test]
    fn test_baud_mismatch_is_a_framing_error() {
        let terminal = Terminal::new();
        // 42 MHz / 4375 = 9600 baud against a 115200 terminal.
        let mut dev = enabled(&terminal, 4375);
        dev.write(usart::DR, u32::from(b'A'));
        terminal.type_bytes(b"z");
        dev.tick();
        assert!(terminal.received().is_empty());
        assert_eq!(dev.framing_errors(), 2);
        let sr = dev.read(usart::SR);
        assert_ne!(sr & Sr::FE.bits(), 0);
        assert_eq!(sr & Sr::RXNE.bits(), 0);
        dev.read(usart::DR);
        assert_eq!(dev.read(usart::SR) & Sr::FE.bits(), 0);
    }

    #[test]
    fn test_tc_cleared_by_writing_zero() {
        let mut dev = Usart::default();
        dev.write(usart::SR, !Sr::TC.bits());
        assert_eq!(dev.read(usart::SR), Sr::TXE.bits());
    }
}
