//! Polling driver for USART2 on PA2 (TX) / PA3 (RX).

use crate::clock;
use crate::map::{gpio, rcc, usart};
use crate::{RegisterFile, Wait};

pub const TX_PIN: u32 = 2;
pub const RX_PIN: u32 = 3;

const SR: u32 = usart::USART2_BASE + usart::SR;
const DR: u32 = usart::USART2_BASE + usart::DR;
const BRR: u32 = usart::USART2_BASE + usart::BRR;
const CR1: u32 = usart::USART2_BASE + usart::CR1;
const CR2: u32 = usart::USART2_BASE + usart::CR2;
const CR3: u32 = usart::USART2_BASE + usart::CR3;

/// BRR value for 16x oversampling, rounded half-up: `bus_clock / baud`.
///
/// Panics if `baud` is zero.
pub const fn compute_divisor(bus_clock_hz: u32, baud: u32) -> u32 {
    (bus_clock_hz + baud / 2) / baud
}

/// USART2 after [`Serial::init`]: 8 data bits, no parity, 1 stop bit, no flow
/// control, receiver and transmitter enabled.
///
/// The baud divisor assumes APB1 already runs at [`clock::PCLK1_HZ`].
pub struct Serial<R, W> {
    regs: R,
    wait: W,
}

impl<R: RegisterFile, W: Wait> Serial<R, W> {
    /// Clock-enable GPIOA and USART2, hand PA2/PA3 to AF7 as push-pull pins
    /// and start the USART at `baud`.
    ///
    /// BRR holds 16 bits, so `baud` must be at least `PCLK1_HZ / 65535`
    /// (641 at 42 MHz); slower rates are truncated into a wrong divisor.
    ///
    /// # Panics
    ///
    /// Panics if `baud` is zero.
    pub fn init(mut regs: R, wait: W, baud: u32) -> Self {
        regs.set_bits(rcc::BASE + rcc::AHB1ENR, rcc::Ahb1enr::GPIOAEN.bits());
        regs.set_bits(rcc::BASE + rcc::APB1ENR, rcc::Apb1enr::USART2EN.bits());

        let port = gpio::GPIOA_BASE;
        let both2 = gpio::mask2(TX_PIN) | gpio::mask2(RX_PIN);
        regs.modify(port + gpio::MODER, |v| {
            (v & !both2)
                | (gpio::MODE_ALTERNATE << (TX_PIN * 2))
                | (gpio::MODE_ALTERNATE << (RX_PIN * 2))
        });
        regs.modify(port + gpio::AFRL, |v| {
            (v & !(gpio::mask_af(TX_PIN) | gpio::mask_af(RX_PIN)))
                | (gpio::AF_USART2 << (TX_PIN * 4))
                | (gpio::AF_USART2 << (RX_PIN * 4))
        });
        regs.set_bits(
            port + gpio::OSPEEDR,
            (gpio::SPEED_VERY_HIGH << (TX_PIN * 2)) | (gpio::SPEED_VERY_HIGH << (RX_PIN * 2)),
        );
        regs.clear_bits(port + gpio::OTYPER, (1 << TX_PIN) | (1 << RX_PIN));
        // Pull-up keeps RX at the idle (mark) level when nothing is attached.
        regs.modify(port + gpio::PUPDR, |v| {
            (v & !both2) | (gpio::PULL_UP << (RX_PIN * 2))
        });

        regs.clear_bits(CR1, usart::Cr1::UE.bits());
        regs.write(CR1, 0);
        regs.write(CR2, 0);
        regs.write(CR3, 0);

        regs.write(BRR, compute_divisor(clock::PCLK1_HZ, baud));

        regs.set_bits(CR1, (usart::Cr1::TE | usart::Cr1::RE).bits());
        regs.set_bits(CR1, usart::Cr1::UE.bits());

        // SR then DR clears any stale ORE/NF/FE and RXNE.
        let _ = regs.read(SR);
        let _ = regs.read(DR);

        Self { regs, wait }
    }

    fn status(regs: &mut R) -> usart::Sr {
        usart::Sr::from_bits_retain(regs.read(SR))
    }

    pub fn send_char(&mut self, byte: u8) -> Result<(), W::Error> {
        let regs = &mut self.regs;
        self.wait
            .until(|| Self::status(regs).contains(usart::Sr::TXE))?;
        self.regs.write(DR, u32::from(byte));
        Ok(())
    }

    /// Send bytes up to, not including, the first NUL. `None` sends nothing.
    pub fn send_string(&mut self, s: Option<&[u8]>) -> Result<(), W::Error> {
        let Some(bytes) = s else {
            return Ok(());
        };
        for &byte in bytes.iter().take_while(|&&b| b != 0) {
            self.send_char(byte)?;
        }
        Ok(())
    }

    pub fn read_char(&mut self) -> Result<u8, W::Error> {
        let regs = &mut self.regs;
        self.wait
            .until(|| Self::status(regs).contains(usart::Sr::RXNE))?;
        Ok((self.regs.read(DR) & usart::DATA_MASK) as u8)
    }

    /// Whether a received byte is waiting. Only SR is read, so the byte stays
    /// in DR for the next [`Serial::read_char`].
    pub fn is_receive_ready(&mut self) -> bool {
        Self::status(&mut self.regs).contains(usart::Sr::RXNE)
    }
}
