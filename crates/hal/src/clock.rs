//! System clock tree: HSI (16 MHz) -> PLL -> 84 MHz SYSCLK.
//!
//! ```text
//! HSI 16 MHz -> /M (16) -> 1 MHz -> xN (336) -> VCO 336 MHz -+-> /P (4) -> SYSCLK 84 MHz
//!                                                            +-> /Q (7) -> PLL48  48 MHz
//! SYSCLK -> AHB /1 -> HCLK 84 MHz -+-> APB1 /2 -> PCLK1 42 MHz (USART2)
//!                                  +-> APB2 /1 -> PCLK2 84 MHz
//! ```

use crate::map::{flash, rcc};
use crate::{RegisterFile, Wait};

pub const HSI_HZ: u32 = 16_000_000;

/// PLL input divider; the VCO input must sit between 1 and 2 MHz.
pub const PLL_M: u32 = 16;
/// VCO multiplier.
pub const PLL_N: u32 = 336;
/// Main system clock divider (one of 2, 4, 6, 8).
pub const PLL_P: u32 = 4;
/// Divider for the 48 MHz domain (USB OTG FS, SDIO, RNG).
pub const PLL_Q: u32 = 7;

pub const VCO_HZ: u32 = HSI_HZ / PLL_M * PLL_N;
pub const SYSCLK_HZ: u32 = VCO_HZ / PLL_P;
pub const PLL48_HZ: u32 = VCO_HZ / PLL_Q;
pub const HCLK_HZ: u32 = SYSCLK_HZ;

pub const APB1_DIVIDER: u32 = 2;
pub const PCLK1_HZ: u32 = HCLK_HZ / APB1_DIVIDER;
pub const PCLK2_HZ: u32 = HCLK_HZ;

/// Datasheet maxima for the two peripheral buses.
pub const APB1_MAX_HZ: u32 = 42_000_000;
pub const APB2_MAX_HZ: u32 = 84_000_000;

/// Wait states for 60 < HCLK <= 84 MHz at 2.7-3.6 V.
pub const FLASH_LATENCY: u32 = 2;

const _: () = assert!(SYSCLK_HZ == 84_000_000);
const _: () = assert!(PLL48_HZ == 48_000_000);
const _: () = assert!(PCLK1_HZ <= APB1_MAX_HZ);
const _: () = assert!(PCLK2_HZ <= APB2_MAX_HZ);

/// PLLP field encoding: /2 -> 0b00, /4 -> 0b01, /6 -> 0b10, /8 -> 0b11.
pub const fn pllp_bits(divider: u32) -> u32 {
    divider / 2 - 1
}

/// PLLCFGR with PLLSRC clear, i.e. fed from HSI.
pub const PLLCFGR_VALUE: u32 = (PLL_M << rcc::PLLM_POS)
    | (PLL_N << rcc::PLLN_POS)
    | (pllp_bits(PLL_P) << rcc::PLLP_POS)
    | (PLL_Q << rcc::PLLQ_POS);

pub const FLASH_ACR_VALUE: u32 = flash::Acr::ICEN.bits() | flash::Acr::DCEN.bits() | FLASH_LATENCY;

const RCC_CR: u32 = rcc::BASE + rcc::CR;
const RCC_PLLCFGR: u32 = rcc::BASE + rcc::PLLCFGR;
const RCC_CFGR: u32 = rcc::BASE + rcc::CFGR;
const FLASH_ACR: u32 = flash::BASE + flash::ACR;

fn cr<R: RegisterFile>(regs: &mut R) -> rcc::Cr {
    rcc::Cr::from_bits_retain(regs.read(RCC_CR))
}

/// Source currently driving SYSCLK, as reported by CFGR.SWS.
pub fn system_clock_source<R: RegisterFile>(regs: &mut R) -> u32 {
    (regs.read(RCC_CFGR) >> rcc::SWS_POS) & rcc::SWS_MASK
}

fn select_source<R: RegisterFile, W: Wait>(
    regs: &mut R,
    wait: &mut W,
    source: u32,
) -> Result<(), W::Error> {
    regs.modify(RCC_CFGR, |v| {
        (v & !(rcc::SW_MASK << rcc::SW_POS)) | (source << rcc::SW_POS)
    });
    // SW is the request, SWS the acknowledgement; they differ until the mux settles.
    wait.until(|| system_clock_source(regs) == source)
}

/// Bring SYSCLK up to 84 MHz from the PLL.
///
/// Every step is gated on the hardware status bit for the previous one. With
/// [`crate::Forever`] a clock that never becomes ready hangs here.
///
/// Safe to call again once the PLL is running: SYSCLK is parked on HSI before
/// the PLL is stopped, because PLLON cannot be cleared while the PLL drives the
/// system clock.
pub fn configure_system_clock<R: RegisterFile, W: Wait>(
    regs: &mut R,
    wait: &mut W,
) -> Result<(), W::Error> {
    regs.set_bits(RCC_CR, rcc::Cr::HSION.bits());
    wait.until(|| cr(regs).contains(rcc::Cr::HSIRDY))?;

    // Wait states must be in place before the core runs faster than 30 MHz.
    regs.write(FLASH_ACR, FLASH_ACR_VALUE);

    if cr(regs).contains(rcc::Cr::PLLON) {
        if system_clock_source(regs) == rcc::SOURCE_PLL {
            select_source(regs, wait, rcc::SOURCE_HSI)?;
        }
        regs.clear_bits(RCC_CR, rcc::Cr::PLLON.bits());
        wait.until(|| !cr(regs).contains(rcc::Cr::PLLRDY))?;
    }

    // PLL factors are only written while the PLL is stopped.
    regs.write(RCC_PLLCFGR, PLLCFGR_VALUE);

    regs.modify(RCC_CFGR, |v| {
        let cleared = v
            & !((rcc::HPRE_MASK << rcc::HPRE_POS)
                | (rcc::PPRE1_MASK << rcc::PPRE1_POS)
                | (rcc::PPRE2_MASK << rcc::PPRE2_POS));
        cleared | (rcc::PPRE_DIV2 << rcc::PPRE1_POS)
    });

    regs.set_bits(RCC_CR, rcc::Cr::PLLON.bits());
    wait.until(|| cr(regs).contains(rcc::Cr::PLLRDY))?;

    select_source(regs, wait, rcc::SOURCE_PLL)
}
