//! STM32F401 register map (RM0368): block base addresses, register offsets and
//! the bit fields the bring-up code touches.
//!
//! Offsets are relative to the block base. Multi-bit fields are described by a
//! `*_POS` shift and a right-aligned `*_MASK`.

pub mod rcc {
    pub const BASE: u32 = 0x4002_3800;

    pub const CR: u32 = 0x00;
    pub const PLLCFGR: u32 = 0x04;
    pub const CFGR: u32 = 0x08;
    pub const AHB1ENR: u32 = 0x30;
    pub const APB1ENR: u32 = 0x40;

    bitflags::bitflags! {
        /// RCC_CR. Trim and calibration fields are left to `from_bits_retain`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Cr: u32 {
            const HSION = 1 << 0;
            const HSIRDY = 1 << 1;
            const HSEON = 1 << 16;
            const HSERDY = 1 << 17;
            const PLLON = 1 << 24;
            const PLLRDY = 1 << 25;
        }
    }

    pub const PLLM_POS: u32 = 0;
    pub const PLLM_MASK: u32 = 0x3F;
    pub const PLLN_POS: u32 = 6;
    pub const PLLN_MASK: u32 = 0x1FF;
    pub const PLLP_POS: u32 = 16;
    pub const PLLP_MASK: u32 = 0x3;
    /// Clear = HSI feeds the PLL, set = HSE.
    pub const PLLSRC_HSE: u32 = 1 << 22;
    pub const PLLQ_POS: u32 = 24;
    pub const PLLQ_MASK: u32 = 0xF;

    pub const SW_POS: u32 = 0;
    pub const SW_MASK: u32 = 0x3;
    pub const SWS_POS: u32 = 2;
    pub const SWS_MASK: u32 = 0x3;
    pub const HPRE_POS: u32 = 4;
    pub const HPRE_MASK: u32 = 0xF;
    pub const PPRE1_POS: u32 = 10;
    pub const PPRE1_MASK: u32 = 0x7;
    pub const PPRE2_POS: u32 = 13;
    pub const PPRE2_MASK: u32 = 0x7;

    /// SW / SWS encodings.
    pub const SOURCE_HSI: u32 = 0b00;
    pub const SOURCE_HSE: u32 = 0b01;
    pub const SOURCE_PLL: u32 = 0b10;

    /// PPREx encoding for HCLK / 2.
    pub const PPRE_DIV2: u32 = 0b100;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Ahb1enr: u32 {
            const GPIOAEN = 1 << 0;
        }
    }

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Apb1enr: u32 {
            const USART2EN = 1 << 17;
        }
    }
}

pub mod flash {
    pub const BASE: u32 = 0x4002_3C00;

    pub const ACR: u32 = 0x00;

    /// Wait states, in CPU cycles.
    pub const LATENCY_MASK: u32 = 0xF;

    bitflags::bitflags! {
        /// FLASH_ACR control bits. LATENCY lives in the low nibble.
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Acr: u32 {
            const PRFTEN = 1 << 8;
            const ICEN = 1 << 9;
            const DCEN = 1 << 10;
        }
    }
}

pub mod gpio {
    pub const GPIOA_BASE: u32 = 0x4002_0000;

    pub const MODER: u32 = 0x00;
    pub const OTYPER: u32 = 0x04;
    pub const OSPEEDR: u32 = 0x08;
    pub const PUPDR: u32 = 0x0C;
    pub const IDR: u32 = 0x10;
    pub const ODR: u32 = 0x14;
    pub const BSRR: u32 = 0x18;
    pub const LCKR: u32 = 0x1C;
    pub const AFRL: u32 = 0x20;
    pub const AFRH: u32 = 0x24;

    /// MODER encodings (2 bits per pin).
    pub const MODE_INPUT: u32 = 0b00;
    pub const MODE_OUTPUT: u32 = 0b01;
    pub const MODE_ALTERNATE: u32 = 0b10;
    pub const MODE_ANALOG: u32 = 0b11;

    /// OSPEEDR encoding for the fastest edge rate.
    pub const SPEED_VERY_HIGH: u32 = 0b11;

    /// PUPDR encodings.
    pub const PULL_NONE: u32 = 0b00;
    pub const PULL_UP: u32 = 0b01;
    pub const PULL_DOWN: u32 = 0b10;

    /// Alternate function number routing PA2/PA3 to USART2.
    pub const AF_USART2: u32 = 7;

    /// Mask of a 2-bit per-pin field (MODER, OSPEEDR, PUPDR) for `pin`.
    pub const fn mask2(pin: u32) -> u32 {
        0b11 << (pin * 2)
    }

    /// Mask of a pin's 4-bit alternate function selector inside AFRL/AFRH.
    pub const fn mask_af(pin: u32) -> u32 {
        0xF << ((pin % 8) * 4)
    }
}

pub mod usart {
    pub const USART2_BASE: u32 = 0x4000_4400;

    pub const SR: u32 = 0x00;
    pub const DR: u32 = 0x04;
    pub const BRR: u32 = 0x08;
    pub const CR1: u32 = 0x0C;
    pub const CR2: u32 = 0x10;
    pub const CR3: u32 = 0x14;
    pub const GTPR: u32 = 0x18;

    /// Received data is 8 bits wide with M = 0.
    pub const DATA_MASK: u32 = 0xFF;

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Sr: u32 {
            const PE = 1 << 0;
            const FE = 1 << 1;
            const NF = 1 << 2;
            const ORE = 1 << 3;
            const IDLE = 1 << 4;
            const RXNE = 1 << 5;
            const TC = 1 << 6;
            const TXE = 1 << 7;
        }
    }

    bitflags::bitflags! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct Cr1: u32 {
            const RE = 1 << 2;
            const TE = 1 << 3;
            const PCE = 1 << 10;
            const M = 1 << 12;
            const UE = 1 << 13;
            const OVER8 = 1 << 15;
        }
    }
}
