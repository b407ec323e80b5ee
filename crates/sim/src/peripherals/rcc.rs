use super::Transition;
use crate::Violation;
use bringup_config::BoardConfig;
use bringup_hal::clock::HSI_HZ;
use bringup_hal::map::rcc::{self, Cr};

/// HSION set, HSITRIM = 16, HSIRDY still pending.
const CR_RESET: u32 = 0x0000_0081;
const PLLCFGR_RESET: u32 = 0x2400_3010;
const READY_BITS: Cr = Cr::HSIRDY.union(Cr::HSERDY).union(Cr::PLLRDY);
/// PLLRDY drops this many accesses after PLLON is cleared.
const PLL_STOP_ACCESSES: u32 = 2;

/// STM32F4 Reset and Clock Control: oscillator and PLL start-up latencies,
/// the SYSCLK mux and the bus prescalers.
#[derive(Debug, serde::Serialize)]
pub struct Rcc {
    cr: u32,
    pllcfgr: u32,
    cfgr: u32,
    ahb1enr: u32,
    apb1enr: u32,
    hsi: Transition,
    pll: Transition,
    switch: Transition,
    switch_target: u32,
    #[serde(skip)]
    hsi_ready_polls: Option<u32>,
    #[serde(skip)]
    pll_lock_polls: Option<u32>,
    #[serde(skip)]
    switch_polls: Option<u32>,
    #[serde(skip)]
    switched: Option<u32>,
    #[serde(skip)]
    pub(crate) violations: Vec<Violation>,
}

impl Default for Rcc {
    fn default() -> Self {
        Self::new(&BoardConfig::default())
    }
}

impl Rcc {
    pub fn new(board: &BoardConfig) -> Self {
        Self {
            cr: CR_RESET,
            pllcfgr: PLLCFGR_RESET,
            cfgr: 0,
            ahb1enr: 0,
            apb1enr: 0,
            hsi: Transition::start(board.hsi_ready_polls),
            pll: Transition::Idle,
            switch: Transition::Idle,
            switch_target: rcc::SOURCE_HSI,
            hsi_ready_polls: board.hsi_ready_polls,
            pll_lock_polls: board.pll_lock_polls,
            switch_polls: board.switch_polls,
            switched: None,
            violations: Vec::new(),
        }
    }

    fn cr_flags(&self) -> Cr {
        Cr::from_bits_retain(self.cr)
    }

    fn field(value: u32, pos: u32, mask: u32) -> u32 {
        (value >> pos) & mask
    }

    /// SYSCLK source as acknowledged in CFGR.SWS.
    pub fn system_clock_source(&self) -> u32 {
        Self::field(self.cfgr, rcc::SWS_POS, rcc::SWS_MASK)
    }

    fn source_ready(&self, source: u32) -> bool {
        let cr = self.cr_flags();
        match source {
            rcc::SOURCE_HSI => cr.contains(Cr::HSIRDY),
            rcc::SOURCE_PLL => cr.contains(Cr::PLLRDY),
            _ => false,
        }
    }

    pub fn pll_vco_hz(&self) -> u32 {
        if self.pllcfgr & rcc::PLLSRC_HSE != 0 {
            return 0;
        }
        let m = Self::field(self.pllcfgr, rcc::PLLM_POS, rcc::PLLM_MASK);
        let n = Self::field(self.pllcfgr, rcc::PLLN_POS, rcc::PLLN_MASK);
        if m == 0 {
            return 0;
        }
        // Saturate so an out-of-range VCO still trips the clock limit checks.
        u32::try_from(u64::from(HSI_HZ) * u64::from(n) / u64::from(m)).unwrap_or(u32::MAX)
    }

    pub fn pll_output_hz(&self) -> u32 {
        let p = (Self::field(self.pllcfgr, rcc::PLLP_POS, rcc::PLLP_MASK) + 1) * 2;
        self.pll_vco_hz() / p
    }

    pub fn pll48_hz(&self) -> u32 {
        match Self::field(self.pllcfgr, rcc::PLLQ_POS, rcc::PLLQ_MASK) {
            0 => 0,
            q => self.pll_vco_hz() / q,
        }
    }

    pub fn sysclk_hz(&self) -> u32 {
        match self.system_clock_source() {
            rcc::SOURCE_HSI => HSI_HZ,
            rcc::SOURCE_PLL => self.pll_output_hz(),
            _ => 0,
        }
    }

    pub fn hclk_hz(&self) -> u32 {
        let hpre = Self::field(self.cfgr, rcc::HPRE_POS, rcc::HPRE_MASK);
        let div = if hpre & 0x8 == 0 {
            1
        } else {
            [2, 4, 8, 16, 64, 128, 256, 512][(hpre & 0x7) as usize]
        };
        self.sysclk_hz() / div
    }

    fn apb_divider(ppre: u32) -> u32 {
        if ppre & 0x4 == 0 {
            1
        } else {
            1 << ((ppre & 0x3) + 1)
        }
    }

    pub fn pclk1_hz(&self) -> u32 {
        self.hclk_hz() / Self::apb_divider(Self::field(self.cfgr, rcc::PPRE1_POS, rcc::PPRE1_MASK))
    }

    pub fn pclk2_hz(&self) -> u32 {
        self.hclk_hz() / Self::apb_divider(Self::field(self.cfgr, rcc::PPRE2_POS, rcc::PPRE2_MASK))
    }

    pub fn ahb1_enabled(&self, bits: rcc::Ahb1enr) -> bool {
        rcc::Ahb1enr::from_bits_retain(self.ahb1enr).contains(bits)
    }

    pub fn apb1_enabled(&self, bits: rcc::Apb1enr) -> bool {
        rcc::Apb1enr::from_bits_retain(self.apb1enr).contains(bits)
    }

    /// SWS value of a SYSCLK switch that completed since the last call.
    pub fn take_switch_event(&mut self) -> Option<u32> {
        self.switched.take()
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            rcc::CR => self.cr,
            rcc::PLLCFGR => self.pllcfgr,
            rcc::CFGR => self.cfgr,
            rcc::AHB1ENR => self.ahb1enr,
            rcc::APB1ENR => self.apb1enr,
            _ => 0,
        }
    }

    fn write_cr(&mut self, value: u32) {
        let old = self.cr_flags();
        let mut new = Cr::from_bits_retain(value);
        new.remove(READY_BITS);
        new.insert(old.intersection(READY_BITS));

        let sws = self.system_clock_source();
        if old.contains(Cr::HSION) && !new.contains(Cr::HSION) && sws == rcc::SOURCE_HSI {
            // HSI cannot be stopped while it drives SYSCLK.
            new.insert(Cr::HSION);
        }
        if old.contains(Cr::PLLON) && !new.contains(Cr::PLLON) && sws == rcc::SOURCE_PLL {
            tracing::warn!("RCC: PLLON cleared while PLL drives SYSCLK, write ignored");
            self.violations.push(Violation::PllStopWhileSystemClock);
            new.insert(Cr::PLLON);
        }

        if new.contains(Cr::HSION) != old.contains(Cr::HSION) {
            if new.contains(Cr::HSION) {
                self.hsi = Transition::start(self.hsi_ready_polls);
            } else {
                self.hsi = Transition::Idle;
                new.remove(Cr::HSIRDY);
            }
        }

        if new.contains(Cr::PLLON) != old.contains(Cr::PLLON) {
            self.pll = if new.contains(Cr::PLLON) {
                Transition::start(self.pll_lock_polls)
            } else {
                Transition::After(PLL_STOP_ACCESSES)
            };
        }

        self.cr = new.bits();
    }

    fn write_pllcfgr(&mut self, value: u32) {
        if self.cr_flags().contains(Cr::PLLON) {
            tracing::warn!("RCC: PLLCFGR written ({:#010x}) while PLL enabled", value);
            self.violations
                .push(Violation::PllReconfiguredWhileEnabled { value });
        }
        self.pllcfgr = value;
    }

    fn write_cfgr(&mut self, value: u32) {
        let sws_mask = rcc::SWS_MASK << rcc::SWS_POS;
        let old_sw = Self::field(self.cfgr, rcc::SW_POS, rcc::SW_MASK);
        self.cfgr = (value & !sws_mask) | (self.cfgr & sws_mask);

        let sw = Self::field(value, rcc::SW_POS, rcc::SW_MASK);
        if sw != old_sw || (sw != self.system_clock_source() && !self.switch.is_pending()) {
            self.switch_target = sw;
            self.switch = Transition::start(self.switch_polls);
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            rcc::CR => self.write_cr(value),
            rcc::PLLCFGR => self.write_pllcfgr(value),
            rcc::CFGR => self.write_cfgr(value),
            rcc::AHB1ENR => self.ahb1enr = value,
            rcc::APB1ENR => self.apb1enr = value,
            _ => {}
        }
    }
}

impl crate::Peripheral for Rcc {
    fn read(&mut self, offset: u32) -> u32 {
        self.read_reg(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.write_reg(offset, value);
    }

    fn tick(&mut self) {
        if self.hsi.tick() {
            let mut cr = self.cr_flags();
            cr.set(Cr::HSIRDY, cr.contains(Cr::HSION));
            self.cr = cr.bits();
        }

        if self.pll.tick() {
            let mut cr = self.cr_flags();
            cr.set(Cr::PLLRDY, cr.contains(Cr::PLLON));
            self.cr = cr.bits();
            tracing::debug!("RCC: PLLRDY = {}", cr.contains(Cr::PLLRDY));
        }

        if self.switch.tick() {
            if self.source_ready(self.switch_target) {
                let sws_mask = rcc::SWS_MASK << rcc::SWS_POS;
                self.cfgr = (self.cfgr & !sws_mask) | (self.switch_target << rcc::SWS_POS);
                self.switched = Some(self.switch_target);
            } else {
                // The mux holds the old source until the new one is ready.
                self.switch = Transition::After(1);
            }
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    fn board(hsi: Option<u32>, pll: Option<u32>, switch: Option<u32>) -> BoardConfig {
        BoardConfig {
            hsi_ready_polls: hsi,
            pll_lock_polls: pll,
            switch_polls: switch,
            ..BoardConfig::default()
        }
    }

    fn ticks(rcc: &mut Rcc, n: u32) {
        for _ in 0..n {
            rcc.tick();
        }
    }

    #[test]
    fn test_hsi_ready_after_reset_latency() {
        let mut rcc = Rcc::new(&board(Some(3), Some(1), Some(1)));
        assert_eq!(rcc.read(rcc::CR) & Cr::HSIRDY.bits(), 0);
        ticks(&mut rcc, 3);
        assert_ne!(rcc.read(rcc::CR) & Cr::HSIRDY.bits(), 0);
        assert_eq!(rcc.sysclk_hz(), HSI_HZ);
    }

    #[test]
    fn test_ready_bits_are_read_only() {
        let mut rcc = Rcc::new(&board(Some(1), Some(1), Some(1)));
        rcc.write(rcc::CR, (Cr::HSION | Cr::PLLRDY).bits());
        assert_eq!(rcc.read(rcc::CR) & Cr::PLLRDY.bits(), 0);
    }

    #[test]
    fn test_pll_lock_and_switch() {
        let mut rcc = Rcc::new(&board(Some(0), Some(5), Some(2)));
        ticks(&mut rcc, 1);
        rcc.write(rcc::PLLCFGR, bringup_hal::clock::PLLCFGR_VALUE);
        rcc.write(rcc::CR, (Cr::HSION | Cr::PLLON).bits());
        ticks(&mut rcc, 4);
        assert_eq!(rcc.read(rcc::CR) & Cr::PLLRDY.bits(), 0);
        ticks(&mut rcc, 1);
        assert_ne!(rcc.read(rcc::CR) & Cr::PLLRDY.bits(), 0);

        rcc.write(rcc::CFGR, rcc::SOURCE_PLL);
        assert_eq!(rcc.system_clock_source(), rcc::SOURCE_HSI);
        ticks(&mut rcc, 2);
        assert_eq!(rcc.system_clock_source(), rcc::SOURCE_PLL);
        assert_eq!(rcc.take_switch_event(), Some(rcc::SOURCE_PLL));
        assert_eq!(rcc.sysclk_hz(), 84_000_000);
        assert_eq!(rcc.pll48_hz(), 48_000_000);
        assert!(rcc.violations.is_empty());
    }

    #[test]
    fn test_switch_waits_for_unlocked_pll() {
        let mut rcc = Rcc::new(&board(Some(0), None, Some(0)));
        ticks(&mut rcc, 1);
        rcc.write(rcc::CR, (Cr::HSION | Cr::PLLON).bits());
        rcc.write(rcc::CFGR, rcc::SOURCE_PLL);
        ticks(&mut rcc, 100);
        assert_eq!(rcc.system_clock_source(), rcc::SOURCE_HSI);
        assert_eq!(rcc.take_switch_event(), None);
    }

    #[test]
    fn test_pllcfgr_write_while_enabled_is_flagged() {
        let mut rcc = Rcc::new(&board(Some(0), Some(0), Some(0)));
        rcc.write(rcc::CR, (Cr::HSION | Cr::PLLON).bits());
        rcc.write(rcc::PLLCFGR, 0x1234);
        assert_eq!(
            rcc.violations,
            vec![Violation::PllReconfiguredWhileEnabled { value: 0x1234 }]
        );
    }

    #[test]
    fn test_pll_cannot_stop_while_system_clock() {
        let mut rcc = Rcc::new(&board(Some(0), Some(0), Some(0)));
        ticks(&mut rcc, 1);
        rcc.write(rcc::CR, (Cr::HSION | Cr::PLLON).bits());
        ticks(&mut rcc, 1);
        rcc.write(rcc::CFGR, rcc::SOURCE_PLL);
        ticks(&mut rcc, 1);
        assert_eq!(rcc.system_clock_source(), rcc::SOURCE_PLL);

        rcc.write(rcc::CR, Cr::HSION.bits());
        assert_ne!(rcc.read(rcc::CR) & Cr::PLLON.bits(), 0);
        assert_eq!(rcc.violations, vec![Violation::PllStopWhileSystemClock]);
    }

    #[test]
    fn test_vco_saturates_instead_of_wrapping() {
        let mut rcc = Rcc::new(&board(Some(0), Some(0), Some(0)));
        // M = 1, N = 511: 8.176 GHz does not fit in 32 bits.
        rcc.write(rcc::PLLCFGR, 1 | (511 << rcc::PLLN_POS));
        assert_eq!(rcc.pll_vco_hz(), u32::MAX);
        assert!(rcc.pll_output_hz() > bringup_hal::clock::SYSCLK_HZ);
    }

    #[test]
    fn test_prescaler_decoding() {
        let mut rcc = Rcc::new(&board(Some(0), Some(0), Some(0)));
        ticks(&mut rcc, 1);
        rcc.write(
            rcc::CFGR,
            (rcc::PPRE_DIV2 << rcc::PPRE1_POS) | (0b101 << rcc::PPRE2_POS),
        );
        assert_eq!(rcc.hclk_hz(), 16_000_000);
        assert_eq!(rcc.pclk1_hz(), 8_000_000);
        assert_eq!(rcc.pclk2_hz(), 4_000_000);
    }
}
