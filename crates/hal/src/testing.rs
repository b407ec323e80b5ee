use std::collections::HashMap;

use crate::map::rcc;
use crate::map::usart;
use crate::RegisterFile;

/// Flat register store that logs writes and answers RCC status flags
/// immediately, so sequencing can be checked without a full simulator.
#[derive(Debug, Default)]
pub struct FakeRegs {
    pub values: HashMap<u32, u32>,
    pub writes: Vec<(u32, u32)>,
}

impl FakeRegs {
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn position(&self, pred: impl Fn(u32, u32) -> bool) -> Option<usize> {
        self.writes.iter().position(|(a, v)| pred(*a, *v))
    }
}

impl RegisterFile for FakeRegs {
    fn read(&mut self, addr: u32) -> u32 {
        let value = self.values.get(&addr).copied().unwrap_or(0);
        if addr == rcc::BASE + rcc::CR {
            let mut cr = rcc::Cr::from_bits_retain(value);
            cr.set(rcc::Cr::HSIRDY, cr.contains(rcc::Cr::HSION));
            cr.set(rcc::Cr::PLLRDY, cr.contains(rcc::Cr::PLLON));
            return cr.bits();
        }
        if addr == rcc::BASE + rcc::CFGR {
            let sw = (value >> rcc::SW_POS) & rcc::SW_MASK;
            return (value & !(rcc::SWS_MASK << rcc::SWS_POS)) | (sw << rcc::SWS_POS);
        }
        if addr == usart::USART2_BASE + usart::SR {
            return usart::Sr::TXE.bits();
        }
        value
    }

    fn write(&mut self, addr: u32, value: u32) {
        self.writes.push((addr, value));
        self.values.insert(addr, value);
    }
}
