use bringup_hal::map::flash::{self, Acr};

/// LATENCY, PRFTEN, ICEN, DCEN, ICRST, DCRST.
const ACR_WRITABLE: u32 = 0x0000_1F0F;

/// HCLK each wait state buys at 2.7-3.6 V.
const HZ_PER_WAIT_STATE: u32 = 30_000_000;

/// Minimum FLASH_ACR.LATENCY for a given HCLK.
pub fn required_latency(hclk_hz: u32) -> u32 {
    hclk_hz.saturating_sub(1) / HZ_PER_WAIT_STATE
}

/// Flash interface: only the access control register matters here.
#[derive(Debug, Default, serde::Serialize)]
pub struct Flash {
    acr: u32,
}

impl Flash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latency(&self) -> u32 {
        self.acr & flash::LATENCY_MASK
    }

    pub fn caches_enabled(&self) -> bool {
        Acr::from_bits_retain(self.acr).contains(Acr::ICEN | Acr::DCEN)
    }
}

impl crate::Peripheral for Flash {
    fn read(&mut self, offset: u32) -> u32 {
        match offset {
            flash::ACR => self.acr,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        if offset == flash::ACR {
            self.acr = value & ACR_WRITABLE;
            tracing::debug!("FLASH: latency {} WS, acr={:#x}", self.latency(), self.acr);
        }
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
