use bringup_hal::map::gpio;

/// STM32F4-compatible GPIO port.
#[derive(Debug, Default, serde::Serialize)]
pub struct GpioPort {
    moder: u32,   // 0x00: mode
    otyper: u32,  // 0x04: output type
    ospeedr: u32, // 0x08: output speed
    pupdr: u32,   // 0x0C: pull-up / pull-down
    odr: u32,     // 0x14: output data
    lckr: u32,    // 0x1C: configuration lock
    afrl: u32,    // 0x20: alternate function, pins 0-7
    afrh: u32,    // 0x24: alternate function, pins 8-15
}

impl GpioPort {
    /// Port A reset state: PA13/PA14/PA15 belong to the debug port.
    pub fn port_a() -> Self {
        Self {
            moder: 0xA800_0000,
            ospeedr: 0x0C00_0000,
            pupdr: 0x6400_0000,
            ..Default::default()
        }
    }

    fn field2(value: u32, pin: u32) -> u32 {
        (value & gpio::mask2(pin)) >> (pin * 2)
    }

    pub fn mode(&self, pin: u32) -> u32 {
        Self::field2(self.moder, pin)
    }

    pub fn speed(&self, pin: u32) -> u32 {
        Self::field2(self.ospeedr, pin)
    }

    pub fn pull(&self, pin: u32) -> u32 {
        Self::field2(self.pupdr, pin)
    }

    pub fn is_open_drain(&self, pin: u32) -> bool {
        self.otyper & (1 << pin) != 0
    }

    pub fn alternate_function(&self, pin: u32) -> u32 {
        let afr = if pin < 8 { self.afrl } else { self.afrh };
        (afr & gpio::mask_af(pin)) >> ((pin % 8) * 4)
    }

    /// Whether `pin` is handed to the peripheral behind alternate function `af`.
    pub fn routes(&self, pin: u32, af: u32) -> bool {
        self.mode(pin) == gpio::MODE_ALTERNATE && self.alternate_function(pin) == af
    }

    /// Pin levels: outputs reflect ODR, everything else its bias.
    fn idr(&self) -> u32 {
        (0..16).fold(0, |idr, pin| {
            let high = match self.mode(pin) {
                gpio::MODE_OUTPUT => self.odr & (1 << pin) != 0,
                gpio::MODE_ANALOG => false,
                _ => self.pull(pin) == gpio::PULL_UP,
            };
            idr | (u32::from(high) << pin)
        })
    }

    fn read_reg(&self, offset: u32) -> u32 {
        match offset {
            gpio::MODER => self.moder,
            gpio::OTYPER => self.otyper,
            gpio::OSPEEDR => self.ospeedr,
            gpio::PUPDR => self.pupdr,
            gpio::IDR => self.idr(),
            gpio::ODR => self.odr,
            gpio::LCKR => self.lckr,
            gpio::AFRL => self.afrl,
            gpio::AFRH => self.afrh,
            _ => 0,
        }
    }

    fn write_reg(&mut self, offset: u32, value: u32) {
        match offset {
            gpio::MODER => self.moder = value,
            gpio::OTYPER => self.otyper = value & 0xFFFF,
            gpio::OSPEEDR => self.ospeedr = value,
            gpio::PUPDR => self.pupdr = value,
            gpio::ODR => self.odr = value & 0xFFFF,
            gpio::BSRR => {
                // Bit Set/Reset Register: set wins when both halves name a pin.
                let set = value & 0xFFFF;
                let reset = (value >> 16) & 0xFFFF;
                self.odr &= !reset;
                self.odr |= set;
            }
            gpio::LCKR => self.lckr = value & 0x1_FFFF,
            gpio::AFRL => self.afrl = value,
            gpio::AFRH => self.afrh = value,
            _ => {}
        }
    }
}

impl crate::Peripheral for GpioPort {
    fn read(&mut self, offset: u32) -> u32 {
        self.read_reg(offset)
    }

    fn write(&mut self, offset: u32, value: u32) {
        self.write_reg(offset, value);
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Peripheral;

    #[test]
    fn test_port_a_reset_values() {
        let mut port = GpioPort::port_a();
        assert_eq!(port.read(gpio::MODER), 0xA800_0000);
        assert_eq!(port.mode(2), gpio::MODE_INPUT);
        assert_eq!(port.mode(13), gpio::MODE_ALTERNATE);
        assert_eq!(port.pull(13), gpio::PULL_UP);
    }

    #[test]
    fn test_alternate_function_routing() {
        let mut port = GpioPort::port_a();
        port.write(gpio::MODER, gpio::MODE_ALTERNATE << 4);
        assert!(!port.routes(2, 7));
        port.write(gpio::AFRL, 7 << 8);
        assert!(port.routes(2, 7));
        assert!(!port.routes(3, 7));

        port.write(gpio::AFRH, 5 << 4);
        assert_eq!(port.alternate_function(9), 5);
    }

    #[test]
    fn test_bsrr_and_idr() {
        let mut port = GpioPort::port_a();
        port.write(gpio::MODER, gpio::MODE_OUTPUT << 10);
        port.write(gpio::BSRR, 1 << 5);
        assert_eq!(port.read(gpio::ODR), 1 << 5);
        assert_ne!(port.read(gpio::IDR) & (1 << 5), 0);

        port.write(gpio::BSRR, 1 << (5 + 16));
        assert_eq!(port.read(gpio::ODR), 0);
        assert_eq!(port.read(gpio::IDR) & (1 << 5), 0);
    }

    #[test]
    fn test_pull_up_reads_high() {
        let mut port = GpioPort::port_a();
        port.write(gpio::PUPDR, gpio::PULL_UP << 6);
        assert_ne!(port.read(gpio::IDR) & (1 << 3), 0);
        assert_eq!(port.read(gpio::IDR) & (1 << 2), 0);
    }
}
