/// Word-wide access to the memory-mapped peripheral space.
///
/// Reads take `&mut self`: on this silicon a read can have side effects
/// (reading USART DR clears RXNE), and exclusive access is what makes the
/// read-modify-write helpers below sound without a critical section.
pub trait RegisterFile {
    fn read(&mut self, addr: u32) -> u32;
    fn write(&mut self, addr: u32, value: u32);

    fn modify<F: FnOnce(u32) -> u32>(&mut self, addr: u32, f: F) {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    fn set_bits(&mut self, addr: u32, bits: u32) {
        self.modify(addr, |v| v | bits);
    }

    fn clear_bits(&mut self, addr: u32, bits: u32) {
        self.modify(addr, |v| v & !bits);
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &mut R {
    fn read(&mut self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&mut self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}

/// The real peripheral bus, accessed with volatile loads and stores.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Must only be called on the target, and at most once: the returned value
    /// assumes exclusive ownership of the RCC, FLASH, GPIOA and USART2 blocks.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterFile for Mmio {
    fn read(&mut self, addr: u32) -> u32 {
        // SAFETY: `Mmio::new` callers guarantee the address space is the
        // device's and that nothing else aliases these registers.
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    fn write(&mut self, addr: u32, value: u32) {
        // SAFETY: see `read`.
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
