use crate::BusObserver;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts register traffic on the system bus.
#[derive(Debug)]
pub struct AccessMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl Default for AccessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessMetrics {
    pub fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
    }

    pub fn get_reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn get_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl BusObserver for AccessMetrics {
    fn on_read(&self, _addr: u32, _value: u32) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn on_write(&self, _addr: u32, _value: u32) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
