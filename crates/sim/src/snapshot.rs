use crate::{SimulationError, Violation};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, Clone)]
pub struct BoardSnapshot {
    pub clocks: ClockSnapshot,
    pub peripherals: BTreeMap<String, serde_json::Value>,
    pub violations: Vec<Violation>,
    pub faults: Vec<SimulationError>,
}

/// Clock tree as derived from the RCC registers at snapshot time.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockSnapshot {
    pub sysclk_hz: u32,
    pub hclk_hz: u32,
    pub pclk1_hz: u32,
    pub pclk2_hz: u32,
    pub pll48_hz: u32,
}
