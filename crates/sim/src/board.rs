use crate::bus::SystemBus;
use crate::metrics::AccessMetrics;
use crate::terminal::Terminal;
use bringup_config::{BoardConfig, ScenarioLimits, StopReason};
use bringup_hal::{app, Bounded};
use serde::Serialize;
use std::sync::Arc;

/// How a [`Board::run`] ended.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub stop_reason: StopReason,
    /// Echo-loop passes executed after boot.
    pub steps: u64,
    pub echoed: u64,
    /// Set when a wait gave up; names what was being waited for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A simulated NUCLEO-F401RE running the echo console.
#[derive(Debug)]
pub struct Board {
    pub bus: SystemBus,
    pub terminal: Terminal,
    pub metrics: Arc<AccessMetrics>,
}

impl Board {
    pub fn new(config: &BoardConfig, terminal: Terminal) -> Self {
        let mut bus = SystemBus::from_config(config, terminal.clone());
        let metrics = Arc::new(AccessMetrics::new());
        bus.add_observer(metrics.clone());
        Self {
            bus,
            terminal,
            metrics,
        }
    }

    /// Boot the firmware, type `input` into the terminal, then run the echo
    /// loop until the input is consumed, a wait times out or `max_steps`
    /// passes have run.
    pub fn run(&mut self, input: &[u8], limits: &ScenarioLimits) -> RunOutcome {
        let wait = Bounded::new(limits.wait_bound);
        let mut console = match app::boot(&mut self.bus, wait) {
            Ok(console) => console,
            Err(e) => {
                tracing::error!("boot stalled: {}", e);
                return RunOutcome {
                    stop_reason: StopReason::WaitTimeout,
                    steps: 0,
                    echoed: 0,
                    error: Some(format!("boot: {}", e)),
                };
            }
        };
        tracing::info!("console up, typing {} byte(s)", input.len());
        self.terminal.type_bytes(input);

        let mut steps = 0;
        let mut echoed = 0;
        while steps < limits.max_steps {
            steps += 1;
            match app::echo_once(&mut console) {
                Ok(true) => echoed += 1,
                Ok(false) if self.terminal.pending_input() == 0 => {
                    return RunOutcome {
                        stop_reason: StopReason::InputDrained,
                        steps,
                        echoed,
                        error: None,
                    };
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("echo stalled: {}", e);
                    return RunOutcome {
                        stop_reason: StopReason::WaitTimeout,
                        steps,
                        echoed,
                        error: Some(format!("echo: {}", e)),
                    };
                }
            }
        }

        RunOutcome {
            stop_reason: StopReason::MaxSteps,
            steps,
            echoed,
            error: None,
        }
    }
}
