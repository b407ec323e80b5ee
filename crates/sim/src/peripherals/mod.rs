pub mod flash;
pub mod gpio;
pub mod rcc;
pub mod usart;

/// A hardware state change that completes a number of bus accesses after it
/// was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    #[default]
    Idle,
    After(u32),
    /// Never completes (dead oscillator, PLL that cannot lock).
    Stuck,
}

impl Transition {
    pub fn start(latency: Option<u32>) -> Self {
        match latency {
            Some(n) => Self::After(n),
            None => Self::Stuck,
        }
    }

    /// Advance one access. Returns `true` on the access that completes it.
    pub fn tick(&mut self) -> bool {
        match self {
            Self::After(n) if *n <= 1 => {
                *self = Self::Idle;
                true
            }
            Self::After(n) => {
                *n -= 1;
                false
            }
            Self::Idle | Self::Stuck => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}
