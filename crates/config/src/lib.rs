use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timing of the simulated silicon, counted in bus accesses. `None` means the
/// condition never comes true, which is how a dead oscillator or a PLL that
/// cannot lock is modelled.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    #[serde(default = "default_hsi_ready_polls")]
    pub hsi_ready_polls: Option<u32>,
    #[serde(default = "default_pll_lock_polls")]
    pub pll_lock_polls: Option<u32>,
    #[serde(default = "default_switch_polls")]
    pub switch_polls: Option<u32>,
    #[serde(default = "default_tx_busy_polls")]
    pub tx_busy_polls: u32,
    /// Baud rate of the terminal on the other end of the wire.
    #[serde(default = "default_line_baud")]
    pub line_baud: Option<u32>,
}

fn default_hsi_ready_polls() -> Option<u32> {
    Some(4)
}

fn default_pll_lock_polls() -> Option<u32> {
    Some(16)
}

fn default_switch_polls() -> Option<u32> {
    Some(2)
}

fn default_tx_busy_polls() -> u32 {
    1
}

fn default_line_baud() -> Option<u32> {
    Some(115_200)
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            hsi_ready_polls: default_hsi_ready_polls(),
            pll_lock_polls: default_pll_lock_polls(),
            switch_polls: default_switch_polls(),
            tx_busy_polls: default_tx_busy_polls(),
            line_baud: default_line_baud(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ScenarioInputs {
    /// Bytes typed into the terminal once the console is initialised.
    #[serde(default)]
    pub rx: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioLimits {
    /// Echo-loop iterations after boot.
    pub max_steps: u64,
    /// Polls per hardware wait before the run is declared hung.
    #[serde(default = "default_wait_bound")]
    pub wait_bound: u32,
}

fn default_wait_bound() -> u32 {
    100_000
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    MaxSteps,
    WaitTimeout,
    InputDrained,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct UartContainsAssertion {
    pub uart_contains: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StopReasonAssertion {
    pub expected_stop_reason: StopReason,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct NoViolationsAssertion {
    pub no_violations: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ScenarioAssertion {
    UartContains(UartContainsAssertion),
    ExpectedStopReason(StopReasonAssertion),
    NoViolations(NoViolationsAssertion),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioScript {
    pub schema_version: String,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub inputs: ScenarioInputs,
    pub limits: ScenarioLimits,
    #[serde(default)]
    pub assertions: Vec<ScenarioAssertion>,
}

impl ScenarioScript {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = std::fs::File::open(&path)
            .with_context(|| format!("Failed to open scenario script at {:?}", path.as_ref()))?;
        let script: Self =
            serde_yaml::from_reader(f).context("Failed to parse scenario script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let script: Self =
            serde_yaml::from_str(yaml).context("Failed to parse scenario script YAML")?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.limits.max_steps == 0 {
            anyhow::bail!("Limit 'max_steps' must be greater than zero");
        }

        if self.limits.wait_bound == 0 {
            anyhow::bail!("Limit 'wait_bound' must be greater than zero");
        }

        if self.board.line_baud == Some(0) {
            anyhow::bail!("Board 'line_baud' must be greater than zero");
        }

        Ok(())
    }
}

impl Default for ScenarioScript {
    /// Healthy board, nothing typed, 1000 loop iterations, no assertions.
    fn default() -> Self {
        Self {
            schema_version: "1.0".to_string(),
            board: BoardConfig::default(),
            inputs: ScenarioInputs::default(),
            limits: ScenarioLimits {
                max_steps: 1000,
                wait_bound: default_wait_bound(),
            },
            assertions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
board:
  pll_lock_polls: 40
  line_baud: 115200
inputs:
  rx: "Hi"
limits:
  max_steps: 500
  wait_bound: 2000
assertions:
  - uart_contains: "Hi"
  - expected_stop_reason: input_drained
  - no_violations: true
"#;
        let script = ScenarioScript::from_yaml(yaml).unwrap();
        assert_eq!(script.inputs.rx, "Hi");
        assert_eq!(script.board.pll_lock_polls, Some(40));
        assert_eq!(script.board.hsi_ready_polls, Some(4));
        assert_eq!(script.limits.wait_bound, 2000);
        assert_eq!(script.assertions.len(), 3);
        assert!(matches!(
            script.assertions[1],
            ScenarioAssertion::ExpectedStopReason(StopReasonAssertion {
                expected_stop_reason: StopReason::InputDrained
            })
        ));
    }

    #[test]
    fn test_null_timing_means_never_ready() {
        let yaml = r#"
schema_version: "1.0"
board:
  pll_lock_polls: ~
limits:
  max_steps: 10
"#;
        let script = ScenarioScript::from_yaml(yaml).unwrap();
        assert_eq!(script.board.pll_lock_polls, None);
        assert_eq!(script.board.switch_polls, Some(2));
        assert_eq!(script.limits.wait_bound, 100_000);
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
limits:
  max_steps: 100
"#;
        let err = ScenarioScript::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_invalid_max_steps() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_steps: 0
"#;
        let err = ScenarioScript::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn test_zero_line_baud() {
        let yaml = r#"
schema_version: "1.0"
board:
  line_baud: 0
limits:
  max_steps: 1
"#;
        let err = ScenarioScript::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("line_baud"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_steps: 1
  max_time: 3
"#;
        assert!(ScenarioScript::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_default_script_is_valid() {
        assert!(ScenarioScript::default().validate().is_ok());
    }
}
