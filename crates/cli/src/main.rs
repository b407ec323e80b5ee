use anyhow::Context;
use bringup_config::{ScenarioAssertion, ScenarioScript};
use bringup_sim::board::{Board, RunOutcome};
use bringup_sim::terminal::Terminal;
use bringup_sim::Violation;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Bringup board simulator", long_about = None)]
struct Args {
    /// Scenario script (YAML). Without one a healthy board runs with no input.
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Text typed into the terminal once the console is up (overrides the script)
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum echo-loop iterations (overrides the script)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Write a JSON snapshot of the board state here when the run ends
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Write the JSON run result here
    #[arg(long)]
    result: Option<PathBuf>,

    /// Do not echo transmitted UART bytes to stdout
    #[arg(long)]
    no_uart_stdout: bool,

    /// Log every register access
    #[arg(short, long)]
    trace: bool,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "snake_case")]
enum Status {
    Pass,
    Fail,
}

#[derive(Serialize, Debug)]
struct AssertionResult {
    assertion: ScenarioAssertion,
    passed: bool,
}

#[derive(Serialize, Debug)]
struct RunResult {
    status: Status,
    #[serde(flatten)]
    outcome: RunOutcome,
    uart: String,
    violations: Vec<Violation>,
    bus_reads: u64,
    bus_writes: u64,
    assertions: Vec<AssertionResult>,
}

fn check(assertion: &ScenarioAssertion, outcome: &RunOutcome, uart: &str, board: &Board) -> bool {
    match assertion {
        ScenarioAssertion::UartContains(a) => uart.contains(&a.uart_contains),
        ScenarioAssertion::ExpectedStopReason(a) => outcome.stop_reason == a.expected_stop_reason,
        ScenarioAssertion::NoViolations(a) => {
            !a.no_violations || (board.bus.violations().is_empty() && board.bus.faults.is_empty())
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the UART stream.
    let level = if args.trace {
        tracing::Level::TRACE
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut script = match &args.script {
        Some(path) => {
            info!("Loading scenario script: {:?}", path);
            ScenarioScript::from_file(path)?
        }
        None => {
            info!("Using default scenario");
            ScenarioScript::default()
        }
    };
    if let Some(input) = args.input {
        script.inputs.rx = input;
    }
    if let Some(max_steps) = args.max_steps {
        script.limits.max_steps = max_steps;
    }
    script.validate()?;

    let terminal = Terminal::with_stdout_echo(!args.no_uart_stdout);
    let mut board = Board::new(&script.board, terminal.clone());

    info!("Running up to {} echo steps", script.limits.max_steps);
    let outcome = board.run(script.inputs.rx.as_bytes(), &script.limits);
    info!(
        "Stopped: {:?} after {} steps, {} byte(s) echoed",
        outcome.stop_reason, outcome.steps, outcome.echoed
    );

    let uart = String::from_utf8_lossy(&terminal.received()).into_owned();
    let assertions: Vec<AssertionResult> = script
        .assertions
        .iter()
        .map(|assertion| AssertionResult {
            assertion: assertion.clone(),
            passed: check(assertion, &outcome, &uart, &board),
        })
        .collect();
    for failed in assertions.iter().filter(|a| !a.passed) {
        tracing::error!("Assertion failed: {:?}", failed.assertion);
    }
    let passed = assertions.iter().all(|a| a.passed);

    if let Some(path) = &args.snapshot {
        write_json(path, &board.bus.snapshot())?;
        info!("Snapshot written to {:?}", path);
    }

    if let Some(path) = &args.result {
        let result = RunResult {
            status: if passed { Status::Pass } else { Status::Fail },
            outcome,
            uart,
            violations: board.bus.violations().to_vec(),
            bus_reads: board.metrics.get_reads(),
            bus_writes: board.metrics.get_writes(),
            assertions,
        };
        write_json(path, &result)?;
        info!("Result written to {:?}", path);
    }

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
