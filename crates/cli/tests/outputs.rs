use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("bringup-{}-{}", prefix, nonce));
    std::fs::create_dir_all(&dir).expect("Failed to create temp dir");
    dir
}

fn read_json(path: &PathBuf) -> serde_json::Value {
    let content = std::fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Bringup board simulator"));
}

#[test]
fn test_cli_default_run_echoes_input() {
    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["--input", "ping"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("UART2 Bare-Metal Test"));
    assert!(stdout.ends_with("ping"));
}

#[test]
fn test_cli_script_writes_result_and_snapshot() {
    let dir = temp_dir("outputs");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
inputs:
  rx: "Hi"
limits:
  max_steps: 50
assertions:
  - uart_contains: "Hi"
  - expected_stop_reason: input_drained
  - no_violations: true
"#,
    )
    .unwrap();
    let result_path = dir.join("result.json");
    let snapshot_path = dir.join("snapshot.json");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "--script",
            script_path.to_str().unwrap(),
            "--no-uart-stdout",
            "--result",
            result_path.to_str().unwrap(),
            "--snapshot",
            snapshot_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let result = read_json(&result_path);
    assert_eq!(result["status"], "pass");
    assert_eq!(result["stop_reason"], "input_drained");
    assert_eq!(result["echoed"], 2);
    assert!(result["uart"].as_str().unwrap().ends_with("Hi"));
    assert_eq!(result["assertions"].as_array().unwrap().len(), 3);

    let snapshot = read_json(&snapshot_path);
    assert_eq!(snapshot["clocks"]["sysclk_hz"], 84_000_000);
    assert_eq!(snapshot["clocks"]["pclk1_hz"], 42_000_000);
    assert_eq!(snapshot["peripherals"]["usart2"]["brr"], 365);
    assert!(snapshot["violations"].as_array().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_dead_pll_fails_assertion() {
    let dir = temp_dir("dead-pll");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        r#"
schema_version: "1.0"
board:
  pll_lock_polls: null
limits:
  max_steps: 10
  wait_bound: 500
assertions:
  - expected_stop_reason: input_drained
"#,
    )
    .unwrap();
    let result_path = dir.join("result.json");

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args([
            "--script",
            script_path.to_str().unwrap(),
            "--result",
            result_path.to_str().unwrap(),
        ])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let result = read_json(&result_path);
    assert_eq!(result["status"], "fail");
    assert_eq!(result["stop_reason"], "wait_timeout");
    assert!(result["error"].as_str().unwrap().contains("500 polls"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_cli_rejects_bad_script() {
    let dir = temp_dir("bad-script");
    let script_path = dir.join("script.yaml");
    std::fs::write(
        &script_path,
        "schema_version: \"2.0\"\nlimits:\n  max_steps: 10\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_bringup"))
        .args(["--script", script_path.to_str().unwrap()])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("schema_version"));

    let _ = std::fs::remove_dir_all(&dir);
}
