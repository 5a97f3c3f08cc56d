mod common;

use common::{fixture_path, run_cli};

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn path_arg(name: &str) -> String {
    fixture_path(name).display().to_string()
}

// ============================================================================
// version command
// ============================================================================

#[test]
fn version_human() {
    let output = run_cli(&["version"]);
    assert!(
        output.status.success(),
        "version should exit 0: {}",
        stderr(&output)
    );

    let out = stdout(&output);
    assert!(
        out.contains("damage-reflection"),
        "version output should name the binary: {out}"
    );
    assert!(out.contains('.'), "version output should contain a version: {out}");
}

#[test]
fn version_json() {
    let output = run_cli(&["version", "--format", "json"]);
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "damage-reflection");
    assert!(parsed["version"].is_string());
}

// ============================================================================
// validate command
// ============================================================================

#[test]
fn validate_accepts_valid_config() {
    let output = run_cli(&["validate", &path_arg("reflection.yaml")]);
    assert!(
        output.status.success(),
        "valid config should exit 0: {}",
        stderr(&output)
    );
    let out = stdout(&output);
    assert!(out.contains("... ok"), "expected ok marker: {out}");
    assert!(out.contains("1 file(s): 1 valid, 0 invalid"), "{out}");
}

#[test]
fn validate_rejects_out_of_range_values() {
    let output = run_cli(&["-q", "validate", &path_arg("invalid.yaml")]);
    assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("FAILED"), "{out}");
    assert!(out.contains("pvp.reflect_percent"), "{out}");
}

#[test]
fn validate_missing_file_is_io_error() {
    let output = run_cli(&["-q", "validate", "/nonexistent/reflection.yaml"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn validate_json_summary_covers_every_file() {
    let output = run_cli(&[
        "-q",
        "validate",
        "--format",
        "json",
        &path_arg("reflection.yaml"),
        &path_arg("invalid.yaml"),
    ]);
    assert_eq!(output.status.code(), Some(2));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("validate JSON should be valid");
    assert_eq!(parsed["summary"]["total"], 2);
    assert_eq!(parsed["summary"]["valid"], 1);
    assert_eq!(parsed["summary"]["invalid"], 1);
    assert_eq!(parsed["files"][0]["valid"], true);
    assert!(parsed["files"][1]["error"].is_string());
}

#[test]
fn validate_reports_skipped_raid_entries() {
    let output = run_cli(&["-q", "validate", &path_arg("typo.yaml")]);
    assert!(output.status.success());

    let out = stdout(&output);
    assert!(out.contains("warning:"), "{out}");
    assert!(out.contains("StorageContainer"), "suggestion expected: {out}");
}

#[test]
fn validate_strict_fails_on_warnings() {
    let output = run_cli(&["-q", "validate", "--strict", &path_arg("typo.yaml")]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("FAILED"));
}

// ============================================================================
// simulate command
// ============================================================================

#[test]
fn simulate_duel_with_defaults() {
    let output = run_cli(&["-q", "simulate", "-s", &path_arg("duel.yaml")]);
    assert!(
        output.status.success(),
        "simulate should exit 0: {}",
        stderr(&output)
    );

    let out = stdout(&output);
    assert!(out.contains("scenario: three strikes"), "{out}");
    assert!(out.contains("alice"), "{out}");
    assert!(out.contains("applied 0"), "victim should be spared: {out}");
}

#[test]
fn simulate_json_reports_final_health() {
    let output = run_cli(&[
        "-q",
        "simulate",
        "-s",
        &path_arg("duel.yaml"),
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("report JSON should be valid");
    assert_eq!(parsed["steps"].as_array().map(Vec::len), Some(4));
    assert_eq!(parsed["actors"]["1"]["health"], 70.0);
    assert_eq!(parsed["actors"]["2"]["health"], 100.0);
    assert_eq!(parsed["steps"][3]["elapsed_ms"], 1000);
}

#[test]
fn simulate_with_config_kicks_on_third_strike() {
    let output = run_cli(&[
        "-q",
        "simulate",
        "--config",
        &path_arg("reflection.yaml"),
        "-s",
        &path_arg("duel.yaml"),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    assert!(out.contains("kick 1:"), "expected kick action: {out}");
    assert!(out.contains("Warning 1/3"), "expected strike warning: {out}");
}

#[test]
fn simulate_writes_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");

    let output = run_cli(&[
        "-q",
        "simulate",
        "-s",
        &path_arg("raid.yaml"),
        "--events-file",
        events.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let content = std::fs::read_to_string(&events).unwrap();
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines[0]["type"], "ConfigReloaded");
    assert!(lines.iter().any(|e| e["type"] == "ViolationDetected"));
    for (i, event) in lines.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
    }
}

#[test]
fn simulate_unknown_entity_is_scenario_error() {
    let output = run_cli(&["-q", "simulate", "-s", &path_arg("unknown_entity.yaml")]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn simulate_requires_scenario() {
    let output = run_cli(&["simulate"]);
    assert!(!output.status.success());
}

// ============================================================================
// status command
// ============================================================================

#[test]
fn status_json_reflects_config() {
    let output = run_cli(&[
        "-q",
        "status",
        "--config",
        &path_arg("reflection.yaml"),
        "--format",
        "json",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let parsed: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("status JSON should be valid");
    assert_eq!(parsed["pvp_enabled"], true);
    assert_eq!(parsed["forgiveness_enabled"], true);
    assert_eq!(parsed["strike_threshold"], 3);
    assert_eq!(parsed["pvp_strikes"], 0);
}

#[test]
fn status_human_defaults() {
    let output = run_cli(&["-q", "status"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("pvp:"));
}
