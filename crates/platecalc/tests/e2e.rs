//! End-to-end CLI integration tests.

use assert_cmd::Command;
use predicates::prelude::*;

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/testdata/plate.json");

fn platecalc() -> Command {
    let mut cmd = Command::cargo_bin("platecalc").expect("binary not found");
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

fn run(protocol: &str) -> Command {
    let mut cmd = platecalc();
    cmd.args(["-f", FIXTURE, "-p", "P1", "-m", "M1", "-r", protocol]);
    cmd
}

#[test]
fn help_flag() {
    platecalc()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--plan-only"));
}

#[test]
fn version_flag() {
    platecalc()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("platecalc"));
}

#[test]
fn successful_run() {
    run("PR-OK")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("net_pom"))
        .stdout(predicate::str::contains("[SUCCESS] 2 of 2 features succeeded"));
}

#[test]
fn quiet_prints_outcome_only() {
    run("PR-OK")
        .arg("-q")
        .assert()
        .code(0)
        .stdout(predicate::eq("SUCCESS\n"));
}

#[test]
fn partial_failure_exit_code() {
    run("PR-PARTIAL")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("division by zero at well #1"))
        .stdout(predicate::str::contains("DEPENDENCY_FAILED"))
        .stdout(predicate::str::contains("[PARTIAL_FAILURE]"));
}

#[test]
fn unknown_protocol_is_unresolvable() {
    run("PR-MISSING")
        .assert()
        .code(5)
        .stderr(predicate::str::contains("protocol `PR-MISSING` not found"));
}

#[test]
fn invalid_protocol_is_config_error() {
    run("PR-BAD")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("unknown category `qc`"));
}

#[test]
fn plate_mismatch_is_config_error() {
    platecalc()
        .args(["-f", FIXTURE, "-p", "P1", "-m", "M2", "-r", "PR-OK"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("belongs to plate `P2`"));
}

#[test]
fn missing_fixture_flag() {
    platecalc()
        .env_remove("PLATECALC_FIXTURE")
        .args(["-p", "P1", "-m", "M1", "-r", "PR-OK"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--fixture is required"));
}

#[test]
fn plan_only_prints_stage_order() {
    platecalc()
        .args(["-f", FIXTURE, "-r", "PR-PARTIAL", "--plan-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Stage 1 `raw`"))
        .stdout(predicate::str::contains("Stage 2 `normalize`"))
        .stdout(predicate::str::contains("ratio_pom"));
}

#[test]
fn report_and_events_files() {
    let dir = tempfile::tempdir().unwrap();
    let report = dir.path().join("report.json");
    let events = dir.path().join("events.jsonl");

    run("PR-OK")
        .arg("-q")
        .arg("--output")
        .arg(&report)
        .arg("--events")
        .arg(&events)
        .assert()
        .code(0);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["outcome"], "SUCCESS");
    assert_eq!(json["features"][0]["name"], "net");
    assert_eq!(json["features"][0]["values"][5], 59.0);

    let statuses: Vec<String> = std::fs::read_to_string(&events)
        .unwrap()
        .lines()
        .map(|line| {
            let event: serde_json::Value = serde_json::from_str(line).unwrap();
            event["status"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(statuses, vec!["SCHEDULED", "IN_PROGRESS", "SUCCESS"]);
}

#[test]
fn failed_run_still_writes_events() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");

    run("PR-MISSING").arg("--events").arg(&events).assert().code(5);

    let text = std::fs::read_to_string(&events).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("\"status\":\"FAILURE\""));
    assert!(!lines[1].contains("dataset_id"));
}

#[test]
fn invalid_duration_flag() {
    run("PR-OK")
        .args(["--run-timeout", "later"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("--run-timeout"));
}

#[test]
fn completion_bash() {
    platecalc()
        .args(["--completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platecalc"));
}
