//! Integration tests for the `telemon` binary.
//!
//! These cover argument parsing, config handling and error exit codes
//! without any telemetry hardware attached.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// `telemon` with HOME and config dirs pointed into `home`.
fn telemon_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("telemon");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG")
        .env_remove("TELEMON_TRANSPORT__PORT")
        .env_remove("TELEMON_RENDERER__OUTPUT");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = telemon_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_lists_subcommands() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("ports"))
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn version_flag() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("telemon"));
}

#[test]
fn completions_bash() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn port_and_search_conflict() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path())
        .args(["run", "--port", "/dev/ttyUSB0", "--search", "ACM"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("bench.toml");
    telemon_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("bench.toml"));
}

#[test]
fn config_init_writes_once() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("telemon.toml");

    telemon_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(std::fs::read_to_string(&path).unwrap().contains("range_bar"));

    telemon_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    telemon_cmd(home.path())
        .args(["config", "init", "--force", "--config"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn config_show_prints_resolved_values() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("telemon.toml");
    std::fs::write(&path, "[transport]\nbaud_rate = 9600\n").unwrap();

    telemon_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("baud_rate = 9600").and(predicate::str::contains("[renderer]")));
}

#[test]
fn missing_explicit_config_exits_with_config_code() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(home.path().join("absent.toml"))
        .assert()
        .code(3)
        .stderr(predicate::str::contains("config init"));
}

#[test]
fn malformed_config_exits_with_config_code() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("telemon.toml");
    std::fs::write(&path, "[renderer\n").unwrap();

    telemon_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .code(3);
}

// ── Devices ─────────────────────────────────────────────────────────

#[test]
fn ports_json_with_impossible_search_is_empty() {
    let home = tempfile::tempdir().unwrap();
    telemon_cmd(home.path())
        .args(["ports", "--json", "--search", "^no-such-device-anywhere$"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[]"));
}

#[test]
fn run_against_missing_port_exits_with_device_code() {
    let home = tempfile::tempdir().unwrap();
    let log = home.path().join("run.log");
    telemon_cmd(home.path())
        .args(["run", "--port", "/nonexistent/ttyTELEMON0", "--log-file"])
        .arg(&log)
        .assert()
        .code(7)
        .stderr(predicate::str::contains("/nonexistent/ttyTELEMON0"));
}
