//! Integration tests for the `homefly` CLI binary.
//!
//! These validate argument parsing, help output, shell completions, and
//! error handling — all without requiring a live bridge.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `homefly` binary with env isolation.
///
/// Clears all `HOMEFLY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn homefly_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("homefly");
    cmd.env("HOME", "/tmp/homefly-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/homefly-test-nonexistent")
        .env_remove("HOMEFLY_BRIDGE_CONFIG")
        .env_remove("HOMEFLY_PERSIST_DIR")
        .env_remove("HOMEFLY_HOST")
        .env_remove("HOMEFLY_STATE_PATH")
        .env_remove("HOMEFLY_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = homefly_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    homefly_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("bridge")
            .and(predicate::str::contains("entities"))
            .and(predicate::str::contains("schedule"))
            .and(predicate::str::contains("guard"))
            .and(predicate::str::contains("serve")),
    );
}

#[test]
fn test_version_flag() {
    homefly_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("homefly"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    homefly_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    homefly_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = homefly_cmd().arg("frobnicate").output().unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid subcommand"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("frobnicate"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_entities_list_without_bridge_is_empty_not_fatal() {
    // Discovery degrades to an empty endpoint list when the bridge
    // config is missing; listing then reports no entities.
    let dir = tempfile::tempdir().unwrap();
    homefly_cmd()
        .args(["entities", "list"])
        .arg("--bridge-config")
        .arg(dir.path().join("none.json"))
        .arg("--state-path")
        .arg(dir.path().join("state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No entities found"));
}

#[test]
fn test_entities_set_rejects_malformed_id() {
    let output = homefly_cmd()
        .args(["entities", "set", "not-an-id", "--on"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("entity id"),
        "Expected id format error:\n{text}"
    );
}

#[test]
fn test_entities_set_requires_a_change() {
    let output = homefly_cmd()
        .args(["entities", "set", "AA11:2:8"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("--on") || text.contains("brightness"),
        "Expected patch validation error:\n{text}"
    );
}

#[test]
fn test_schedule_set_rejects_bad_duration() {
    let output = homefly_cmd()
        .args(["schedule", "set", "AA11:2:8", "--on", "--in", "soonish"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_schedule_set_requires_a_time() {
    // --in / --at form a required argument group.
    let output = homefly_cmd()
        .args(["schedule", "set", "AA11:2:8", "--on"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_schedule_list_empty_state() {
    let dir = tempfile::tempdir().unwrap();
    homefly_cmd()
        .args(["schedule", "list"])
        .arg("--state-path")
        .arg(dir.path().join("state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending actions"));
}

#[test]
fn test_guard_run_unknown_command_is_guarded() {
    let dir = tempfile::tempdir().unwrap();
    let output = homefly_cmd()
        .args(["guard", "run", "rm_everything"])
        .arg("--state-path")
        .arg(dir.path().join("state.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5), "Expected guarded exit code");
    let text = combined_output(&output);
    assert!(
        text.contains("allowlist"),
        "Expected allowlist error:\n{text}"
    );
}

#[test]
fn test_guard_list_without_config() {
    let dir = tempfile::tempdir().unwrap();
    homefly_cmd()
        .args(["guard", "list"])
        .arg("--state-path")
        .arg(dir.path().join("state.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No remediation commands"));
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn test_config_show_renders_defaults() {
    homefly_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("bridge_config")
                .and(predicate::str::contains("refresh_interval")),
        );
}

#[test]
fn test_config_path_prints_a_path() {
    homefly_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().display().to_string();

    homefly_cmd()
        .env("HOME", &home)
        .env("XDG_CONFIG_HOME", &home)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    // A second init without --force refuses to clobber.
    homefly_cmd()
        .env("HOME", &home)
        .env("XDG_CONFIG_HOME", &home)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_entities_subcommands_exist() {
    homefly_cmd()
        .args(["entities", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("get"))
                .and(predicate::str::contains("set")),
        );
}

#[test]
fn test_schedule_subcommands_exist() {
    homefly_cmd()
        .args(["schedule", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("set"))
                .and(predicate::str::contains("restart"))
                .and(predicate::str::contains("cancel")),
        );
}

#[test]
fn test_guard_subcommands_exist() {
    homefly_cmd()
        .args(["guard", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("list").and(predicate::str::contains("run")));
}
