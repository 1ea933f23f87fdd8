//! Integration tests for the `tvsling` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! and error handling — all without a TV or media server on the network.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `tvsling` binary with env isolation.
///
/// Clears all `TVSLING_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn tvsling_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tvsling");
    cmd.env("HOME", "/tmp/tvsling-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tvsling-cli-test-nonexistent")
        .env_remove("TVSLING_SERVER")
        .env_remove("TVSLING_ACCESS_TOKEN")
        .env_remove("TVSLING_USER_ID")
        .env_remove("TVSLING_OUTPUT")
        .env_remove("TVSLING_ENROLLMENT_URL");
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
    let output = tvsling_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    tvsling_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("smart TV")
            .or(predicate::str::contains("Provision"))
            .and(predicate::str::contains("scan"))
            .and(predicate::str::contains("install")),
    );
}

#[test]
fn test_version_flag() {
    tvsling_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tvsling"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    tvsling_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    tvsling_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = tvsling_cmd().arg("frobnicate").output().unwrap();
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
fn test_validate_rejects_bad_address() {
    tvsling_cmd()
        .args(["validate", "not-an-ip"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_install_requires_package() {
    let output = tvsling_cmd().arg("install").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("--package") || text.contains("required"));
}

#[test]
fn test_cert_issue_requires_device_id() {
    let output = tvsling_cmd().args(["cert", "issue"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("--device-id") || text.contains("required"));
}

#[test]
fn test_patch_missing_archive_fails() {
    tvsling_cmd()
        .args([
            "--server",
            "http://127.0.0.1:8096",
            "patch",
            "/nonexistent/app.wgt",
        ])
        .assert()
        .failure();
}

// ── Config subcommands ──────────────────────────────────────────────

#[test]
fn test_config_path_prints_path() {
    tvsling_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_defaults() {
    tvsling_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[scan]").and(predicate::str::contains("concurrency = 64")),
        );
}
