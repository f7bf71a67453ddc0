use assert_cmd::Command;
use predicates::prelude::*;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn lsnet() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lsnet"));
    // Keep container lookups away from any real daemon
    cmd.env("DOCKER_HOST", "unix:///nonexistent/docker.sock")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_command() {
    lsnet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("List network interfaces"))
        .stdout(predicate::str::contains("PID|CONTAINER"))
        .stdout(predicate::str::contains("--json"))
        .stdout(predicate::str::contains("--open-strategy"));
}

#[test]
fn test_version_command() {
    lsnet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lsnet"));
}

#[test]
fn test_no_targets_prints_header() {
    lsnet()
        .assert()
        .success()
        .stdout(predicate::str::contains("PID"))
        .stdout(predicate::str::contains("Interface"))
        .stdout(predicate::str::contains("running"));
}

#[test]
fn test_invalid_pid_is_skipped() {
    lsnet()
        .arg("notanumber")
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid pid"));
}

#[test]
fn test_zero_pid_is_skipped() {
    lsnet()
        .arg("0")
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid pid"));
}

#[test]
fn test_missing_process_is_skipped() {
    lsnet()
        .arg("999999999")
        .assert()
        .success()
        .stderr(predicate::str::contains("cannot list interfaces"));
}

#[test]
fn test_unresolvable_container_is_skipped() {
    lsnet()
        .arg("--resolve-timeout")
        .arg("2")
        .arg("abc123def456")
        .assert()
        .success()
        .stderr(predicate::str::contains("invalid container id"));
}

#[test]
fn test_json_output_without_rows() {
    lsnet()
        .arg("--json")
        .arg("notanumber")
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_invalid_open_strategy() {
    lsnet()
        .arg("--open-strategy")
        .arg("magic")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_init_namespace_denied_without_root() {
    // Skip if running as root
    if is_root() {
        return;
    }

    lsnet()
        .arg("1")
        .assert()
        .success()
        .stderr(predicate::str::contains("cannot list interfaces"));
}

#[test]
#[ignore] // Requires root
fn test_lists_init_namespace() {
    lsnet()
        .arg("notanumber")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("| lo "))
        .stdout(predicate::str::contains("true"))
        .stderr(predicate::str::contains("invalid pid"));
}

#[test]
#[ignore] // Requires root
fn test_lists_init_namespace_as_json() {
    let output = lsnet()
        .arg("--json")
        .arg("1")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let rows: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON");
    let rows = rows.as_array().expect("expected an array");
    assert!(rows.iter().any(|r| r["name"] == "lo" && r["pid"] == 1));
}
