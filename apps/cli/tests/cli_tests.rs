//! Command-line behaviour without hardware

use assert_cmd::Command;
use predicates::prelude::*;

fn cli(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ranger-cli").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env("HOME", config_home);
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("ports"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_monitor_help_shows_options() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["monitor", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--strict"))
        .stdout(predicate::str::contains("--count"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_monitor_without_port_fails() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .arg("monitor")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No serial port given"));
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_set_then_get() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["config", "set", "--port", "/dev/ttyTEST", "--baud", "9600"])
        .assert()
        .success();

    assert!(dir.path().join("ranger").join("config.toml").exists());

    cli(dir.path())
        .args(["config", "get", "port"])
        .assert()
        .success()
        .stdout("/dev/ttyTEST\n");
    cli(dir.path())
        .args(["config", "get", "baud"])
        .assert()
        .success()
        .stdout("9600\n");
}

#[cfg(target_os = "linux")]
#[test]
fn test_config_get_default_baud() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["config", "get", "baud"])
        .assert()
        .success()
        .stdout("115200\n");
}

#[cfg(target_os = "linux")]
#[test]
fn test_monitor_unknown_port_reports_open_failure() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["monitor", "--port", "/dev/ranger-does-not-exist"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Failed to open serial port: "));
}
