//! Tests of the `nc-update` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn nc_update() -> Command {
    let mut cmd = Command::cargo_bin("nc-update").unwrap();
    cmd.env_remove("NC_UPDATER_CONFIG")
        .env_remove("RUST_LOG")
        .env("NC_UPDATER_NO_PROGRESS", "1")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_flags() {
    nc_update()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("nc-update"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--verbose"))
        .stdout(predicate::str::contains("--quiet"));
}

#[test]
fn test_version_flag() {
    nc_update()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    nc_update().args(["--verbose", "--quiet"]).assert().failure().code(2);
}

#[test]
fn test_missing_config_file_exits_78() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("absent.toml");

    nc_update()
        .arg("--config")
        .arg(&missing)
        .assert()
        .code(78)
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("configuration file not found"))
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_invalid_config_exits_78() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "url_template = \"https://example.com/latest.zip\"\n").unwrap();

    nc_update()
        .arg("--config")
        .arg(&path)
        .assert()
        .code(78)
        .stderr(predicate::str::contains("{version}"));
}

#[test]
fn test_config_from_environment_variable() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, "install_dir = [\n").unwrap();

    nc_update().env("NC_UPDATER_CONFIG", &path).assert().code(78);
}

#[test]
fn test_missing_install_directory_fails_before_any_prompt() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    let root = temp.path().display();
    fs::write(
        &path,
        format!(
            "install_dir = \"{root}/absent\"\ndata_dir = \"{root}/absent/data\"\n\
             log_dir = \"{root}/logs\"\n"
        ),
    )
    .unwrap();

    // 77 when the suite runs unprivileged, 66 when it runs as root
    nc_update()
        .arg("--config")
        .arg(&path)
        .write_stdin("")
        .assert()
        .code(predicate::in_iter([66, 77]))
        .stdout(predicate::str::contains("version").not());

    assert!(!temp.path().join("logs").exists());
}
