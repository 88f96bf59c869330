//! Complete update runs through the library API.

use nc_updater::config::UpdaterConfig;
use nc_updater::core::exit_code_for;
use nc_updater::test_utils::{FakeFetcher, RecordingRunner, ScriptedPrompter, TestInstall};
use nc_updater::updater::Updater;
use std::fs;

/// Configuration file describing the scratch layout of `install`.
fn write_config(install: &TestInstall, extra: &str) -> std::path::PathBuf {
    let config = &install.config;
    let path = install.root().join("nc-updater.toml");
    let content = format!(
        "default_version = \"30.0.11\"\n\
         install_dir = \"{}\"\n\
         data_dir = \"{}\"\n\
         temp_dir = \"{}\"\n\
         backup_root = \"{}\"\n\
         log_dir = \"{}\"\n\
         service_user = \"nginx\"\n\
         service_group = \"nginx\"\n\
         php_binary = \"php8.3\"\n\
         {extra}",
        config.install_dir.display(),
        config.data_dir.display(),
        config.temp_dir.display(),
        config.backup_root.display(),
        config.log_dir.display(),
    );
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_run_from_config_file() {
    let install = TestInstall::new().unwrap();
    let path = write_config(&install, "confirm_each_phase = false\n");
    let config = UpdaterConfig::load_from(&path).await.unwrap();

    let updater = Updater::new(
        &config,
        RecordingRunner::new(),
        ScriptedPrompter::accepting_defaults(),
        FakeFetcher::release(),
    )
    .with_tool_lookup(|_| true)
    .with_stamp(TestInstall::fixed_stamp())
    .without_echo();

    let summary = updater.run().await.unwrap();

    assert_eq!(summary.version, "30.0.11");
    assert_eq!(summary.archive, install.root().join("tmp").join("nextcloud-30.0.11.zip"));

    let runner = updater.runner();
    let lines = runner.command_lines();
    assert!(lines.iter().any(|line| line.starts_with("sudo -u nginx php8.3 ")));
    assert!(lines.iter().any(|line| line.starts_with("chown -R nginx:nginx ")));
    assert!(!runner.maintenance_enabled());

    let log = fs::read_to_string(&summary.log_path).unwrap();
    assert!(summary.log_path.ends_with("nc-update-20250102-030405.log"));
    assert!(log.contains("Service account: nginx:nginx (php: php8.3)"));
    for step in 1..=13 {
        assert!(log.contains(&format!("[{step}/13]")), "missing banner for phase {step}");
    }
}

#[tokio::test]
async fn test_log_is_appended_across_runs_with_same_stamp() {
    let install = TestInstall::with_config(|config| config.confirm_each_phase = false).unwrap();
    let stamp = TestInstall::fixed_stamp();

    for _ in 0..2 {
        let updater = Updater::new(
            &install.config,
            RecordingRunner::new(),
            ScriptedPrompter::accepting_defaults(),
            FakeFetcher::release(),
        )
        .with_tool_lookup(|_| true)
        .with_stamp(stamp)
        .without_echo();
        updater.run().await.unwrap();
    }

    let log = install.read_log(&stamp).unwrap();
    assert_eq!(log.matches("==== [1/13] Preflight ====").count(), 2);
}

#[tokio::test]
async fn test_failed_sync_reports_command_status() {
    let install = TestInstall::new().unwrap();
    let updater = Updater::new(
        &install.config,
        RecordingRunner::new().fail_when("rsync -Aavx", 23),
        ScriptedPrompter::accepting_defaults(),
        FakeFetcher::release(),
    )
    .with_tool_lookup(|_| true)
    .without_echo();

    let err = updater.run().await.unwrap_err();

    assert_eq!(exit_code_for(&err), 23);
    let runner = updater.runner();
    assert_eq!(runner.count_matching("chown"), 0);
    assert_eq!(runner.count_matching("occ upgrade"), 0);
    assert!(!runner.maintenance_enabled());
}
