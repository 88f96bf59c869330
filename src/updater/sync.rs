//! Mirroring a release onto the installation.

use std::path::{Path, PathBuf};

use crate::config::UpdaterConfig;
use crate::process::CommandSpec;
use crate::utils::relative_inside;

/// Install-relative paths the synchronization must never overwrite or delete.
pub const PRESERVED_PATHS: &[&str] = &["/config/", "/data/", "/.htaccess", "/.user.ini"];

/// `rsync` invocation copying the extracted release over the install tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    source: PathBuf,
    destination: PathBuf,
    exclusions: Vec<String>,
}

impl SyncPlan {
    #[must_use]
    pub fn new(config: &UpdaterConfig, extracted: &Path) -> Self {
        let mut exclusions = PRESERVED_PATHS.iter().map(ToString::to_string).collect::<Vec<_>>();

        // A data directory living inside the install under another name needs protecting too
        if let Some(relative) = relative_inside(&config.install_dir, &config.data_dir) {
            let anchored = format!("/{}/", relative.display());
            if !exclusions.contains(&anchored) {
                exclusions.push(anchored);
            }
        }

        Self {
            source: extracted.to_path_buf(),
            destination: config.install_dir.clone(),
            exclusions,
        }
    }

    /// Anchored `--exclude` patterns, in order.
    #[must_use]
    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    #[must_use]
    pub fn command(&self) -> CommandSpec {
        CommandSpec::new("rsync")
            .args(["-Aavx", "--delete"])
            .args(self.exclusions.iter().map(|pattern| format!("--exclude={pattern}")))
            .arg(with_trailing_slash(&self.source))
            .arg(with_trailing_slash(&self.destination))
    }
}

/// rsync copies a directory's contents, not the directory, when the source ends in `/`.
fn with_trailing_slash(path: &Path) -> String {
    let rendered = path.display().to_string();
    if rendered.ends_with('/') {
        rendered
    } else {
        format!("{rendered}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{CommandRunner, DiscardOutput, SystemRunner};
    use crate::utils::command_exists;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: PathBuf, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(path: PathBuf) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn test_default_layout() {
        let config = UpdaterConfig::default();
        let plan = SyncPlan::new(&config, Path::new("/tmp/nextcloud"));

        assert_eq!(plan.exclusions(), PRESERVED_PATHS);
        assert_eq!(
            plan.command().display_line(),
            "rsync -Aavx --delete --exclude=/config/ --exclude=/data/ --exclude=/.htaccess \
             --exclude=/.user.ini /tmp/nextcloud/ /var/www/nextcloud/"
        );
    }

    #[test]
    fn test_renamed_data_dir_inside_install_is_excluded() {
        let config = UpdaterConfig {
            data_dir: PathBuf::from("/var/www/nextcloud/storage/files"),
            ..UpdaterConfig::default()
        };
        let plan = SyncPlan::new(&config, Path::new("/tmp/nextcloud"));
        assert_eq!(plan.exclusions().last().map(String::as_str), Some("/storage/files/"));
    }

    #[test]
    fn test_external_data_dir_adds_nothing() {
        let config = UpdaterConfig {
            data_dir: PathBuf::from("/srv/ncdata"),
            ..UpdaterConfig::default()
        };
        let plan = SyncPlan::new(&config, Path::new("/tmp/nextcloud"));
        assert_eq!(plan.exclusions().len(), PRESERVED_PATHS.len());
    }

    #[tokio::test]
    async fn test_rsync_leaves_preserved_paths_untouched() {
        if !command_exists("rsync") {
            eprintln!("rsync not installed, skipping");
            return;
        }
        let temp = TempDir::new().unwrap();
        let release = temp.path().join("release");
        let install = temp.path().join("install");

        // A hostile release carrying every protected path
        write(release.join("index.php"), "new index");
        write(release.join("config/config.php"), "release config");
        write(release.join("data/planted.txt"), "release data");
        write(release.join("userdata/planted.txt"), "release data");
        write(release.join(".htaccess"), "release htaccess");
        write(release.join(".user.ini"), "release ini");

        write(install.join("index.php"), "old index");
        write(install.join("stale.php"), "removed upstream");
        write(install.join("config/config.php"), "site config");
        write(install.join("data/user.txt"), "user data");
        write(install.join("userdata/photo.jpg"), "user photo");
        write(install.join(".htaccess"), "site htaccess");
        write(install.join(".user.ini"), "site ini");

        let config = UpdaterConfig {
            install_dir: install.clone(),
            data_dir: install.join("userdata"),
            ..UpdaterConfig::default()
        };
        let output = SystemRunner
            .run(&SyncPlan::new(&config, &release).command(), &DiscardOutput)
            .await
            .unwrap();
        assert!(output.success(), "rsync failed: {}", output.output);

        assert_eq!(read(install.join("index.php")), "new index");
        assert!(!install.join("stale.php").exists());
        assert_eq!(read(install.join("config/config.php")), "site config");
        assert_eq!(read(install.join("data/user.txt")), "user data");
        assert!(!install.join("data/planted.txt").exists());
        assert_eq!(read(install.join("userdata/photo.jpg")), "user photo");
        assert!(!install.join("userdata/planted.txt").exists());
        assert_eq!(read(install.join(".htaccess")), "site htaccess");
        assert_eq!(read(install.join(".user.ini")), "site ini");
    }
}
