//! Release archive extraction.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::config::EXTRACTED_DIR_NAME;
use crate::core::UpdaterError;

/// Extract `archive` into `temp_dir` and return the release tree it contains.
///
/// Any tree left by an earlier run is removed first. Entries whose paths would escape
/// `temp_dir` make the extraction fail.
///
/// # Errors
///
/// Returns [`UpdaterError::ExtractedTreeMissing`] if the archive does not contain a
/// top-level `nextcloud/` directory, or an error if it cannot be read.
pub async fn extract_release(archive: &Path, temp_dir: &Path) -> Result<PathBuf> {
    let extracted = temp_dir.join(EXTRACTED_DIR_NAME);
    if fs::symlink_metadata(&extracted).await.is_ok() {
        debug!("Removing previous extraction at {}", extracted.display());
        fs::remove_dir_all(&extracted)
            .await
            .with_context(|| format!("Failed to remove {}", extracted.display()))?;
    }

    let archive_path = archive.to_path_buf();
    let target = temp_dir.to_path_buf();
    let entries = tokio::task::spawn_blocking(move || unzip(&archive_path, &target))
        .await
        .context("Extraction task panicked")??;
    debug!("Extracted {} entries into {}", entries, temp_dir.display());

    let is_dir = fs::metadata(&extracted).await.map(|meta| meta.is_dir()).unwrap_or(false);
    if !is_dir {
        return Err(UpdaterError::ExtractedTreeMissing {
            path: extracted,
        }
        .into());
    }
    Ok(extracted)
}

fn unzip(archive: &Path, target: &Path) -> Result<usize> {
    let file =
        File::open(archive).with_context(|| format!("Failed to open archive: {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Not a valid zip archive: {}", archive.display()))?;
    let entries = zip.len();
    zip.extract(target)
        .with_context(|| format!("Failed to extract {} into {}", archive.display(), target.display()))?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_release_zip;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_extract_replaces_previous_tree() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("nextcloud-31.0.9.zip");
        write_release_zip(&archive, &[("nextcloud/version.php", "<?php $v = 31;")]).unwrap();
        std::fs::create_dir_all(temp.path().join("nextcloud")).unwrap();
        std::fs::write(temp.path().join("nextcloud/stale.txt"), "old").unwrap();

        let extracted = extract_release(&archive, temp.path()).await.unwrap();

        assert_eq!(extracted, temp.path().join("nextcloud"));
        assert!(extracted.join("version.php").is_file());
        assert!(!extracted.join("stale.txt").exists());
    }

    #[tokio::test]
    async fn test_archive_without_release_root() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("other.zip");
        write_release_zip(&archive, &[("owncloud/index.php", "")]).unwrap();

        let err = extract_release(&archive, temp.path()).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<UpdaterError>(),
            Some(UpdaterError::ExtractedTreeMissing { .. })
        ));
        assert_eq!(crate::core::exit_code_for(&err), 65);
    }

    #[tokio::test]
    async fn test_corrupt_archive_fails() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        std::fs::write(&archive, b"not a zip").unwrap();

        assert!(extract_release(&archive, temp.path()).await.is_err());
    }
}
