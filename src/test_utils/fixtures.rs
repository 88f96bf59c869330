//! Release archive fixtures

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Files of a minimal Nextcloud release, under the archive's `nextcloud/` root.
pub const DEFAULT_RELEASE_FILES: &[(&str, &str)] = &[
    ("nextcloud/index.php", "<?php\nrequire_once __DIR__ . '/lib/base.php';\n"),
    ("nextcloud/occ", "#!/usr/bin/env php\n<?php\n"),
    ("nextcloud/version.php", "<?php\n$OC_VersionString = '31.0.9';\n"),
    ("nextcloud/config/config.sample.php", "<?php\n$CONFIG = [];\n"),
    ("nextcloud/lib/base.php", "<?php\n"),
];

/// Write a zip archive at `path` holding `entries` (name, content).
pub fn write_release_zip(path: &Path, entries: &[(&str, &str)]) -> Result<u64> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content.as_bytes())?;
    }
    zip.finish()?;

    Ok(std::fs::metadata(path)?.len())
}
