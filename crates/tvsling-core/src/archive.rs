// Archive workspace: scoped extraction of a distributable package.
//
// The scratch directory is owned by `tempfile::TempDir`, so it is removed
// on every exit path -- patch failures, repack failures, panics during
// unwind -- without explicit cleanup code at the call sites.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::ArchiveError;

/// Name of the web-root subtree inside the archive.
pub const WWW_DIR: &str = "www";

/// Name of the archive-level manifest.
pub const MANIFEST_FILE: &str = "config.xml";

/// A private scratch extraction of a zip-format application archive,
/// valid for one patch+repack cycle. Exactly one workspace exists per
/// install operation; it is not shared across threads.
pub struct ArchiveWorkspace {
    scratch: TempDir,
    archive_path: PathBuf,
}

impl ArchiveWorkspace {
    /// Unpack `archive_path` into a freshly created scratch directory.
    ///
    /// A corrupt archive is fatal for the install attempt.
    pub fn extract(archive_path: &Path) -> Result<Self, ArchiveError> {
        let scratch = TempDir::with_prefix("tvsling-pkg-")?;

        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file)?;
        archive.extract(scratch.path())?;

        info!(
            archive = %archive_path.display(),
            scratch = %scratch.path().display(),
            entries = archive.len(),
            "archive extracted"
        );

        Ok(Self {
            scratch,
            archive_path: archive_path.to_path_buf(),
        })
    }

    /// Root of the unpacked tree.
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// The archive's web-root subtree (`www/`).
    pub fn www(&self) -> PathBuf {
        self.scratch.path().join(WWW_DIR)
    }

    /// Path of the archive-level manifest (`config.xml`).
    pub fn manifest(&self) -> PathBuf {
        self.scratch.path().join(MANIFEST_FILE)
    }

    /// The original archive path this workspace was extracted from.
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Re-zip the (possibly modified) tree over the original archive path.
    ///
    /// Writes to a temp file in the same directory, then persists over the
    /// original, so a crash mid-repack cannot leave a truncated archive.
    pub fn repack(&self) -> Result<(), ArchiveError> {
        let dir = self.archive_path.parent().unwrap_or_else(|| Path::new("."));
        let staging = tempfile::NamedTempFile::new_in(dir)?;

        {
            let mut writer = ZipWriter::new(staging.as_file());
            let options = SimpleFileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated);

            for entry in WalkDir::new(self.root()).min_depth(1) {
                let entry = entry.map_err(std::io::Error::from)?;
                let relative = entry
                    .path()
                    .strip_prefix(self.root())
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                // Zip entry names always use forward slashes.
                let name = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if entry.file_type().is_dir() {
                    writer.add_directory(format!("{name}/"), options)?;
                } else {
                    writer.start_file(name, options)?;
                    let mut file = File::open(entry.path())?;
                    let mut buf = Vec::new();
                    file.read_to_end(&mut buf)?;
                    writer.write_all(&buf)?;
                }
            }

            writer.finish()?;
        }

        staging
            .persist(&self.archive_path)
            .map_err(|e| ArchiveError::Replace {
                path: self.archive_path.clone(),
                message: e.to_string(),
            })?;

        debug!(archive = %self.archive_path.display(), "archive repacked");
        Ok(())
    }
}
