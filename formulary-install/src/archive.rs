//! Gzip tarball extraction into a scoped staging directory.
//!
//! Source archives usually wrap everything in one top-level directory
//! (`client-0.1.9/…`); when that is the case the directory becomes the
//! archive root, so formula paths like `bin/client.sh` match.

use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;

use crate::error::{fs_err, InstallError, Stage};

/// An unpacked archive. The staging directory is deleted on drop.
pub struct Staging {
    _dir: TempDir,
    root: PathBuf,
}

impl Staging {
    /// Directory that archive-relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` inside the archive, or fail naming what is missing.
    pub fn locate(&self, relative: &Path, what: &str) -> Result<PathBuf, InstallError> {
        let path = self.root.join(relative);
        if path.is_file() {
            Ok(path)
        } else {
            Err(InstallError::Archive {
                reason: format!("{what} '{}' not found in archive", relative.display()),
            })
        }
    }

    /// Like [`Staging::locate`] but `None` when absent.
    pub fn find(&self, relative: &Path) -> Option<PathBuf> {
        let path = self.root.join(relative);
        path.is_file().then_some(path)
    }
}

/// Unpack gzip-compressed tar `bytes` into a fresh directory under `parent`.
///
/// tar refuses entries that would escape the staging directory.
pub fn unpack(bytes: &[u8], parent: &Path) -> Result<Staging, InstallError> {
    std::fs::create_dir_all(parent).map_err(|e| fs_err(Stage::Extract, parent, e))?;
    let dir = tempfile::Builder::new()
        .prefix(".formulary-staging")
        .tempdir_in(parent)
        .map_err(|e| fs_err(Stage::Extract, parent, e))?;

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    archive.set_preserve_permissions(true);
    archive.unpack(dir.path()).map_err(|e| InstallError::Archive {
        reason: format!("not a readable gzip tarball: {e}"),
    })?;

    let root = single_top_level_dir(dir.path())
        .map_err(|e| fs_err(Stage::Extract, dir.path(), e))?
        .unwrap_or_else(|| dir.path().to_path_buf());

    tracing::debug!(root = %root.display(), "archive unpacked");
    Ok(Staging { _dir: dir, root })
}

fn single_top_level_dir(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let entry = entries.remove(0);
    if entry.file_type()?.is_dir() {
        Ok(Some(entry.path()))
    } else {
        Ok(None)
    }
}
