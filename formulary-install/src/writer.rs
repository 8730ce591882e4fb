//! Atomic executable placement and no-clobber config seeding.
//!
//! ## `install_executable` protocol
//!
//! 1. Read the staged executable and SHA-256 hash it.
//! 2. Compare with the installed binary → skip if identical.
//! 3. Write to `<dest>.formulary.tmp` with mode 0755.
//! 4. Rename to `<dest>` (atomic on POSIX). On failure the tmp file is
//!    removed and any previous binary stays in place.
//!
//! ## `seed_config` protocol
//!
//! Files under the config directory are created with `create_new`; an
//! existing file is never opened for writing.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use formulary_core::InstallLayout;

use crate::error::{fs_err, InstallError, Stage};
use crate::fetch::sha256_hex;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of placing the executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// Binary was written (content changed or did not previously exist).
    Written { path: PathBuf, sha256: String },
    /// Binary was skipped: installed content already matches.
    Unchanged { path: PathBuf, sha256: String },
}

impl WriteResult {
    pub fn sha256(&self) -> &str {
        match self {
            WriteResult::Written { sha256, .. } | WriteResult::Unchanged { sha256, .. } => sha256,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. } | WriteResult::Unchanged { path, .. } => path,
        }
    }
}

/// Outcome of seeding the configuration directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOutcome {
    /// No config existed; it was created from the template.
    Seeded { path: PathBuf },
    /// A config already existed and was left byte-for-byte untouched.
    Preserved { path: PathBuf },
    /// The archive carried no template; nothing was written.
    NoTemplate,
}

// ---------------------------------------------------------------------------
// install_executable
// ---------------------------------------------------------------------------

/// Atomically place the staged executable `src` at `dest`.
pub fn install_executable(src: &Path, dest: &Path) -> Result<WriteResult, InstallError> {
    let tmp = PathBuf::from(format!("{}.formulary.tmp", dest.display()));
    install_executable_with_tmp(src, dest, &tmp)
}

fn install_executable_with_tmp(
    src: &Path,
    dest: &Path,
    tmp: &Path,
) -> Result<WriteResult, InstallError> {
    let content = fs::read(src).map_err(|e| fs_err(Stage::Copy, src, e))?;
    let digest = sha256_hex(&content);

    if is_executable(dest) {
        if let Ok(existing) = fs::read(dest) {
            if sha256_hex(&existing) == digest {
                tracing::debug!("unchanged: {}", dest.display());
                return Ok(WriteResult::Unchanged {
                    path: dest.to_path_buf(),
                    sha256: digest,
                });
            }
        }
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| fs_err(Stage::Copy, parent, e))?;
    }

    if let Err(err) = write_tmp(tmp, &content) {
        let _ = fs::remove_file(tmp);
        return Err(err);
    }

    if let Err(e) = fs::rename(tmp, dest) {
        let _ = fs::remove_file(tmp);
        return Err(fs_err(Stage::Copy, dest, e));
    }

    tracing::info!("installed: {}", dest.display());
    Ok(WriteResult::Written {
        path: dest.to_path_buf(),
        sha256: digest,
    })
}

fn write_tmp(tmp: &Path, content: &[u8]) -> Result<(), InstallError> {
    fs::write(tmp, content).map_err(|e| fs_err(Stage::Copy, tmp, e))?;
    set_mode(tmp, 0o755).map_err(|e| fs_err(Stage::Copy, tmp, e))
}

// ---------------------------------------------------------------------------
// seed_config
// ---------------------------------------------------------------------------

/// Seed `<config_dir>/.env` and the reference template from `template`.
///
/// Existing files are never modified.
pub fn seed_config(
    template: Option<&Path>,
    layout: &InstallLayout,
) -> Result<ConfigOutcome, InstallError> {
    let Some(template) = template else {
        tracing::warn!(
            "no config template in archive; {} not seeded",
            layout.config_file().display()
        );
        return Ok(ConfigOutcome::NoTemplate);
    };

    let content = fs::read(template).map_err(|e| fs_err(Stage::Copy, template, e))?;
    fs::create_dir_all(&layout.config_dir)
        .map_err(|e| fs_err(Stage::Copy, &layout.config_dir, e))?;

    write_new(&layout.config_template(), &content, 0o644)?;

    let config = layout.config_file();
    if write_new(&config, &content, 0o600)? {
        tracing::info!("seeded config: {}", config.display());
        Ok(ConfigOutcome::Seeded { path: config })
    } else {
        tracing::info!("kept existing config: {}", config.display());
        Ok(ConfigOutcome::Preserved { path: config })
    }
}

/// Create `path` with `content` unless it exists. Returns `false` when the
/// file was already there.
fn write_new(path: &Path, content: &[u8], mode: u32) -> Result<bool, InstallError> {
    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(fs_err(Stage::Copy, path, err)),
    };

    let written = file
        .write_all(content)
        .and_then(|()| file.sync_all())
        .and_then(|()| set_mode(path, mode));
    if let Err(err) = written {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(fs_err(Stage::Copy, path, err));
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
