//! Domain types for formulas and the artifacts they publish.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! All types are serializable/deserializable via serde + serde_yaml.

use std::fmt;
use std::path::PathBuf;

use semver::Version;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed package name (e.g. `ha-apple_content_cache-client`).
///
/// Drives the config directory, log file and receipt names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormulaName(pub String);

impl fmt::Display for FormulaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FormulaName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FormulaName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Formula document
// ---------------------------------------------------------------------------

fn default_config_template() -> PathBuf {
    PathBuf::from(".env.example")
}

/// Which files of the archive get installed, relative to the archive root
/// (after the single top-level directory has been stripped).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Executable placed into `P/bin/`, keeping its file name.
    pub executable: PathBuf,
    /// Template seeded into `P/etc/<name>/` on first install.
    #[serde(default = "default_config_template")]
    pub config_template: PathBuf,
}

/// One published release of a client, as declared in a formula YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Formula {
    pub name: FormulaName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub version: Version,
    pub url: String,
    pub sha256: String,
    /// Commands the client expects on `PATH` (checked, never installed).
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub install: InstallSpec,
}

impl Formula {
    /// The downloadable unit this formula pins.
    pub fn artifact(&self) -> Artifact {
        Artifact {
            name: self.name.clone(),
            version: self.version.clone(),
            url: self.url.clone(),
            sha256: self.sha256.clone(),
        }
    }

    /// File name of the installed executable (`P/bin/<executable_name>`).
    ///
    /// Validation guarantees `install.executable` has a UTF-8 file name; the
    /// package name is the fallback for hand-built values.
    pub fn executable_name(&self) -> String {
        self.install
            .executable
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| self.name.0.clone())
    }
}

/// The versioned, hash-pinned archive for a release. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: FormulaName,
    pub version: Version,
    pub url: String,
    /// Lowercase hex SHA-256 of the archive bytes.
    pub sha256: String,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
