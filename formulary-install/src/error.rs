//! Error types for formulary-install.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use formulary_core::FormulaError;

/// Installation stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Verify,
    Extract,
    Copy,
    Receipt,
    Test,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Fetch => "fetch",
            Stage::Verify => "verify",
            Stage::Extract => "extract",
            Stage::Copy => "copy",
            Stage::Receipt => "receipt",
            Stage::Test => "test",
        };
        f.write_str(s)
    }
}

/// All errors that can arise while installing a formula.
///
/// Every variant aborts the install; none is retried.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The archive could not be retrieved.
    #[error("fetch failed for {url}: {reason}")]
    Network { url: String, reason: String },

    /// The archive bytes do not hash to the declared digest.
    #[error("verify failed for {url}: expected sha256 {expected}, got {actual}")]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    /// Permission, disk-space or path failure while touching the layout.
    #[error("{stage} failed at {path}: {source}")]
    Filesystem {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archive is unreadable or lacks a declared file.
    #[error("extract failed: {reason}")]
    Archive { reason: String },

    /// Receipt JSON could not be read or written.
    #[error("receipt JSON error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The smoke test could not run the installed binary.
    #[error("self-test of {path} failed: {reason}")]
    SelfTest { path: PathBuf, reason: String },

    /// Layout preparation failed.
    #[error(transparent)]
    Layout(#[from] FormulaError),
}

impl InstallError {
    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            InstallError::Network { .. } => Stage::Fetch,
            InstallError::Integrity { .. } => Stage::Verify,
            InstallError::Filesystem { stage, .. } => *stage,
            InstallError::Archive { .. } => Stage::Extract,
            InstallError::Json { .. } => Stage::Receipt,
            InstallError::SelfTest { .. } => Stage::Test,
            InstallError::Layout(_) => Stage::Copy,
        }
    }
}

/// Convenience constructor for [`InstallError::Filesystem`].
pub(crate) fn fs_err(
    stage: Stage,
    path: impl Into<PathBuf>,
    source: std::io::Error,
) -> InstallError {
    InstallError::Filesystem {
        stage,
        path: path.into(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_stage_and_location() {
        let err = InstallError::Integrity {
            url: "https://example.com/a.tar.gz".to_string(),
            expected: "aa".to_string(),
            actual: "bb".to_string(),
        };
        assert_eq!(err.stage(), Stage::Verify);
        assert!(err.to_string().starts_with("verify failed for https://example.com/a.tar.gz"));

        let err = fs_err(
            Stage::Copy,
            "/opt/fm/bin/demo",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.stage(), Stage::Copy);
        assert!(err.to_string().starts_with("copy failed at /opt/fm/bin/demo"));
    }
}
