//! Error types for formulary-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading formulas or preparing a layout.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse formula at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The formula file did not exist at the given path.
    #[error("formula not found at {path}")]
    NotFound { path: PathBuf },

    /// The formula parsed but one of its fields is unusable.
    #[error("invalid formula at {path}: field `{field}` {reason}")]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: String,
    },

    /// `dirs::home_dir()` returned `None`: cannot locate the default prefix.
    #[error("cannot determine home directory; set $HOME or pass --prefix")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> FormulaError {
    FormulaError::Io {
        path: path.into(),
        source,
    }
}
