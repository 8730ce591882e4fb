//! Formula YAML loading and validation.
//!
//! A formula file pins exactly one release:
//!
//! ```yaml
//! name: ha-apple_content_cache-client
//! desc: Home Assistant Apple Content Caching client
//! version: 0.1.9
//! url: https://github.com/zacs/ha-apple_content_cache-client/archive/refs/tags/v0.1.9.tar.gz
//! sha256: 6687767bcb195c56f91ca7ed5076f95f652be9d890bc102178c93f78e0b5559b
//! depends_on: [jq]
//! install:
//!   executable: bin/ha_apple_content_cache_client.sh
//!   config_template: .env.example
//! ```

use std::path::{Component, Path};

use crate::error::{io_err, FormulaError};
use crate::types::Formula;

/// URL schemes an artifact may be fetched from.
pub const SUPPORTED_SCHEMES: &[&str] = &["https://", "http://", "file://"];

/// Load and validate the formula at `path`.
///
/// Returns `FormulaError::NotFound` if absent, `FormulaError::Parse` (with
/// path + line context) if malformed YAML, `FormulaError::Invalid` if a field
/// fails validation. The sha256 is normalised to lowercase.
pub fn load(path: &Path) -> Result<Formula, FormulaError> {
    if !path.exists() {
        return Err(FormulaError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse(path, &contents)
}

/// Parse + validate formula YAML; `path` is only used for error messages.
pub fn parse(path: &Path, contents: &str) -> Result<Formula, FormulaError> {
    let mut formula: Formula =
        serde_yaml::from_str(contents).map_err(|e| FormulaError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    formula.sha256 = formula.sha256.trim().to_ascii_lowercase();
    validate(path, &formula)?;
    Ok(formula)
}

/// Check the fields serde cannot check on its own.
pub fn validate(path: &Path, formula: &Formula) -> Result<(), FormulaError> {
    let invalid = |field: &'static str, reason: String| FormulaError::Invalid {
        path: path.to_path_buf(),
        field,
        reason,
    };

    let name = formula.name.0.as_str();
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(invalid("name", format!("must be a plain file name, got '{name}'")));
    }

    if formula.sha256.len() != 64 || !formula.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            "sha256",
            format!("must be 64 hex characters, got '{}'", formula.sha256),
        ));
    }

    if !SUPPORTED_SCHEMES.iter().any(|s| formula.url.starts_with(s)) {
        return Err(invalid(
            "url",
            format!("must start with one of {SUPPORTED_SCHEMES:?}, got '{}'", formula.url),
        ));
    }

    check_archive_path(&formula.install.executable)
        .map_err(|reason| invalid("install.executable", reason))?;
    check_archive_path(&formula.install.config_template)
        .map_err(|reason| invalid("install.config_template", reason))?;

    if formula.depends_on.iter().any(|d| d.trim().is_empty()) {
        return Err(invalid("depends_on", "must not contain empty entries".to_string()));
    }

    Ok(())
}

/// Archive-relative paths must be non-empty, relative and free of `..`.
fn check_archive_path(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("must not be empty".to_string());
    }
    for component in path.components() {
        match component {
            Component::Normal(part) if part.to_str().is_some() => {}
            Component::CurDir => {}
            _ => {
                return Err(format!(
                    "must be a relative path inside the archive, got '{}'",
                    path.display()
                ))
            }
        }
    }
    if path.file_name().is_none() {
        return Err(format!("must name a file, got '{}'", path.display()));
    }
    Ok(())
}
