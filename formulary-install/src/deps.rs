//! Runtime dependency check for `depends_on` commands.
//!
//! Dependencies are only looked up on `PATH`; installing them is left to the
//! operator.

use std::ffi::OsStr;
use std::path::Path;

use formulary_core::Formula;

/// `depends_on` entries that cannot be found on the current `PATH`.
pub fn missing_dependencies(formula: &Formula) -> Vec<String> {
    formula
        .depends_on
        .iter()
        .filter(|cmd| which::which(cmd.as_str()).is_err())
        .cloned()
        .collect()
}

/// Same as [`missing_dependencies`], searching `paths` (a `PATH`-style list).
pub fn missing_dependencies_in(formula: &Formula, paths: &OsStr, cwd: &Path) -> Vec<String> {
    formula
        .depends_on
        .iter()
        .filter(|cmd| which::which_in(cmd.as_str(), Some(paths), cwd).is_err())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::{FormulaName, InstallSpec};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn formula(deps: &[&str]) -> Formula {
        Formula {
            name: FormulaName::from("demo"),
            desc: None,
            homepage: None,
            license: None,
            version: semver::Version::new(1, 0, 0),
            url: "https://example.com/demo.tar.gz".to_string(),
            sha256: "0".repeat(64),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            install: InstallSpec {
                executable: PathBuf::from("demo"),
                config_template: PathBuf::from(".env.example"),
            },
        }
    }

    #[test]
    #[cfg(unix)]
    fn reports_only_commands_missing_from_path() {
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().unwrap();
        let jq = bin.path().join("jq");
        std::fs::write(&jq, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&jq, std::fs::Permissions::from_mode(0o755)).unwrap();

        let missing = missing_dependencies_in(
            &formula(&["jq", "definitely-not-installed-xyz"]),
            bin.path().as_os_str(),
            bin.path(),
        );
        assert_eq!(missing, vec!["definitely-not-installed-xyz".to_string()]);
    }

    #[test]
    fn no_dependencies_means_nothing_missing() {
        assert!(missing_dependencies(&formula(&[])).is_empty());
    }
}
