//! Install-time smoke test: run the installed binary with `--help`.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use formulary_core::service::ENV_PATH_VAR;
use formulary_core::InstallLayout;

use crate::error::InstallError;
use crate::writer::is_executable;

pub const HELP_FLAG: &str = "--help";

/// Result of one smoke-test run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfTestReport {
    pub binary: PathBuf,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Invoke `<binary> --help`. Success is exit code 0; any exit code is
/// returned as a report, only a binary that cannot be run is an error.
pub fn self_test(layout: &InstallLayout) -> Result<SelfTestReport, InstallError> {
    let binary = layout.binary_path.clone();
    if !is_executable(&binary) {
        return Err(InstallError::SelfTest {
            path: binary,
            reason: "binary is not installed or not executable".to_string(),
        });
    }

    let mut command = Command::new(&binary);
    command
        .arg(HELP_FLAG)
        .env(ENV_PATH_VAR, layout.config_file())
        .stdin(Stdio::null());
    if layout.config_dir.is_dir() {
        command.current_dir(&layout.config_dir);
    }

    let output = command.output().map_err(|e| InstallError::SelfTest {
        path: binary.clone(),
        reason: e.to_string(),
    })?;

    let report = SelfTestReport {
        binary,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    tracing::info!(
        binary = %report.binary.display(),
        exit_code = ?report.exit_code,
        "self-test finished"
    );
    Ok(report)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use formulary_core::FormulaName;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn install_script(prefix: &std::path::Path, body: &str) -> InstallLayout {
        let layout = InstallLayout::new(prefix, &FormulaName::from("demo"), "demo.sh");
        layout.ensure_dirs().unwrap();
        std::fs::write(&layout.binary_path, body).unwrap();
        std::fs::set_permissions(&layout.binary_path, std::fs::Permissions::from_mode(0o755))
            .unwrap();
        layout
    }

    #[test]
    fn help_exit_zero_passes() {
        let tmp = TempDir::new().unwrap();
        let layout = install_script(
            tmp.path(),
            "#!/bin/sh\n[ \"$1\" = \"--help\" ] && { echo \"usage: demo\"; exit 0; }\nexit 3\n",
        );
        let report = self_test(&layout).unwrap();
        assert!(report.passed());
        assert_eq!(report.stdout.trim(), "usage: demo");
    }

    #[test]
    fn env_path_is_injected() {
        let tmp = TempDir::new().unwrap();
        let layout = install_script(tmp.path(), "#!/bin/sh\necho \"$ENV_PATH\"\n");
        let report = self_test(&layout).unwrap();
        assert_eq!(
            report.stdout.trim(),
            layout.config_file().display().to_string()
        );
    }

    #[test]
    fn nonzero_exit_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        let layout = install_script(tmp.path(), "#!/bin/sh\nexit 2\n");
        let report = self_test(&layout).unwrap();
        assert!(!report.passed());
        assert_eq!(report.exit_code, Some(2));
    }

    #[test]
    fn missing_binary_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let layout = InstallLayout::new(tmp.path(), &FormulaName::from("demo"), "demo.sh");
        let err = self_test(&layout).unwrap_err();
        assert!(matches!(err, InstallError::SelfTest { .. }), "got: {err}");
    }
}
