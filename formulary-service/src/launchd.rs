use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use formulary_core::ServiceDescriptor;
use formulary_render::{Renderer, UnitKind};

use crate::error::{io_err, ServiceError};
use crate::paths::launchd_plist_path;
use crate::supervisor::{Supervisor, SupervisorKind};

/// macOS per-user launch agent.
pub struct Launchd {
    home: PathBuf,
    renderer: Renderer,
}

impl Launchd {
    pub fn new(home: &Path, renderer: Renderer) -> Self {
        Self {
            home: home.to_path_buf(),
            renderer,
        }
    }
}

impl Supervisor for Launchd {
    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Launchd
    }

    fn unit_path(&self, descriptor: &ServiceDescriptor) -> PathBuf {
        launchd_plist_path(&self.home, &descriptor.label())
    }

    fn render_unit(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
    ) -> Result<String, ServiceError> {
        Ok(self
            .renderer
            .render(descriptor, formula_ref, UnitKind::Launchd)?)
    }

    fn activate(&self, descriptor: &ServiceDescriptor, unit: &Path) -> Result<(), ServiceError> {
        ensure_macos()?;
        let domain = launchctl_domain()?;
        let service = format!("{domain}/{}", descriptor.label());

        // A previous version may still be loaded.
        let _ = run_launchctl(vec!["bootout".to_string(), service], true);
        run_launchctl(
            vec!["bootstrap".to_string(), domain, unit.display().to_string()],
            false,
        )
    }

    fn unregister(&self, descriptor: &ServiceDescriptor) -> Result<bool, ServiceError> {
        let plist = self.unit_path(descriptor);
        if !plist.exists() {
            return Ok(false);
        }
        ensure_macos()?;
        let domain = launchctl_domain()?;
        let _ = run_launchctl(
            vec!["bootout".to_string(), format!("{domain}/{}", descriptor.label())],
            true,
        );
        fs::remove_file(&plist).map_err(|e| io_err(&plist, e))?;
        Ok(true)
    }

    fn start(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError> {
        ensure_macos()?;
        let domain = launchctl_domain()?;
        let plist = self.unit_path(descriptor);
        // Already-loaded agents reject bootstrap; kickstart covers both cases.
        let _ = run_launchctl(
            vec!["bootstrap".to_string(), domain.clone(), plist.display().to_string()],
            true,
        );
        run_launchctl(
            vec![
                "kickstart".to_string(),
                "-k".to_string(),
                format!("{domain}/{}", descriptor.label()),
            ],
            false,
        )
    }

    /// Boot the agent out; with `KeepAlive` a plain kill would be relaunched.
    fn stop(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError> {
        ensure_macos()?;
        let domain = launchctl_domain()?;
        run_launchctl(
            vec!["bootout".to_string(), format!("{domain}/{}", descriptor.label())],
            true,
        )
    }

    fn is_active(&self, descriptor: &ServiceDescriptor) -> bool {
        if ensure_macos().is_err() {
            return false;
        }
        let Ok(domain) = launchctl_domain() else {
            return false;
        };
        run_launchctl(
            vec!["print".to_string(), format!("{domain}/{}", descriptor.label())],
            false,
        )
        .is_ok()
    }
}

#[cfg(target_os = "macos")]
fn ensure_macos() -> Result<(), ServiceError> {
    Ok(())
}

#[cfg(not(target_os = "macos"))]
fn ensure_macos() -> Result<(), ServiceError> {
    Err(ServiceError::Launchd(
        "launchd management is only supported on macOS".to_string(),
    ))
}

fn run_launchctl(args: Vec<String>, ignore_failure: bool) -> Result<(), ServiceError> {
    let output = Command::new("launchctl")
        .args(args.iter().map(String::as_str))
        .output()
        .map_err(|e| io_err("launchctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Err(ServiceError::Launchd(format!(
        "launchctl {} failed (status {}): {} {}",
        args.first().map(String::as_str).unwrap_or_default(),
        output.status,
        stdout,
        stderr
    )))
}

fn launchctl_domain() -> Result<String, ServiceError> {
    let output = Command::new("id")
        .arg("-u")
        .output()
        .map_err(|e| io_err("id -u", e))?;
    if !output.status.success() {
        return Err(ServiceError::Launchd(format!(
            "failed to resolve current uid (status {})",
            output.status
        )));
    }

    let uid = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if uid.is_empty() {
        return Err(ServiceError::Launchd(
            "current uid from `id -u` was empty".to_string(),
        ));
    }
    Ok(format!("gui/{uid}"))
}
