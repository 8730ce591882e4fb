use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use formulary_core::ServiceDescriptor;
use formulary_render::{Renderer, UnitKind};

use crate::error::{io_err, ServiceError};
use crate::paths::{systemd_unit_name, systemd_unit_path};
use crate::supervisor::{Supervisor, SupervisorKind};

/// systemd user unit, managed through `systemctl --user`.
pub struct Systemd {
    home: PathBuf,
    renderer: Renderer,
}

impl Systemd {
    pub fn new(home: &Path, renderer: Renderer) -> Self {
        Self {
            home: home.to_path_buf(),
            renderer,
        }
    }
}

fn unit_name(descriptor: &ServiceDescriptor) -> String {
    systemd_unit_name(&descriptor.name.0)
}

impl Supervisor for Systemd {
    fn kind(&self) -> SupervisorKind {
        SupervisorKind::Systemd
    }

    fn unit_path(&self, descriptor: &ServiceDescriptor) -> PathBuf {
        systemd_unit_path(&self.home, &descriptor.name.0)
    }

    fn render_unit(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
    ) -> Result<String, ServiceError> {
        Ok(self
            .renderer
            .render(descriptor, formula_ref, UnitKind::Systemd)?)
    }

    fn activate(&self, descriptor: &ServiceDescriptor, _unit: &Path) -> Result<(), ServiceError> {
        run_systemctl(&["daemon-reload"], false)?;
        // restart rather than start so an upgrade picks up the new unit.
        run_systemctl(&["enable", &unit_name(descriptor)], false)?;
        run_systemctl(&["restart", &unit_name(descriptor)], false)
    }

    fn unregister(&self, descriptor: &ServiceDescriptor) -> Result<bool, ServiceError> {
        let unit = self.unit_path(descriptor);
        if !unit.exists() {
            return Ok(false);
        }
        let _ = run_systemctl(&["disable", "--now", &unit_name(descriptor)], true);
        fs::remove_file(&unit).map_err(|e| io_err(&unit, e))?;
        let _ = run_systemctl(&["daemon-reload"], true);
        Ok(true)
    }

    fn start(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError> {
        run_systemctl(&["start", &unit_name(descriptor)], false)
    }

    fn stop(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError> {
        run_systemctl(&["stop", &unit_name(descriptor)], false)
    }

    fn is_active(&self, descriptor: &ServiceDescriptor) -> bool {
        run_systemctl(&["is-active", "--quiet", &unit_name(descriptor)], false).is_ok()
    }
}

fn run_systemctl(args: &[&str], ignore_failure: bool) -> Result<(), ServiceError> {
    let output = Command::new("systemctl")
        .arg("--user")
        .args(args)
        .output()
        .map_err(|e| io_err("systemctl", e))?;

    if output.status.success() || ignore_failure {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(ServiceError::Systemd(format!(
        "systemctl --user {} failed (status {}): {}",
        args.join(" "),
        output.status,
        stderr
    )))
}
