//! The [`Supervisor`] seam between a [`ServiceDescriptor`] and the host's
//! service manager.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use formulary_core::ServiceDescriptor;
use formulary_render::{Renderer, UnitKind};

use crate::error::{io_err, ServiceError};
use crate::launchd::Launchd;
use crate::systemd::Systemd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorKind {
    Launchd,
    Systemd,
}

impl SupervisorKind {
    /// launchd on macOS, systemd everywhere else.
    pub fn detect() -> Self {
        if cfg!(target_os = "macos") {
            SupervisorKind::Launchd
        } else {
            SupervisorKind::Systemd
        }
    }

    pub fn unit_kind(&self) -> UnitKind {
        match self {
            SupervisorKind::Launchd => UnitKind::Launchd,
            SupervisorKind::Systemd => UnitKind::Systemd,
        }
    }
}

impl fmt::Display for SupervisorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorKind::Launchd => f.write_str("launchd"),
            SupervisorKind::Systemd => f.write_str("systemd"),
        }
    }
}

/// A host service manager that runs a descriptor with keep-alive and
/// interval restarts.
pub trait Supervisor {
    fn kind(&self) -> SupervisorKind;

    /// Where the unit file for `descriptor` lives.
    fn unit_path(&self, descriptor: &ServiceDescriptor) -> PathBuf;

    fn render_unit(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
    ) -> Result<String, ServiceError>;

    /// Load the unit at `unit` into the service manager and start it.
    fn activate(&self, descriptor: &ServiceDescriptor, unit: &Path) -> Result<(), ServiceError>;

    /// Unload the service and delete its unit file. Returns `false` when no
    /// unit was registered.
    fn unregister(&self, descriptor: &ServiceDescriptor) -> Result<bool, ServiceError>;

    fn start(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError>;

    fn stop(&self, descriptor: &ServiceDescriptor) -> Result<(), ServiceError>;

    /// Whether the service manager reports the service as loaded/running.
    fn is_active(&self, descriptor: &ServiceDescriptor) -> bool;

    fn is_registered(&self, descriptor: &ServiceDescriptor) -> bool {
        self.unit_path(descriptor).is_file()
    }

    /// Render and atomically write the unit file without activating it.
    fn write_unit(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
    ) -> Result<PathBuf, ServiceError> {
        let path = self.unit_path(descriptor);
        let contents = self.render_unit(descriptor, formula_ref)?;
        write_atomic(&path, &contents)?;
        tracing::debug!(path = %path.display(), supervisor = %self.kind(), "wrote unit file");
        Ok(path)
    }

    /// Write the unit file, then activate it.
    fn register(
        &self,
        descriptor: &ServiceDescriptor,
        formula_ref: &str,
    ) -> Result<PathBuf, ServiceError> {
        let path = self.write_unit(descriptor, formula_ref)?;
        self.activate(descriptor, &path)?;
        tracing::info!(
            label = %descriptor.label(),
            unit = %path.display(),
            supervisor = %self.kind(),
            "service registered"
        );
        Ok(path)
    }
}

/// The supervisor for this host, rendering with `renderer`.
pub fn detect_supervisor(home: &Path, renderer: Renderer) -> Box<dyn Supervisor> {
    match SupervisorKind::detect() {
        SupervisorKind::Launchd => Box::new(Launchd::new(home, renderer)),
        SupervisorKind::Systemd => Box::new(Systemd::new(home, renderer)),
    }
}

pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(path, e)
    })
}
