//! Staged install pipeline: fetch → verify → extract → copy → receipt.
//!
//! ## State machine
//!
//! `Uninstalled → Fetched → Verified → Installed → ServiceRegistered`
//!
//! Transitions only move forward. Integrity is checked before anything is
//! unpacked, and the executable is the last file to land, so a failure at any
//! stage leaves the previously installed binary (if any) untouched.
//! `ServiceRegistered` is reached by the caller once a supervisor has
//! accepted the descriptor.

use std::fmt;

use chrono::Utc;
use semver::Version;

use formulary_core::{Artifact, Formula, InstallLayout};

use crate::archive;
use crate::deps;
use crate::error::{fs_err, InstallError, Stage};
use crate::fetch::{self, Fetcher};
use crate::receipt::{self, InstallReceipt};
use crate::writer::{self, ConfigOutcome, WriteResult};

/// Lifecycle of one package on one prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InstallState {
    Uninstalled,
    Fetched,
    Verified,
    Installed,
    ServiceRegistered,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallState::Uninstalled => "uninstalled",
            InstallState::Fetched => "fetched",
            InstallState::Verified => "verified",
            InstallState::Installed => "installed",
            InstallState::ServiceRegistered => "service-registered",
        };
        f.write_str(s)
    }
}

impl InstallState {
    /// Move to `next`. Transitions never go backwards.
    #[must_use]
    pub fn advance(self, next: InstallState, artifact: &Artifact) -> InstallState {
        debug_assert!(next > self, "install state moved backwards: {self} -> {next}");
        tracing::info!(artifact = %artifact, from = %self, to = %next, "install stage");
        next
    }
}

/// Summary of one `install_formula` run.
#[derive(Debug, Clone)]
pub struct InstallReport {
    pub artifact: Artifact,
    pub state: InstallState,
    /// Version recorded by the previous receipt, if any.
    pub previous_version: Option<Version>,
    pub binary: WriteResult,
    pub config: ConfigOutcome,
    /// `depends_on` commands not found on `PATH`.
    pub missing_dependencies: Vec<String>,
    pub receipt: InstallReceipt,
}

impl InstallReport {
    pub fn is_upgrade(&self) -> bool {
        self.previous_version
            .as_ref()
            .is_some_and(|prev| *prev < self.artifact.version)
    }

    /// Record that a supervisor accepted the service.
    pub fn mark_service_registered(&mut self) {
        self.state = self
            .state
            .advance(InstallState::ServiceRegistered, &self.artifact);
    }
}

/// Fetch, verify and install `formula` into `layout`.
pub fn install_formula(
    formula: &Formula,
    layout: &InstallLayout,
    fetcher: &dyn Fetcher,
) -> Result<InstallReport, InstallError> {
    let artifact = formula.artifact();
    let mut state = InstallState::Uninstalled;

    let previous = match receipt::load(layout) {
        Ok(previous) => previous,
        Err(err) => {
            tracing::warn!(error = %err, "ignoring unreadable install receipt");
            None
        }
    };

    let missing_dependencies = deps::missing_dependencies(formula);
    for dep in &missing_dependencies {
        tracing::warn!(dependency = %dep, "dependency not found on PATH");
    }

    let bytes = fetcher.fetch(&artifact.url)?;
    state = state.advance(InstallState::Fetched, &artifact);

    let archive_sha256 = fetch::verify(&artifact, &bytes)?;
    state = state.advance(InstallState::Verified, &artifact);

    layout.ensure_dirs()?;
    let staging = archive::unpack(&bytes, &layout.state_dir())?;
    let executable = staging.locate(&formula.install.executable, "executable")?;
    let template = staging.find(&formula.install.config_template);

    let template_existed = layout.config_template().exists();
    let config = writer::seed_config(template.as_deref(), layout)?;
    let binary = match writer::install_executable(&executable, &layout.binary_path) {
        Ok(binary) => binary,
        Err(err) => {
            discard_seeded_config(layout, &config, template_existed);
            return Err(err);
        }
    };
    state = state.advance(InstallState::Installed, &artifact);

    let receipt = InstallReceipt {
        name: formula.name.clone(),
        version: formula.version.clone(),
        url: formula.url.clone(),
        archive_sha256,
        binary_path: layout.binary_path.clone(),
        binary_sha256: binary.sha256().to_string(),
        installed_at: Utc::now(),
        service: previous.as_ref().and_then(|p| p.service.clone()),
    };
    receipt::save(layout, &receipt)?;

    Ok(InstallReport {
        artifact,
        state,
        previous_version: previous.map(|p| p.version),
        binary,
        config,
        missing_dependencies,
        receipt,
    })
}

/// Undo a first-time seed when the install it belonged to did not commit.
/// A preserved config is never touched.
fn discard_seeded_config(layout: &InstallLayout, config: &ConfigOutcome, template_existed: bool) {
    let ConfigOutcome::Seeded { path } = config else {
        return;
    };
    let mut seeded = vec![path.clone()];
    if !template_existed {
        seeded.push(layout.config_template());
    }
    for path in seeded {
        if let Err(err) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %err, "could not remove seeded config");
        }
    }
}

/// What `uninstall` removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UninstallReport {
    pub binary_removed: bool,
    pub receipt_removed: bool,
}

/// Remove the executable and the receipt. The config directory and the log
/// file belong to the user and are left in place.
pub fn uninstall(layout: &InstallLayout) -> Result<UninstallReport, InstallError> {
    let binary_removed = match std::fs::remove_file(&layout.binary_path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => return Err(fs_err(Stage::Copy, &layout.binary_path, e)),
    };
    let receipt_removed = receipt::remove(layout)?;
    tracing::info!(
        name = %layout.name,
        binary_removed,
        receipt_removed,
        "uninstalled"
    );
    Ok(UninstallReport {
        binary_removed,
        receipt_removed,
    })
}
