//! The service descriptor: how a host supervisor runs the installed client.
//!
//! A [`ServiceDescriptor`] is plain data produced by [`describe_service`], a
//! pure function of the [`InstallLayout`]. Supervisor back-ends translate it
//! into launchd plists, systemd units, or drive it directly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::InstallLayout;
use crate::types::FormulaName;

/// The supervisor relaunches the client whenever it exits, even with status 0.
pub const KEEP_ALIVE: bool = true;

/// Restart cadence: the supervisor cycles the client every 300 seconds.
pub const RESTART_INTERVAL_SECS: u64 = 300;

/// Minimum seconds between two launches, so a client that exits immediately
/// is not relaunched in a tight loop.
pub const RESTART_THROTTLE_SECS: u64 = 10;

/// Environment variable pointing the client at its env file.
pub const ENV_PATH_VAR: &str = "ENV_PATH";

/// Reverse-DNS prefix of the supervisor label (`dev.formulary.<name>`).
pub const LABEL_PREFIX: &str = "dev.formulary";

/// Declarative record of how a supervisor should run and restart the client.
///
/// `keep_alive` and `interval` are structural: they never depend on the
/// version or the archive contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: FormulaName,
    /// Executable to launch; always run with no arguments.
    pub program: PathBuf,
    pub working_dir: PathBuf,
    pub keep_alive: bool,
    /// Restart cadence in seconds.
    pub interval: u64,
    pub log_path: PathBuf,
    pub error_log_path: PathBuf,
    pub environment: BTreeMap<String, String>,
}

impl ServiceDescriptor {
    /// Full argv, program first.
    pub fn run_command(&self) -> Vec<String> {
        vec![self.program.display().to_string()]
    }

    /// Supervisor label, unique per package.
    pub fn label(&self) -> String {
        format!("{LABEL_PREFIX}.{}", self.name)
    }

    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// `true` when stdout and stderr are routed to the same file.
    pub fn combined_log(&self) -> bool {
        self.log_path == self.error_log_path
    }
}

/// Build the descriptor for the client installed at `layout`.
pub fn describe_service(layout: &InstallLayout) -> ServiceDescriptor {
    let mut environment = BTreeMap::new();
    environment.insert(
        ENV_PATH_VAR.to_string(),
        layout.config_file().display().to_string(),
    );

    ServiceDescriptor {
        name: layout.name.clone(),
        program: layout.binary_path.clone(),
        working_dir: layout.config_dir.clone(),
        keep_alive: KEEP_ALIVE,
        interval: RESTART_INTERVAL_SECS,
        log_path: layout.log_path.clone(),
        error_log_path: layout.log_path.clone(),
        environment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn layout(prefix: &str) -> InstallLayout {
        InstallLayout::new(
            Path::new(prefix),
            &FormulaName::from("ha-apple_content_cache-client"),
            "ha_apple_content_cache_client.sh",
        )
    }

    #[test]
    fn descriptor_has_structural_keep_alive_and_interval() {
        let d = describe_service(&layout("/opt/fm"));
        assert!(d.keep_alive);
        assert_eq!(d.interval, 300);
        assert_eq!(d.interval_duration(), Duration::from_secs(300));
    }

    #[test]
    fn run_command_is_binary_without_arguments() {
        let d = describe_service(&layout("/opt/fm"));
        assert_eq!(
            d.run_command(),
            vec!["/opt/fm/bin/ha_apple_content_cache_client.sh".to_string()]
        );
    }

    #[test]
    fn stdout_and_stderr_share_one_log_file() {
        let d = describe_service(&layout("/opt/fm"));
        assert!(d.combined_log());
        assert_eq!(
            d.log_path,
            PathBuf::from("/opt/fm/var/log/ha-apple_content_cache-client.log")
        );
    }

    #[test]
    fn label_is_derived_from_package_name() {
        let d = describe_service(&layout("/opt/fm"));
        assert_eq!(d.label(), "dev.formulary.ha-apple_content_cache-client");
    }

    #[test]
    fn env_path_points_at_config_file() {
        let d = describe_service(&layout("/opt/fm"));
        assert_eq!(d.environment.len(), 1);
        assert_eq!(
            d.environment.get(ENV_PATH_VAR).map(String::as_str),
            Some("/opt/fm/etc/ha-apple_content_cache-client/.env")
        );
    }
}
