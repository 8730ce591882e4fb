use std::path::{Path, PathBuf};

/// File-name prefix of systemd user units (`formulary-<name>.service`).
pub const SYSTEMD_UNIT_PREFIX: &str = "formulary";

pub fn launch_agents_dir(home: &Path) -> PathBuf {
    home.join("Library").join("LaunchAgents")
}

pub fn launchd_plist_path(home: &Path, label: &str) -> PathBuf {
    launch_agents_dir(home).join(format!("{label}.plist"))
}

pub fn systemd_user_dir(home: &Path) -> PathBuf {
    home.join(".config").join("systemd").join("user")
}

pub fn systemd_unit_name(name: &str) -> String {
    format!("{SYSTEMD_UNIT_PREFIX}-{name}.service")
}

pub fn systemd_unit_path(home: &Path, name: &str) -> PathBuf {
    systemd_user_dir(home).join(systemd_unit_name(name))
}
