//! Prefix-relative install layout.
//!
//! # Storage layout
//!
//! ```text
//! <prefix>/
//!   bin/<executable>                     (mode 0755)
//!   etc/<name>/.env                      (user-owned after first install)
//!   etc/<name>/.env.example              (bundled template)
//!   var/log/<name>.log                   (stdout + stderr, append-only)
//!   var/formulary/receipts/<name>.json   (install receipt)
//! ```
//!
//! Every path is a pure function of the prefix and the formula; nothing here
//! depends on the version being installed.

use std::path::{Path, PathBuf};

use crate::error::{io_err, FormulaError};
use crate::types::{Formula, FormulaName};

/// Directory name under `$HOME` used when no prefix is given.
pub const DEFAULT_PREFIX_DIR: &str = ".formulary";

/// Name of the env file handed to the client via `ENV_PATH`.
pub const CONFIG_FILE_NAME: &str = ".env";

/// Deterministic install paths for one package under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub prefix: PathBuf,
    pub name: FormulaName,
    pub binary_path: PathBuf,
    pub config_dir: PathBuf,
    pub log_path: PathBuf,
    template_name: String,
}

impl InstallLayout {
    /// Layout for `name` whose executable is installed as `bin/<executable_name>`.
    pub fn new(prefix: &Path, name: &FormulaName, executable_name: &str) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
            name: name.clone(),
            binary_path: prefix.join("bin").join(executable_name),
            config_dir: prefix.join("etc").join(&name.0),
            log_path: prefix.join("var").join("log").join(format!("{}.log", name.0)),
            template_name: ".env.example".to_string(),
        }
    }

    /// Layout derived from a loaded formula.
    pub fn for_formula(prefix: &Path, formula: &Formula) -> Self {
        let mut layout = Self::new(prefix, &formula.name, &formula.executable_name());
        if let Some(template) = formula
            .install
            .config_template
            .file_name()
            .and_then(|s| s.to_str())
        {
            layout.template_name = template.to_string();
        }
        layout
    }

    /// `<config_dir>/.env`: the file exported as `ENV_PATH`.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// `<config_dir>/<template file name>`: reference copy of the template.
    pub fn config_template(&self) -> PathBuf {
        self.config_dir.join(&self.template_name)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.prefix.join("var").join("log")
    }

    /// `<prefix>/var/formulary`: receipts and install staging live here.
    pub fn state_dir(&self) -> PathBuf {
        self.prefix.join("var").join("formulary")
    }

    pub fn receipts_dir(&self) -> PathBuf {
        receipts_dir_at(&self.prefix)
    }

    /// `<prefix>/var/formulary/receipts/<name>.json`
    pub fn receipt_path(&self) -> PathBuf {
        self.receipts_dir().join(format!("{}.json", self.name.0))
    }

    /// `<prefix>/etc/formulary/templates`: user overrides for rendered units.
    pub fn template_override_dir(&self) -> PathBuf {
        self.prefix.join("etc").join("formulary").join("templates")
    }

    /// Path relative to the prefix, for display (`var/log/<name>.log`).
    pub fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.prefix).unwrap_or(path)
    }

    /// Create every directory the layout needs. Existing directories are left
    /// alone; the log file itself is never created or truncated here.
    pub fn ensure_dirs(&self) -> Result<(), FormulaError> {
        for dir in [
            self.bin_dir(),
            self.config_dir.clone(),
            self.log_dir(),
            self.receipts_dir(),
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
            }
        }
        Ok(())
    }
}

/// `<prefix>/var/formulary/receipts`: one JSON receipt per installed package.
pub fn receipts_dir_at(prefix: &Path) -> PathBuf {
    prefix.join("var").join("formulary").join("receipts")
}

/// `<home>/.formulary`: the prefix used when none is configured.
pub fn default_prefix_at(home: &Path) -> PathBuf {
    home.join(DEFAULT_PREFIX_DIR)
}

/// `default_prefix_at` convenience wrapper (uses `dirs::home_dir()`).
pub fn default_prefix() -> Result<PathBuf, FormulaError> {
    let home = dirs::home_dir().ok_or(FormulaError::HomeNotFound)?;
    Ok(default_prefix_at(&home))
}
