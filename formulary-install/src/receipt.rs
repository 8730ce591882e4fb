//! Install receipts: what is installed under a prefix, and from where.
//!
//! Persists an [`InstallReceipt`] JSON document at
//! `<prefix>/var/formulary/receipts/<name>.json`.
//! Writes use the atomic `.tmp` + rename pattern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use formulary_core::layout::receipts_dir_at;
use formulary_core::{FormulaName, InstallLayout};

use crate::error::{fs_err, InstallError, Stage};

/// A service unit registered with a host supervisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceRecord {
    /// Supervisor back-end name (`launchd`, `systemd`, …).
    pub supervisor: String,
    pub unit_path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

/// On-disk record of one installed package.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallReceipt {
    pub name: FormulaName,
    pub version: Version,
    pub url: String,
    pub archive_sha256: String,
    pub binary_path: PathBuf,
    pub binary_sha256: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceRecord>,
}

/// Load the receipt for `layout`. Returns `None` if nothing is installed.
pub fn load(layout: &InstallLayout) -> Result<Option<InstallReceipt>, InstallError> {
    load_path(&layout.receipt_path())
}

fn load_path(path: &Path) -> Result<Option<InstallReceipt>, InstallError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|e| fs_err(Stage::Receipt, path, e))?;
    let receipt = serde_json::from_str(&contents).map_err(|e| InstallError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(receipt))
}

/// Save the receipt atomically: write `<path>.tmp` then rename to `<path>`.
pub fn save(layout: &InstallLayout, receipt: &InstallReceipt) -> Result<(), InstallError> {
    let path = layout.receipt_path();
    let dir = layout.receipts_dir();
    std::fs::create_dir_all(&dir).map_err(|e| fs_err(Stage::Receipt, &dir, e))?;

    let json = serde_json::to_string_pretty(receipt).map_err(|e| InstallError::Json {
        path: path.clone(),
        source: e,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| fs_err(Stage::Receipt, &tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| fs_err(Stage::Receipt, &path, e))?;
    Ok(())
}

/// Record (or clear) the registered service on an existing receipt.
pub fn set_service(
    layout: &InstallLayout,
    service: Option<ServiceRecord>,
) -> Result<Option<InstallReceipt>, InstallError> {
    let Some(mut receipt) = load(layout)? else {
        return Ok(None);
    };
    receipt.service = service;
    save(layout, &receipt)?;
    Ok(Some(receipt))
}

/// Delete the receipt. Returns `false` if there was none.
pub fn remove(layout: &InstallLayout) -> Result<bool, InstallError> {
    let path = layout.receipt_path();
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(fs_err(Stage::Receipt, &path, e)),
    }
}

/// All receipts under `prefix`, sorted by package name.
pub fn list_at(prefix: &Path) -> Result<Vec<InstallReceipt>, InstallError> {
    let dir = receipts_dir_at(prefix);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut receipts = Vec::new();
    let entries = std::fs::read_dir(&dir).map_err(|e| fs_err(Stage::Receipt, &dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| fs_err(Stage::Receipt, &dir, e))?.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(receipt) = load_path(&path)? {
            receipts.push(receipt);
        }
    }
    receipts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(receipts)
}
