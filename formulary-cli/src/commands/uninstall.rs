//! `formulary uninstall <formula.yaml>`

use anyhow::{Context, Result};

use formulary_core::describe_service;

use super::{supervisor, FormulaArgs};

pub fn run(args: FormulaArgs) -> Result<()> {
    let (formula, layout) = args.load()?;
    let descriptor = describe_service(&layout);

    let supervisor = supervisor(&layout)?;
    if supervisor
        .unregister(&descriptor)
        .with_context(|| format!("failed to unregister {} service", supervisor.kind()))?
    {
        println!("✓ unregistered {} service", supervisor.kind());
    }

    let report = formulary_install::uninstall(&layout)
        .with_context(|| format!("failed to uninstall {}", formula.name))?;
    if !report.binary_removed && !report.receipt_removed {
        println!("'{}' is not installed", formula.name);
        return Ok(());
    }
    println!("✓ uninstalled '{}'", formula.name);
    println!("  config kept: {}", layout.config_dir.display());
    println!("  log kept:    {}", layout.log_path.display());
    Ok(())
}
