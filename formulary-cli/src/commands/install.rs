//! `formulary install <formula.yaml> [--no-service] [--skip-test]`

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;

use formulary_core::describe_service;
use formulary_install::{
    install_formula, receipt, self_test, ConfigOutcome, ServiceRecord, SourceFetcher,
    WriteResult,
};

use super::{renderer, supervisor, FormulaArgs};

#[derive(Args, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: FormulaArgs,

    /// Install files only; do not register a service.
    #[arg(long)]
    pub no_service: bool,

    /// Skip the `--help` smoke test.
    #[arg(long)]
    pub skip_test: bool,
}

impl InstallArgs {
    pub fn run(self) -> Result<()> {
        let (formula, layout) = self.target.load()?;
        let formula_ref = self.target.formula_ref();

        println!(
            "{} {} {}",
            "==>".blue().bold(),
            "Installing".bold(),
            formula.artifact()
        );
        let mut report = install_formula(&formula, &layout, &SourceFetcher::new())
            .with_context(|| format!("failed to install {}", formula.artifact()))?;

        for dep in &report.missing_dependencies {
            println!(
                "{} dependency '{dep}' was not found on PATH",
                "warning:".yellow().bold()
            );
        }
        if let Some(previous) = &report.previous_version {
            if report.is_upgrade() {
                println!("  upgraded from {previous}");
            }
        }
        match &report.binary {
            WriteResult::Written { path, .. } => println!("✓ installed {}", path.display()),
            WriteResult::Unchanged { path, .. } => {
                println!("✓ {} already up to date", path.display())
            }
        }
        match &report.config {
            ConfigOutcome::Seeded { path } => println!("✓ seeded config {}", path.display()),
            ConfigOutcome::Preserved { path } => {
                println!("✓ kept existing config {}", path.display())
            }
            ConfigOutcome::NoTemplate => println!(
                "{} archive has no {}; no config seeded",
                "warning:".yellow().bold(),
                formula.install.config_template.display()
            ),
        }

        if !self.skip_test {
            let result = self_test(&layout).context("self-test could not run")?;
            if !result.passed() {
                bail!(
                    "self-test failed: `{} --help` exited with {}\n{}",
                    result.binary.display(),
                    result
                        .exit_code
                        .map_or_else(|| "a signal".to_string(), |c| c.to_string()),
                    result.stderr.trim()
                );
            }
            println!("✓ self-test passed");
        }

        let descriptor = describe_service(&layout);
        if !self.no_service {
            let supervisor = supervisor(&layout)?;
            let unit = supervisor
                .register(&descriptor, &formula_ref)
                .with_context(|| format!("failed to register {} service", supervisor.kind()))?;
            receipt::set_service(
                &layout,
                Some(ServiceRecord {
                    supervisor: supervisor.kind().to_string(),
                    unit_path: unit.clone(),
                    registered_at: Utc::now(),
                }),
            )
            .context("failed to record service registration")?;
            report.mark_service_registered();
            println!("✓ registered {} service {}", supervisor.kind(), unit.display());
        }
        println!("  {} is {}", report.artifact, report.state);

        let caveats = renderer(&layout)?
            .caveats(&descriptor, &formula, &formula_ref)
            .context("failed to render caveats")?;
        println!();
        println!("{}", "==> Caveats".blue().bold());
        print!("{caveats}");
        Ok(())
    }
}
