pub mod caveats;
pub mod describe;
pub mod install;
pub mod list;
pub mod service;
pub mod uninstall;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use formulary_core::{formula, layout, Formula, InstallLayout};
use formulary_render::Renderer;
use formulary_service::{detect_supervisor, Supervisor};

/// Installation prefix shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct PrefixArg {
    /// Installation prefix [default: ~/.formulary].
    #[arg(long, env = "FORMULARY_PREFIX", value_name = "DIR")]
    pub prefix: Option<PathBuf>,
}

impl PrefixArg {
    pub fn resolve(&self) -> Result<PathBuf> {
        match &self.prefix {
            Some(prefix) => Ok(prefix.clone()),
            None => layout::default_prefix().context("could not determine default prefix"),
        }
    }
}

/// A formula file plus the prefix it is installed into.
#[derive(Args, Debug, Clone)]
pub struct FormulaArgs {
    /// Path to the formula YAML file.
    pub formula: PathBuf,

    #[command(flatten)]
    pub prefix: PrefixArg,
}

impl FormulaArgs {
    pub fn load(&self) -> Result<(Formula, InstallLayout)> {
        let formula = formula::load(&self.formula)
            .with_context(|| format!("failed to load formula {}", self.formula.display()))?;
        let prefix = self.prefix.resolve()?;
        let layout = InstallLayout::for_formula(&prefix, &formula);
        Ok((formula, layout))
    }

    /// How the formula is named in printed commands.
    pub fn formula_ref(&self) -> String {
        self.formula.display().to_string()
    }
}

pub fn renderer(layout: &InstallLayout) -> Result<Renderer> {
    let dir = layout.template_override_dir();
    Renderer::with_overrides(&dir)
        .with_context(|| format!("failed to load templates from {}", dir.display()))
}

pub fn supervisor(layout: &InstallLayout) -> Result<Box<dyn Supervisor>> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(detect_supervisor(&home, renderer(layout)?))
}
