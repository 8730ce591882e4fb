//! `formulary describe <formula.yaml> [--format ...]`

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use formulary_core::describe_service;
use formulary_render::UnitKind;

use super::{renderer, FormulaArgs};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum DescribeFormat {
    #[default]
    Json,
    Yaml,
    Launchd,
    Systemd,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub target: FormulaArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = DescribeFormat::Json)]
    pub format: DescribeFormat,
}

impl DescribeArgs {
    pub fn run(self) -> Result<()> {
        let (formula, layout) = self.target.load()?;
        let descriptor = describe_service(&layout);

        let unit_kind = match self.format {
            DescribeFormat::Json => {
                let json = serde_json::to_string_pretty(&descriptor)
                    .context("failed to render descriptor JSON")?;
                println!("{json}");
                return Ok(());
            }
            DescribeFormat::Yaml => {
                let yaml = serde_yaml::to_string(&descriptor)
                    .context("failed to render descriptor YAML")?;
                print!("{yaml}");
                return Ok(());
            }
            DescribeFormat::Launchd => UnitKind::Launchd,
            DescribeFormat::Systemd => UnitKind::Systemd,
        };

        let unit = renderer(&layout)?
            .render_for_formula(&descriptor, &formula, &self.target.formula_ref(), unit_kind)
            .context("failed to render unit file")?;
        print!("{unit}");
        Ok(())
    }
}
