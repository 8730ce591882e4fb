//! `formulary list [--json]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use formulary_install::receipt;

use super::PrefixArg;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub prefix: PrefixArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct ReceiptRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "version")]
    version: String,
    #[tabled(rename = "installed")]
    installed: String,
    #[tabled(rename = "service")]
    service: String,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let prefix = self.prefix.resolve()?;
        let receipts = receipt::list_at(&prefix)
            .with_context(|| format!("failed to read receipts under {}", prefix.display()))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&receipts).context("failed to render JSON")?
            );
            return Ok(());
        }

        if receipts.is_empty() {
            println!("Nothing installed under {}", prefix.display());
            return Ok(());
        }

        let rows: Vec<ReceiptRow> = receipts
            .iter()
            .map(|r| ReceiptRow {
                name: r.name.to_string(),
                version: r.version.to_string(),
                installed: r.installed_at.format("%Y-%m-%d %H:%M UTC").to_string(),
                service: match &r.service {
                    Some(s) => s.supervisor.green().to_string(),
                    None => "-".dimmed().to_string(),
                },
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}
