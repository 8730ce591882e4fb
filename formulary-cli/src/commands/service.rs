//! `formulary service`: control the registered service.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use formulary_core::describe_service;
use formulary_install::receipt;
use formulary_service::{run_blocking, RestartPolicy};

use super::{supervisor, FormulaArgs};

#[derive(Subcommand, Debug)]
pub enum ServiceCommand {
    /// Start (or restart) the registered service.
    Start(FormulaArgs),
    /// Stop the service; it stays registered.
    Stop(FormulaArgs),
    /// Show registration, state and log location.
    Status(FormulaArgs),
    /// Supervise the client in the foreground until Ctrl-C.
    Run(RunArgs),
    /// Print recent log lines.
    Logs(LogsArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: FormulaArgs,

    /// Stop after this many launches.
    #[arg(long)]
    pub max_launches: Option<u32>,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(flatten)]
    pub target: FormulaArgs,

    /// Number of trailing lines to show.
    #[arg(long, default_value_t = 100)]
    pub lines: usize,
}

pub fn run(command: ServiceCommand) -> Result<()> {
    match command {
        ServiceCommand::Start(args) => {
            let (formula, layout) = args.load()?;
            let supervisor = supervisor(&layout)?;
            supervisor
                .start(&describe_service(&layout))
                .with_context(|| format!("failed to start '{}'", formula.name))?;
            println!("✓ started '{}'", formula.name);
        }
        ServiceCommand::Stop(args) => {
            let (formula, layout) = args.load()?;
            let supervisor = supervisor(&layout)?;
            supervisor
                .stop(&describe_service(&layout))
                .with_context(|| format!("failed to stop '{}'", formula.name))?;
            println!("✓ stopped '{}'", formula.name);
        }
        ServiceCommand::Status(args) => {
            let (formula, layout) = args.load()?;
            let descriptor = describe_service(&layout);
            let supervisor = supervisor(&layout)?;
            let installed = receipt::load(&layout).context("failed to read install receipt")?;

            let state = if !supervisor.is_registered(&descriptor) {
                "not registered".dimmed()
            } else if supervisor.is_active(&descriptor) {
                "running".green()
            } else {
                "stopped".yellow()
            };
            println!("{} ({})", formula.name.to_string().bold(), descriptor.label());
            println!(
                "  installed:  {}",
                installed.map_or_else(|| "no".to_string(), |r| r.version.to_string())
            );
            println!("  supervisor: {}", supervisor.kind());
            println!("  state:      {state}");
            println!("  unit:       {}", supervisor.unit_path(&descriptor).display());
            println!("  log:        {}", descriptor.log_path.display());
        }
        ServiceCommand::Run(args) => {
            let (_, layout) = args.target.load()?;
            let descriptor = describe_service(&layout);
            let mut policy = RestartPolicy::from_descriptor(&descriptor);
            if let Some(max) = args.max_launches {
                policy = policy.with_max_launches(max);
            }
            let summary =
                run_blocking(&descriptor, policy).context("foreground supervisor failed")?;
            println!(
                "✓ supervised {} launch(es), {} interval restart(s)",
                summary.launches, summary.interval_kills
            );
        }
        ServiceCommand::Logs(args) => {
            let (_, layout) = args.target.load()?;
            print_tail(&layout.log_path, args.lines).context("failed to read service log")?;
        }
    }

    Ok(())
}

fn print_tail(path: &Path, lines: usize) -> Result<()> {
    if !path.exists() {
        println!("log file not found: {}", path.display());
        return Ok(());
    }

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut tail = VecDeque::<String>::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if lines == 0 {
            continue;
        }
        if tail.len() == lines {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    println!("==> {} <==", path.display());
    for line in tail {
        println!("{line}");
    }
    Ok(())
}
