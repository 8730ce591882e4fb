//! Formulary: install a released client and run it as a supervised service.
//!
//! # Usage
//!
//! ```text
//! formulary install <formula.yaml> [--prefix P] [--no-service] [--skip-test]
//! formulary uninstall <formula.yaml> [--prefix P]
//! formulary describe <formula.yaml> [--prefix P] [--format json|yaml|launchd|systemd]
//! formulary caveats <formula.yaml> [--prefix P]
//! formulary test <formula.yaml> [--prefix P]
//! formulary list [--prefix P] [--json]
//! formulary service start|stop|status|run|logs <formula.yaml> [--prefix P]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    describe::DescribeArgs, install::InstallArgs, list::ListArgs, service::ServiceCommand,
    FormulaArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "formulary",
    version,
    about = "Install released clients and run them under the host supervisor",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, verify and install a formula, then register its service.
    Install(InstallArgs),

    /// Unregister the service and remove the executable. Config and log stay.
    Uninstall(FormulaArgs),

    /// Print the service descriptor or a rendered unit file.
    Describe(DescribeArgs),

    /// Print post-install notes: config file, service commands, log location.
    Caveats(FormulaArgs),

    /// Run the installed executable with `--help`.
    Test(FormulaArgs),

    /// List installed packages.
    List(ListArgs),

    /// Control the registered service.
    Service {
        #[command(subcommand)]
        command: ServiceCommand,
    },
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Install(args) => args.run(),
        Commands::Uninstall(args) => commands::uninstall::run(args),
        Commands::Describe(args) => args.run(),
        Commands::Caveats(args) => commands::caveats::run(args),
        Commands::Test(args) => commands::test::run(args),
        Commands::List(args) => args.run(),
        Commands::Service { command } => commands::service::run(command),
    }
}
