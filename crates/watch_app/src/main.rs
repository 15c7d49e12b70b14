mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use watch_logging::watch_error;

use crate::logging::LogDestination;

/// Watches apartment listings and reports new ones, price changes and reposts.
#[derive(Debug, Parser)]
#[command(name = "listing-watch", version)]
struct Cli {
    /// Configuration file (RON).
    #[arg(long, global = true, default_value = "config/listing-watch.ron")]
    config: PathBuf,

    #[arg(long, global = true, value_enum, default_value_t = LogDestination::Terminal)]
    log_dest: LogDestination,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch, classify and notify.
    Run(RunArgs),
    /// Print a summary of the stored listings.
    Report,
    /// Write the stored listings as CSV.
    ExportCsv {
        /// Output file; defaults to `csv_path` from the configuration.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, Args)]
pub(crate) struct RunArgs {
    /// Log messages instead of sending them and keep the state file untouched.
    #[arg(long)]
    dry_run: bool,
    /// Record current listings without notifying (first run).
    #[arg(long)]
    seed: bool,
    /// Repeat every SECS seconds instead of running once.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    watch: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Secrets may live in a local .env file; a missing file is fine.
    let _ = dotenvy::dotenv();
    logging::initialize(cli.log_dest, cli.verbose, &config::peek_log_path(&cli.config));

    let result = execute(cli);
    if let Err(err) = &result {
        watch_error!("{:#}", err);
    }
    result
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let runtime_config = config::load(&cli.config)?
        .validate()
        .with_context(|| format!("invalid configuration in {}", cli.config.display()))?;

    match cli.command {
        Command::Run(args) => commands::run(&runtime_config, args),
        Command::Report => commands::report(&runtime_config),
        Command::ExportCsv { output } => commands::export(&runtime_config, output),
    }
}
