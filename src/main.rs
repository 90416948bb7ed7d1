//! prodlens - product detection and cross-retailer rating aggregation

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use prodlens::cli::{Cli, Commands};
use prodlens::error::Result;

mod commands;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("\n{} {}", "Hint:".yellow(), hint);
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr so `--json` output stays clean. RUST_LOG wins over --verbose.
fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "prodlens=debug" } else { "prodlens=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect { url, file, json } => commands::cmd_detect(&url, file.as_deref(), json),
        Commands::Platform { url } => commands::cmd_platform(&url),
        Commands::Aggregate { observations, json } => commands::cmd_aggregate(&observations, json),
        Commands::Rate { url, file, json } => commands::cmd_rate(&url, file.as_deref(), json),
    }
}
