mod agents;
mod cli;
mod config;
mod error;
mod node;
mod process;
mod utils;
mod workflow;

use agents::SyncMode;
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::Config;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_ENV: &str = "DOTUP_LOG";

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let layer = fmt::layer().compact().with_writer(std::io::stderr);
    tracing_subscriber::registry().with(layer).with(filter).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = Config::load(cli.config.as_deref()).and_then(|config| {
        tracing::debug!(?config, "configuration loaded");
        match &cli.command {
            Commands::UpdateAll(args) => workflow::execute_update(&config, args),
            Commands::MergeMain(args) => {
                workflow::execute_branch_sync(&config, SyncMode::Merge, args)
            }
            Commands::RebaseMain(args) => {
                workflow::execute_branch_sync(&config, SyncMode::Rebase, args)
            }
        }
    });

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for line in e.remediation() {
            eprintln!("  {}", line.bright_cyan());
        }
        std::process::exit(1);
    }
}
