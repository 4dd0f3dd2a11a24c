// ABOUTME: Entry point for the nixpull CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use nixpull::config::{self, Settings};
use nixpull::deploy::CheckOutcome;
use nixpull::error::{Error, Result};
use nixpull::output::{Output, OutputMode};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let output_mode = if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let output = Output::new(output_mode);

    match run(cli, output) {
        Ok(code) => std::process::exit(code),
        Err(e) => handle_error(e),
    }
}

/// Map errors to exit codes: 1 for a failed deployment, 2 otherwise.
fn handle_error(e: Error) -> ! {
    if let Error::Deploy(deploy_err) = &e
        && let Some(info) = deploy_err.lock_holder_info()
    {
        eprintln!(
            "Error: deployment locked by {} (pid {})",
            info.holder, info.pid
        );
        eprintln!("       Started at: {}", info.started_at);
        std::process::exit(2);
    }

    eprintln!("Error: {e}");
    std::process::exit(e.exit_code());
}

fn config_path(cli: &Cli) -> Result<PathBuf> {
    if let Some(path) = &cli.config {
        return Ok(path.clone());
    }
    match env::var_os(config::CONFIG_ENV) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Err(Error::NoConfig),
    }
}

fn run(cli: Cli, output: Output) -> Result<i32> {
    let settings = Settings::load(&config_path(&cli)?)?;

    match cli.command {
        Commands::Run {
            force,
            no_magic_rollback,
        } => {
            commands::run(settings, force, no_magic_rollback, output)?;
            Ok(0)
        }
        Commands::Check => match commands::check(settings, &output)? {
            CheckOutcome::UpToDate { .. } => Ok(0),
            CheckOutcome::Pending { .. } => Ok(10),
        },
    }
}
