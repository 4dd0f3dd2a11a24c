// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nixpull")]
#[command(about = "Pull-based NixOS deployment with per-host testing branches")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML configuration file (falls back to $DEPLOY_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output (only final result)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch changes and rebuild if necessary
    Run {
        /// Deploy even if the target commit is already active
        #[arg(long)]
        force: bool,

        /// Skip the post-activation reachability check and rollback
        #[arg(long)]
        no_magic_rollback: bool,
    },

    /// Check for new commits without deploying
    Check,
}
