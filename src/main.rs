//! Binary entry point for community-bridge.
//!
//! Offline tooling around the bridge configuration: validate it against a
//! database, print the effective settings, and inspect cached player data.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use community_bridge::BridgeConfig;
use community_bridge::observability::{self, LoggingConfig};
use std::path::PathBuf;
use std::process::ExitCode;

/// community-bridge - keeps game server groups in step with a web application.
#[derive(Parser)]
#[command(name = "community-bridge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "COMMUNITY_BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file if none exists.
    Init,

    /// Validate the configuration against a `SQLite` database.
    Check {
        /// Path to the web application's database.
        #[arg(short, long)]
        database: PathBuf,
    },

    /// Print the effective configuration.
    Report,

    /// Print a player's cached snapshot.
    Snapshot {
        /// Player UUID or display name.
        player: String,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init(&LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let path = cli
        .config
        .or_else(BridgeConfig::default_config_path)
        .unwrap_or_else(|| PathBuf::from("config.yml"));

    let result = match cli.command {
        Commands::Init => commands::cmd_init(&path),
        Commands::Check { database } => commands::cmd_check(&path, &database),
        Commands::Report => commands::cmd_report(&path),
        Commands::Snapshot { player, json } => commands::cmd_snapshot(&path, &player, json),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}
