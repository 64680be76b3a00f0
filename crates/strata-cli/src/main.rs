//! # strata
//!
//! Command-line driver for the schema migration engine.
//!
//! - **migrate** applies pending migrations in version order, stopping at the
//!   first failure
//! - **status** lists applied and pending migrations (read-only)
//! - **rollback** reverts applied migrations above a version, newest first
//! - **create** writes a new migration module template
//!
//! The database is configured through `STRATA_DATABASE_PATH`; without it
//! every command runs against a no-op client that only logs statements.

mod catalog;
mod commands;
mod config;
mod create;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "strata", version)]
#[command(about = "Schema migrations for the application database")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply all pending migrations
    Migrate {
        /// List what would be applied without running anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show applied and pending migrations
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Revert applied migrations above VERSION, newest first
    Rollback {
        /// Target version to keep (0 keeps only the status table)
        #[arg(allow_negative_numbers = true)]
        version: i64,
    },

    /// Write a new migration module template
    Create {
        /// Human-readable migration name, e.g. "add project budget"
        name: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Malformed arguments exit here, before anything touches the database.
    let cli = Cli::parse();

    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,strata_store=info,strata_cli=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = CliConfig::from_env();
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Migrate { dry_run } => commands::migrate(&config, dry_run),
        Command::Status { json } => commands::status(&config, json),
        Command::Rollback { version } => commands::rollback(&config, version),
        Command::Create { name } => commands::create(&config, &name),
    }
}
