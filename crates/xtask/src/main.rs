//! Development tasks for the attribute workspace
//!
//! This binary provides development utilities using the cargo-xtask pattern.
//! Run with: `cargo xtask <command>`

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Inspect, Validate};
use tracing_subscriber::EnvFilter;

/// Development tasks for the attribute workspace
#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Development tools for attribute content", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Spawn every template and print resolved attribute values
    Inspect(Inspect),

    /// Load content files and report problems without spawning anything
    Validate(Validate),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Inspect(cmd) => cmd.execute(),
        Command::Validate(cmd) => cmd.execute(),
    }
}
