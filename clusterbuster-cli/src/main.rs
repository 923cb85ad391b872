//! Clusterbuster CLI - Command-line interface
//!
//! Inspect compiled tile statements and cache keys, render tiles against a
//! PostGIS database (feature `postgres`) and invalidate cached tiles
//! (feature `redis`).

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clusterbuster::ConfigFile;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::TileArgs;
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "clusterbuster", version, about)]
struct Cli {
    /// Config file (defaults to ~/.clusterbuster/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the compiled SQL statement and bound values for a tile
    Sql(TileArgs),
    /// Print the cache key for a tile
    Key(TileArgs),
    /// Render a tile against PostGIS
    #[cfg(feature = "postgres")]
    Tile(commands::tile::RenderArgs),
    /// Remove cached tiles from the remote cache
    #[cfg(feature = "redis")]
    Invalidate(commands::invalidate::InvalidateArgs),
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    debug!(?config, "Configuration loaded");
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?.server;

    match &cli.command {
        Command::Sql(args) => commands::sql::run(args, config),
        Command::Key(args) => commands::key::run(args, config),
        #[cfg(feature = "postgres")]
        Command::Tile(args) => commands::tile::run(args, config).await,
        #[cfg(feature = "redis")]
        Command::Invalidate(args) => commands::invalidate::run(args, config).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
