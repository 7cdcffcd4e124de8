//! Webwalker CLI - Command-line interface
//!
//! Runs the recognizer, the path builder and the template matcher on files,
//! and shows the effective configuration.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use webwalker::config::{default_path, ConfigFile};
use webwalker::logging::{init_logging, LoggingConfig};

use crate::commands::{config, locate, matching, path};
use crate::error::CliError;

#[derive(Debug, Parser)]
#[command(name = "webwalker", version, about = "Screen-driven localization and navigation")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, overriding the configuration file (e.g. debug)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recognize the player position from a screenshot and a world map
    Locate(locate::LocateArgs),

    /// Print the tile path between two tiles through a navigation graph
    Path(path::PathArgs),

    /// Find a needle image inside a haystack image
    Match(matching::MatchArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

fn load_config(path: Option<&PathBuf>) -> Result<(ConfigFile, Option<PathBuf>), CliError> {
    match path {
        Some(p) => Ok((ConfigFile::load(p)?, Some(p.clone()))),
        None => match default_path() {
            Some(p) => Ok((ConfigFile::load_or_default(&p)?, Some(p))),
            None => Ok((ConfigFile::default(), None)),
        },
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let (config, config_path) = load_config(cli.config.as_ref())?;

    let logging = LoggingConfig {
        level: cli
            .log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone()),
        ..config.logging.clone()
    };
    let _guard = init_logging(&logging)?;
    debug!(path = ?config_path, "Configuration loaded");

    match cli.command {
        Commands::Locate(args) => locate::run(args, &config),
        Commands::Path(args) => path::run(args, &config),
        Commands::Match(args) => matching::run(args),
        Commands::Config(args) => config::run(args, &config, config_path.as_deref()),
    }
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
