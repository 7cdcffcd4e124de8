//! `webwalker config`: show the effective configuration.

use std::path::Path;

use clap::Args;
use webwalker::config::ConfigFile;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Print only the configuration file path
    #[arg(long)]
    pub path: bool,
}

pub fn run(args: ConfigArgs, config: &ConfigFile, source: Option<&Path>) -> Result<(), CliError> {
    let location = match source {
        Some(p) if p.exists() => p.display().to_string(),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "(no config directory, using defaults)".to_string(),
    };

    if args.path {
        println!("{}", location);
        return Ok(());
    }

    println!("# {}", location);
    print!("{}", config.to_ini_string());
    Ok(())
}
