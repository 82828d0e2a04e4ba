//! `ytflux` command line tool.
//!
//! Mirrors one YouTube playlist into a local folder of tagged m4a files.

mod bootstrap;
mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use ytflux_core::AppConfig;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let logging_config = logging::LoggingConfig::new(config.log_dir()).with_verbosity(cli.verbose);
    let _guard = logging::init(&logging_config).context("failed to initialize logging")?;
    debug!("Effective config: {:?}", config);

    match cli.command {
        Some(Command::Status) => commands::run_status(&config),
        Some(Command::Sync) | None => commands::run_sync(&config, cli.playlist.as_deref()),
    }
}

/// Load the config file and apply command line overrides.
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => AppConfig::load().context("failed to load config")?,
    };

    if let Some(data_dir) = &cli.data_dir {
        config.data_directory.clone_from(data_dir);
    }
    if let Some(media_dir) = &cli.media_dir {
        config.media_directory = Some(media_dir.clone());
    }
    Ok(config)
}
