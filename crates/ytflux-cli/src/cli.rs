use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "ytflux",
    version,
    about = "Keep a local folder of tagged audio files in sync with a YouTube playlist"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Playlist URL or ID to use when none is configured yet.
    #[arg(long, global = true, value_name = "URL_OR_ID")]
    pub playlist: Option<String>,

    /// Config file to use instead of the default location.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for the state database and logs.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory audio files are written to.
    #[arg(long, global = true, value_name = "DIR")]
    pub media_dir: Option<PathBuf>,

    /// Increase console log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile the local mirror with the playlist (default).
    Sync,
    /// Show the configured playlist and every known entry.
    Status,
}
