//! spacepass - satellite tracking and pass prediction
//!
//! Loads element sets from TLE text or a JSON catalog and either predicts
//! visible passes for an observer or steps the live tracker.

mod analysis;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use analysis::{PassArgs, TrackArgs};
use spacepass::config::{load_config, SpacepassConfig};

#[derive(Parser, Debug)]
#[command(name = "spacepass", version, about)]
struct Cli {
    /// JSON settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Predict passes over an observer and write them as JSON
    Passes(PassArgs),
    /// Step the tracker and orbit cache, logging positions
    Track(TrackArgs),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SpacepassConfig::default(),
    };

    match cli.command {
        Command::Passes(args) => analysis::run_pass_report(args, &config),
        Command::Track(args) => analysis::run_track(args, &config),
    }
}
