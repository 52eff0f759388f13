use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eve-harvest")]
#[command(about = "Harvests EVE market orders and daily history into SQLite")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Harvest config JSON
    #[arg(short, long, default_value = "assets/configs/harvest.json")]
    pub config: PathBuf,

    /// Overrides `storage.path` from the config
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load item types and stations into the database
    Seed {
        #[arg(long, default_value = "assets/seed/types.json")]
        types: PathBuf,

        #[arg(long, default_value = "assets/seed/stations.csv")]
        stations: PathBuf,
    },

    /// Harvest orders and history, looping until Ctrl-C
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Fetch the quick-look price feed once
    Stats,
}
