//! CLI argument definitions using clap
//!
//! Commands:
//! - chronostamp init --data-dir <dir>
//! - chronostamp replay --config <path>
//! - chronostamp inspect --data-dir <dir>

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// chronostamp - transactional commit core for a terminology content store
#[derive(Parser, Debug)]
#[command(name = "chronostamp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a datastore layout with empty bookkeeping
    Init {
        /// Datastore directory
        #[arg(long, default_value = "./chronostamp-data")]
        data_dir: PathBuf,
    },

    /// Replay unprocessed changesets into an in-memory store
    Replay {
        /// Path to configuration file
        #[arg(long, default_value = "./chronostamp.json")]
        config: PathBuf,
    },

    /// Print persisted bookkeeping of a datastore
    Inspect {
        /// Datastore directory
        #[arg(long, default_value = "./chronostamp-data")]
        data_dir: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
