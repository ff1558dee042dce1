//! CLI module for chronostamp
//!
//! Provides command-line interface for:
//! - init: Create the datastore layout
//! - replay: Replay unprocessed changesets and report statistics
//! - inspect: Report persisted bookkeeping

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, inspect, replay, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
