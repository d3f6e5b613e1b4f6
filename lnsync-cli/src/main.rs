//! lnsync: mirror files from source directories into a destination as symlinks.
//!
//! # Usage
//!
//! ```text
//! lnsync start  [-s DIR[,DIR..]] [-d DEST] [--config FILE] [--pid FILE] [--log FILE] [--stderr]
//! lnsync stop
//! lnsync reload
//! lnsync status
//! lnsync prune  [-s DIR[,DIR..]] [-d DEST] [--config FILE]
//! lnsync logs   [--lines N] [--log FILE] [--config FILE]
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use lnsync_core::config;

use commands::{
    daemon::{LogsArgs, StartArgs},
    prune::PruneArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "lnsync",
    version,
    about = "Keep a directory of symlinks in sync with one or more source directories",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the watcher in the foreground until stopped.
    Start(StartArgs),

    /// Ask a running daemon to shut down.
    Stop,

    /// Ask a running daemon to shut down (reload is a stop).
    Reload,

    /// Print daemon status as JSON.
    Status,

    /// Remove broken links from the destination and exit.
    Prune(PruneArgs),

    /// Print recent daemon log lines.
    Logs(LogsArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = config::home().context("could not determine home directory")?;

    match cli.command {
        Commands::Start(args) => commands::daemon::start(args, &home),
        Commands::Stop => commands::daemon::stop(&home),
        Commands::Reload => commands::daemon::reload(&home),
        Commands::Status => commands::daemon::status(&home),
        Commands::Prune(args) => args.run(&home),
        Commands::Logs(args) => commands::daemon::logs(args, &home),
    }
}
