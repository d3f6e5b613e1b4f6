pub mod daemon;
pub mod prune;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use lnsync_core::config;
use lnsync_core::{Config, Settings};

/// Flags that locate sources and destination, layered over the config file.
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Source directories, comma separated.
    #[arg(short = 's', long = "sources", value_delimiter = ',')]
    pub sources: Vec<PathBuf>,

    /// Destination directory for the symlinks.
    #[arg(short = 'd', long = "destination")]
    pub destination: Option<PathBuf>,

    /// Config file to read instead of ~/.lnsync/config.yaml.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn settings(
        &self,
        home: &Path,
        pid_file: Option<PathBuf>,
        log_file: Option<PathBuf>,
    ) -> Result<Settings> {
        let file = load_config(home, self.config.as_deref())?;
        let flags = Config {
            sources: self.sources.clone(),
            destination: self.destination.clone(),
            pid_file,
            log_file,
        };
        file.merge(flags).resolve().context("invalid configuration")
    }
}

/// Read `path`, or `~/.lnsync/config.yaml` when no path was given.
pub fn load_config(home: &Path, path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            config::load(path).with_context(|| format!("failed to load config {}", path.display()))
        }
        None => config::load_default_at(home).context("failed to load default config"),
    }
}
