//! `lnsync prune`: one reconcile pass without starting the watcher.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArgs;

#[derive(Args, Debug)]
pub struct PruneArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl PruneArgs {
    pub fn run(self, home: &Path) -> Result<()> {
        let settings = self.config.settings(home, None, None)?;
        let report = lnsync_sync::reconcile(&settings.sources, &settings.destination)
            .with_context(|| format!("prune failed for {}", settings.destination.display()))?;

        for link in &report.pruned {
            println!("pruned {}", link.display());
        }
        println!(
            "{} pruned, {} kept in {}",
            report.pruned.len(),
            report.kept,
            settings.destination.display()
        );
        Ok(())
    }
}
