//! Sync command - fetch one package and print its snapshot as JSON.

use std::path::Path;

use anyhow::{Context, Result, bail};
use clap::Args;
use pkgsync::registry::{Registries, SyncOutcome};
use pkgsync::types::Ecosystem;

use super::load_config;

#[derive(Args)]
pub struct SyncCmd {
    /// Registry the package lives in (cargo, maven, pypi, debian)
    pub ecosystem: Ecosystem,

    /// Package name (Maven: group/artifact)
    pub name: String,
}

impl SyncCmd {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let registry = Registries::new(self.ecosystem, &config);

        match registry.sync(&self.name, config.http.max_concurrency).await {
            SyncOutcome::Synced(snapshot) => {
                let json = serde_json::to_string_pretty(&snapshot)
                    .context("Failed to serialize snapshot")?;
                println!("{}", json);
            }
            SyncOutcome::Removed => {
                println!("{}:{} does not exist upstream.", self.ecosystem, self.name);
            }
            SyncOutcome::Skipped => {
                println!("{}:{} is not a usable package, skipped.", self.ecosystem, self.name);
            }
            SyncOutcome::Unavailable(e) => {
                bail!("{} is unavailable: {}", self.ecosystem, e);
            }
        }

        Ok(())
    }
}
