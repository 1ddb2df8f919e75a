//! Names command - list package names known to a registry.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use pkgsync::registry::Registries;
use pkgsync::types::Ecosystem;

use super::load_config;

#[derive(Args)]
pub struct NamesCmd {
    /// Registry to list (cargo, maven, pypi, debian)
    pub ecosystem: Ecosystem,

    /// Only names the registry reports as recently updated
    #[arg(long)]
    pub recent: bool,

    /// Print at most this many names
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

impl NamesCmd {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let registry = Registries::new(self.ecosystem, &config);

        let names = if self.recent {
            registry.recently_updated_package_names().await
        } else {
            registry.all_package_names().await
        };

        if names.is_empty() {
            eprintln!("No package names returned by {}.", self.ecosystem);
            return Ok(());
        }

        let limit = self.limit.unwrap_or(names.len());
        for name in names.iter().take(limit) {
            println!("{}", name);
        }

        Ok(())
    }
}
