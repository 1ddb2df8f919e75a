//! Config command - show the effective configuration.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use pkgsync::config::Config;

use super::load_config;

#[derive(Args)]
pub struct ConfigCmd {
    /// Only print the config file location
    #[arg(long)]
    pub path: bool,
}

impl ConfigCmd {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let path = match config_path {
            Some(path) => path.to_path_buf(),
            None => Config::config_path()?,
        };

        if self.path {
            println!("{}", path.display());
            return Ok(());
        }

        let config = load_config(config_path)?;
        let exists = if path.exists() { "" } else { " (not found, using defaults)" };
        println!("# Config: {}{}", path.display(), exists);
        println!();
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to serialize config")?
        );

        Ok(())
    }
}
