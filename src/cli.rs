//! CLI argument definitions.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::commands::{ConfigCmd, NamesCmd, SyncCmd, UrlsCmd};

#[derive(Parser)]
#[command(name = "pkgsync")]
#[command(about = "pkgsync - normalized package metadata from many registries")]
#[command(version)]
pub struct Cli {
    /// Config file (default: ~/.config/pkgsync/config.toml)
    #[arg(long, global = true, env = "PKGSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List package names known to a registry
    Names(NamesCmd),

    /// Fetch one package with its versions, dependencies and maintainers
    Sync(SyncCmd),

    /// Show registry, install, download and documentation URLs
    Urls(UrlsCmd),

    /// Show the effective configuration
    Config(ConfigCmd),
}

impl Command {
    pub async fn execute(&self, config_path: Option<&Path>) -> anyhow::Result<()> {
        match self {
            Command::Names(cmd) => cmd.run(config_path).await,
            Command::Sync(cmd) => cmd.run(config_path).await,
            Command::Urls(cmd) => cmd.run(config_path).await,
            Command::Config(cmd) => cmd.run(config_path).await,
        }
    }
}
