//! Urls command - show the URLs and install command for a package.

use std::path::Path;

use anyhow::Result;
use clap::Args;
use pkgsync::registry::Registries;
use pkgsync::types::Ecosystem;

use super::load_config;

#[derive(Args)]
pub struct UrlsCmd {
    /// Registry the package lives in (cargo, maven, pypi, debian)
    pub ecosystem: Ecosystem,

    /// Package name (Maven: group/artifact)
    pub name: String,

    /// Specific version
    pub version: Option<String>,
}

impl UrlsCmd {
    pub async fn run(&self, config_path: Option<&Path>) -> Result<()> {
        let config = load_config(config_path)?;
        let registry = Registries::new(self.ecosystem, &config);
        let version = self.version.as_deref();

        println!("registry: {}", registry.registry_url(&self.name, version));
        println!("install:  {}", registry.install_command(&self.name, version));
        if let Some(url) = registry.download_url(&self.name, version) {
            println!("download: {}", url);
        }
        if let Some(url) = registry.documentation_url(&self.name, version) {
            println!("docs:     {}", url);
        }

        Ok(())
    }
}
