//! Configuration management.
//!
//! Config is stored at `~/.config/pkgsync/config.toml` and contains:
//! - HTTP client settings shared by all adapters
//! - Upstream base URLs for each registry

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = "pkgsync";
const CONFIG_FILE: &str = "config.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub cargo: CargoConfig,

    #[serde(default)]
    pub maven: MavenConfig,

    #[serde(default)]
    pub pypi: PypiConfig,

    #[serde(default)]
    pub debian: DebianConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every request (crates.io rejects anonymous ones).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent requests issued for one package sync.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CargoConfig {
    /// API host (default: https://crates.io).
    #[serde(default = "default_cargo_url")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MavenConfig {
    /// Artifact repository root (default: https://repo.clojars.org).
    #[serde(default = "default_maven_url")]
    pub url: String,

    /// Human-facing site (default: https://clojars.org).
    #[serde(default = "default_maven_web_url")]
    pub web_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PypiConfig {
    /// Index host (default: https://pypi.org).
    #[serde(default = "default_pypi_url")]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebianConfig {
    /// Archive mirror root (default: http://ftp.ubuntu.com/ubuntu).
    #[serde(default = "default_debian_url")]
    pub url: String,

    /// Release codename whose `Sources.gz` files are read.
    #[serde(default = "default_debian_codename")]
    pub codename: String,

    #[serde(default = "default_debian_components")]
    pub components: Vec<String>,
}

fn default_user_agent() -> String {
    concat!("pkgsync/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    4
}

fn default_cargo_url() -> String {
    "https://crates.io".to_string()
}

fn default_maven_url() -> String {
    "https://repo.clojars.org".to_string()
}

fn default_maven_web_url() -> String {
    "https://clojars.org".to_string()
}

fn default_pypi_url() -> String {
    "https://pypi.org".to_string()
}

fn default_debian_url() -> String {
    "http://ftp.ubuntu.com/ubuntu".to_string()
}

fn default_debian_codename() -> String {
    "noble".to_string()
}

fn default_debian_components() -> Vec<String> {
    ["main", "universe", "multiverse", "restricted"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl Default for CargoConfig {
    fn default() -> Self {
        Self {
            url: default_cargo_url(),
        }
    }
}

impl Default for MavenConfig {
    fn default() -> Self {
        Self {
            url: default_maven_url(),
            web_url: default_maven_web_url(),
        }
    }
}

impl Default for PypiConfig {
    fn default() -> Self {
        Self {
            url: default_pypi_url(),
        }
    }
}

impl Default for DebianConfig {
    fn default() -> Self {
        Self {
            url: default_debian_url(),
            codename: default_debian_codename(),
            components: default_debian_components(),
        }
    }
}

impl Config {
    /// Load config from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from a specific file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Get the config file path.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}
