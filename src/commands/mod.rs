//! CLI command implementations.

mod config;
mod names;
mod sync;
mod urls;

pub use config::ConfigCmd;
pub use names::NamesCmd;
pub use sync::SyncCmd;
pub use urls::UrlsCmd;

use std::path::Path;

use anyhow::Result;
use pkgsync::config::Config;

/// Load the config from `--config`, or the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
