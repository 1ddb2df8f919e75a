//! Registry adapters for crates.io, Maven-style repositories, PyPI and
//! Debian-style archives.
//!
//! Each adapter turns one upstream's wire format into the normalized
//! records in [`crate::types`]. [`Registries`] picks the adapter for an
//! ecosystem at runtime.
//!
//! # Example
//!
//! ```ignore
//! use pkgsync::config::Config;
//! use pkgsync::registry::Registries;
//! use pkgsync::types::Ecosystem;
//!
//! let registry = Registries::new(Ecosystem::Cargo, &Config::default());
//! let outcome = registry.sync("serde", 4).await;
//! ```

mod adapter;
mod crates_io;
mod debian;
mod error;
mod maven;
mod pypi;
mod sync;

pub use adapter::{MappedPackage, Mapping, RegistryAdapter};
pub use crates_io::{CrateInfo, CrateResponse, CrateVersion, CratesIoAdapter};
pub use debian::{ControlStanza, DebianAdapter, parse_control_file};
pub use error::RegistryError;
pub use maven::{
    Coordinate, DescriptorSource, MAX_PARENT_DEPTH, MavenAdapter, MavenPackage, PomDependency,
    ResolvedDocument, fetch_relocated, resolve_document,
};
pub use pypi::{PypiAdapter, PypiDigests, PypiFile, PypiInfo, PypiProject};
pub use sync::{PackageSnapshot, SyncOutcome, sync_package};

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};
use crate::types::{Ecosystem, Metadata};

/// Object fields of a JSON value; anything else becomes an empty map.
pub(crate) fn json_map(value: serde_json::Value) -> Metadata {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Metadata::default(),
    }
}

/// Keep the entries that parse as `T`, logging the rest.
pub(crate) fn lenient_entries<T: DeserializeOwned>(
    entries: Vec<serde_json::Value>,
    what: &str,
) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "skipping malformed {}", what);
                None
            }
        })
        .collect()
}

/// `deserialize_with` for listings where one bad entry must not sink the
/// document. A missing or null list is empty.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(lenient_entries(entries.unwrap_or_default(), "list entry"))
}

/// Log a failure that an adapter degrades to an empty result.
pub(crate) fn log_soft_failure(name: &str, error: &FetchError, what: &str) {
    if error.is_not_found() {
        debug!(package = %name, "no {} upstream", what);
    } else {
        warn!(package = %name, error = %error, "failed to fetch {}", what);
    }
}

/// Unified adapter that dispatches to the appropriate implementation.
pub enum Registries {
    Cargo(CratesIoAdapter),
    Maven(MavenAdapter),
    Pypi(PypiAdapter),
    Debian(DebianAdapter),
}

impl Registries {
    /// Create the adapter for the given ecosystem.
    pub fn new(ecosystem: Ecosystem, config: &Config) -> Self {
        let fetcher = Fetcher::new(&config.http);
        match ecosystem {
            Ecosystem::Cargo => Self::Cargo(CratesIoAdapter::new(fetcher, &config.cargo)),
            Ecosystem::Maven => Self::Maven(MavenAdapter::new(
                fetcher,
                &config.maven,
                config.http.max_concurrency,
            )),
            Ecosystem::Pypi => Self::Pypi(PypiAdapter::new(fetcher, &config.pypi)),
            Ecosystem::Debian => Self::Debian(DebianAdapter::new(fetcher, &config.debian)),
        }
    }

    pub fn ecosystem(&self) -> Ecosystem {
        match self {
            Self::Cargo(a) => a.ecosystem(),
            Self::Maven(a) => a.ecosystem(),
            Self::Pypi(a) => a.ecosystem(),
            Self::Debian(a) => a.ecosystem(),
        }
    }

    pub fn registry_url(&self, name: &str, version: Option<&str>) -> String {
        match self {
            Self::Cargo(a) => a.registry_url(name, version),
            Self::Maven(a) => a.registry_url(name, version),
            Self::Pypi(a) => a.registry_url(name, version),
            Self::Debian(a) => a.registry_url(name, version),
        }
    }

    pub fn install_command(&self, name: &str, version: Option<&str>) -> String {
        match self {
            Self::Cargo(a) => a.install_command(name, version),
            Self::Maven(a) => a.install_command(name, version),
            Self::Pypi(a) => a.install_command(name, version),
            Self::Debian(a) => a.install_command(name, version),
        }
    }

    pub fn download_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        match self {
            Self::Cargo(a) => a.download_url(name, version),
            Self::Maven(a) => a.download_url(name, version),
            Self::Pypi(a) => a.download_url(name, version),
            Self::Debian(a) => a.download_url(name, version),
        }
    }

    pub fn documentation_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        match self {
            Self::Cargo(a) => a.documentation_url(name, version),
            Self::Maven(a) => a.documentation_url(name, version),
            Self::Pypi(a) => a.documentation_url(name, version),
            Self::Debian(a) => a.documentation_url(name, version),
        }
    }

    /// Every package name the upstream lists.
    pub async fn all_package_names(&self) -> Vec<String> {
        match self {
            Self::Cargo(a) => a.all_package_names().await,
            Self::Maven(a) => a.all_package_names().await,
            Self::Pypi(a) => a.all_package_names().await,
            Self::Debian(a) => a.all_package_names().await,
        }
    }

    /// Names the upstream reports as recently changed.
    pub async fn recently_updated_package_names(&self) -> Vec<String> {
        match self {
            Self::Cargo(a) => a.recently_updated_package_names().await,
            Self::Maven(a) => a.recently_updated_package_names().await,
            Self::Pypi(a) => a.recently_updated_package_names().await,
            Self::Debian(a) => a.recently_updated_package_names().await,
        }
    }

    /// Fetch, map and expand one package into a snapshot.
    pub async fn sync(&self, name: &str, concurrency: usize) -> SyncOutcome {
        match self {
            Self::Cargo(a) => sync_package(a, name, concurrency).await,
            Self::Maven(a) => sync_package(a, name, concurrency).await,
            Self::Pypi(a) => sync_package(a, name, concurrency).await,
            Self::Debian(a) => sync_package(a, name, concurrency).await,
        }
    }
}
