//! Registry adapter trait and common types.

use std::future::Future;

use super::error::RegistryError;
use crate::types::{DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord};

/// Result of mapping a raw upstream record.
///
/// `Invalid` means the upstream answered but the record is not a usable
/// package; callers skip it and persist nothing. It is distinct from the
/// package being absent upstream, which `fetch_package_metadata` reports as
/// `Ok(None)`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping<T> {
    Valid(T),
    Invalid,
}

impl<T> Mapping<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Mapping::Valid(_))
    }

    pub fn valid(self) -> Option<T> {
        match self {
            Mapping::Valid(v) => Some(v),
            Mapping::Invalid => None,
        }
    }
}

/// A normalized package plus the adapter-specific raw record it came from,
/// which later calls (versions, dependencies) read from.
#[derive(Debug, Clone)]
pub struct MappedPackage<R> {
    pub record: PackageRecord,
    pub raw: R,
}

/// Trait for registry adapters.
///
/// Each upstream (crates.io, a Maven-style repository, PyPI, a Debian-style
/// archive) implements this trait against its own wire format. All listing
/// operations are fail-soft: they return what they could gather and never
/// surface a transport error.
pub trait RegistryAdapter: Send + Sync {
    /// Upstream record returned by `fetch_package_metadata`.
    type Raw: Send + Sync;

    fn ecosystem(&self) -> Ecosystem;

    /// Human-facing page for the package (or one of its versions).
    fn registry_url(&self, name: &str, version: Option<&str>) -> String;

    /// Command a user would run to install the package.
    fn install_command(&self, name: &str, version: Option<&str>) -> String;

    /// Artifact download location. `None` when no version is given.
    fn download_url(&self, name: &str, version: Option<&str>) -> Option<String>;

    fn documentation_url(&self, _name: &str, _version: Option<&str>) -> Option<String> {
        None
    }

    /// Every package name the upstream lists.
    ///
    /// Returns the names gathered before any failure; empty only when the
    /// very first fetch fails.
    fn all_package_names(&self) -> impl Future<Output = Vec<String>> + Send;

    /// Names the upstream reports as recently changed. Best effort, may be
    /// empty, never complete.
    fn recently_updated_package_names(&self) -> impl Future<Output = Vec<String>> + Send;

    /// Raw upstream record for a package, or `Ok(None)` if it does not exist.
    fn fetch_package_metadata(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Self::Raw>, RegistryError>> + Send;

    fn map_package_metadata(&self, raw: Self::Raw) -> Mapping<MappedPackage<Self::Raw>>;

    fn versions_metadata(
        &self,
        package: &MappedPackage<Self::Raw>,
    ) -> impl Future<Output = Vec<VersionRecord>> + Send;

    fn dependencies_metadata(
        &self,
        name: &str,
        version: &str,
        package: &MappedPackage<Self::Raw>,
    ) -> impl Future<Output = Vec<DependencyRecord>> + Send;

    fn maintainers_metadata(&self, name: &str) -> impl Future<Output = Vec<MaintainerRecord>> + Send;
}
