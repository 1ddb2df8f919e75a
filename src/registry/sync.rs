//! One-package sync: fetch, map, then expand into versions, dependencies and
//! maintainers.

use std::collections::BTreeMap;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::adapter::{Mapping, RegistryAdapter};
use super::error::RegistryError;
use crate::types::{DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord};

/// Everything known about one package after a successful sync.
#[derive(Debug, Clone, Serialize)]
pub struct PackageSnapshot {
    pub ecosystem: Ecosystem,
    pub package: PackageRecord,
    pub versions: Vec<VersionRecord>,
    /// Dependencies keyed by version number.
    pub dependencies: BTreeMap<String, Vec<DependencyRecord>>,
    pub maintainers: Vec<MaintainerRecord>,
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// The upstream no longer has the package.
    Removed,
    /// The upstream answered with something that is not a usable package.
    Skipped,
    /// The upstream could not be reached; nothing should change.
    Unavailable(RegistryError),
    Synced(Box<PackageSnapshot>),
}

/// Sync one package. Dependency lookups run at most `concurrency` at a time.
pub async fn sync_package<A: RegistryAdapter>(
    adapter: &A,
    name: &str,
    concurrency: usize,
) -> SyncOutcome {
    let ecosystem = adapter.ecosystem();

    let raw = match adapter.fetch_package_metadata(name).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            info!(%ecosystem, package = name, "package removed upstream");
            return SyncOutcome::Removed;
        }
        Err(e) => {
            warn!(%ecosystem, package = name, error = %e, "upstream unavailable");
            return SyncOutcome::Unavailable(e);
        }
    };

    let mapped = match adapter.map_package_metadata(raw) {
        Mapping::Valid(mapped) => mapped,
        Mapping::Invalid => {
            info!(%ecosystem, package = name, "not a usable package, skipping");
            return SyncOutcome::Skipped;
        }
    };
    let package_name = mapped.record.name.clone();

    let versions = adapter.versions_metadata(&mapped).await;
    debug!(package = %package_name, count = versions.len(), "versions mapped");

    let mut dependencies = BTreeMap::new();
    let (name_ref, mapped_ref) = (package_name.as_str(), &mapped);
    for chunk in versions.chunks(concurrency.max(1)) {
        let fetched = join_all(chunk.iter().map(|v| async move {
            let deps = adapter
                .dependencies_metadata(name_ref, &v.number, mapped_ref)
                .await;
            (v.number.clone(), deps)
        }))
        .await;
        dependencies.extend(fetched);
    }

    let maintainers = adapter.maintainers_metadata(&package_name).await;

    info!(
        %ecosystem,
        package = %package_name,
        versions = versions.len(),
        maintainers = maintainers.len(),
        "package synced"
    );

    SyncOutcome::Synced(Box::new(PackageSnapshot {
        ecosystem,
        package: mapped.record,
        versions,
        dependencies,
        maintainers,
    }))
}
