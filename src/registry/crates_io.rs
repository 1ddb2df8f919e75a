//! crates.io registry adapter.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::adapter::{MappedPackage, Mapping, RegistryAdapter};
use super::error::RegistryError;
use super::{json_map, lenient_list, log_soft_failure};
use crate::config::CargoConfig;
use crate::fetch::{Fetcher, repository_fallback};
use crate::types::{
    ANY_REQUIREMENT, DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord,
    VersionStatus, dedup_by_key, unique_names,
};

const CRATES_DOWNLOAD: &str = "https://static.crates.io/crates";
const DOCS_RS: &str = "https://docs.rs";
const PER_PAGE: usize = 100;

/// crates.io registry adapter.
pub struct CratesIoAdapter {
    fetcher: Fetcher,
    base_url: String,
}

impl CratesIoAdapter {
    pub fn new(fetcher: Fetcher, config: &CargoConfig) -> Self {
        Self {
            fetcher,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }

    fn api_url(&self) -> String {
        format!("{}/api/v1", self.base_url)
    }
}

// crates.io API response types
#[derive(Debug, Clone, Deserialize)]
pub struct CrateResponse {
    #[serde(rename = "crate")]
    pub krate: CrateInfo,
    #[serde(default)]
    pub versions: Vec<CrateVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrateInfo {
    pub id: String,
    pub homepage: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub repository: Option<String>,
    pub downloads: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrateVersion {
    pub num: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub yanked: bool,
    pub license: Option<String>,
    pub downloads: Option<u64>,
    pub checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrateListResponse {
    #[serde(default)]
    crates: Vec<NamedCrate>,
}

#[derive(Debug, Deserialize)]
struct NamedCrate {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    just_updated: Vec<NamedCrate>,
    #[serde(default)]
    new_crates: Vec<NamedCrate>,
}

#[derive(Debug, Deserialize)]
struct DependenciesResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    dependencies: Vec<CrateDependency>,
}

#[derive(Debug, Deserialize)]
struct CrateDependency {
    crate_id: String,
    req: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    optional: bool,
}

#[derive(Debug, Deserialize)]
struct OwnersResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    users: Vec<CrateOwner>,
}

#[derive(Debug, Deserialize)]
struct CrateOwner {
    id: u64,
    login: String,
    name: Option<String>,
    url: Option<String>,
}

impl RegistryAdapter for CratesIoAdapter {
    type Raw = CrateResponse;

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Cargo
    }

    fn registry_url(&self, name: &str, version: Option<&str>) -> String {
        format!("{}/crates/{}/{}", self.base_url, name, version.unwrap_or_default())
    }

    fn install_command(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(v) => format!("cargo install {} --version {}", name, v),
            None => format!("cargo install {}", name),
        }
    }

    fn download_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        let version = version.filter(|v| !v.is_empty())?;
        Some(format!("{}/{}/{}-{}.crate", CRATES_DOWNLOAD, name, name, version))
    }

    fn documentation_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        Some(format!("{}/{}/{}", DOCS_RS, name, version.unwrap_or_default()))
    }

    async fn all_package_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut page = 1;

        loop {
            let url = format!("{}/crates?page={}&per_page={}", self.api_url(), page, PER_PAGE);
            match self.fetcher.get_json::<CrateListResponse>(&url).await {
                Ok(list) if list.crates.is_empty() => break,
                Ok(list) => {
                    names.extend(list.crates.into_iter().map(|c| c.name));
                    page += 1;
                }
                Err(e) => {
                    warn!(page, gathered = names.len(), error = %e, "crate listing stopped early");
                    break;
                }
            }
        }

        debug!(count = names.len(), "listed crates");
        names
    }

    async fn recently_updated_package_names(&self) -> Vec<String> {
        let url = format!("{}/summary", self.api_url());
        match self.fetcher.get_json::<SummaryResponse>(&url).await {
            Ok(summary) => unique_names(
                summary
                    .just_updated
                    .into_iter()
                    .chain(summary.new_crates)
                    .map(|c| c.name),
            ),
            Err(e) => {
                warn!(error = %e, "failed to read crates.io summary");
                Vec::new()
            }
        }
    }

    async fn fetch_package_metadata(&self, name: &str) -> Result<Option<CrateResponse>, RegistryError> {
        let url = format!("{}/crates/{}", self.api_url(), name);
        debug!(package = name, url = %url, "fetching crate");

        match self.fetcher.get_json(&url).await {
            Ok(krate) => Ok(Some(krate)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn map_package_metadata(&self, raw: CrateResponse) -> Mapping<MappedPackage<CrateResponse>> {
        let Some(latest) = raw.versions.first() else {
            return Mapping::Invalid;
        };

        let krate = &raw.krate;
        let record = PackageRecord {
            name: krate.id.clone(),
            homepage: krate.homepage.clone(),
            description: krate.description.clone(),
            keywords: krate.keywords.clone(),
            licenses: latest.license.clone(),
            repository_url: repository_fallback(
                krate.repository.as_deref(),
                krate.homepage.as_deref(),
            ),
            downloads: krate.downloads,
            downloads_period: Some("total".to_string()),
            metadata: json_map(json!({ "categories": krate.categories })),
        };

        Mapping::Valid(MappedPackage { record, raw })
    }

    async fn versions_metadata(&self, package: &MappedPackage<CrateResponse>) -> Vec<VersionRecord> {
        package
            .raw
            .versions
            .iter()
            .map(|v| VersionRecord {
                number: v.num.clone(),
                published_at: v.created_at,
                status: v.yanked.then_some(VersionStatus::Yanked),
                integrity: v.checksum.as_ref().map(|c| format!("sha256-{}", c)),
                licenses: v.license.clone(),
                metadata: json_map(json!({ "downloads": v.downloads })),
            })
            .collect()
    }

    async fn dependencies_metadata(
        &self,
        name: &str,
        version: &str,
        _package: &MappedPackage<CrateResponse>,
    ) -> Vec<DependencyRecord> {
        let url = format!("{}/crates/{}/{}/dependencies", self.api_url(), name, version);

        let deps = match self.fetcher.get_json::<DependenciesResponse>(&url).await {
            Ok(resp) => resp.dependencies,
            Err(e) => {
                log_soft_failure(name, &e, "dependencies");
                return Vec::new();
            }
        };

        deps.into_iter()
            .map(|dep| DependencyRecord {
                package_name: dep.crate_id,
                requirements: dep.req.unwrap_or_else(|| ANY_REQUIREMENT.to_string()),
                kind: dep.kind.unwrap_or_else(|| "normal".to_string()),
                optional: dep.optional,
                ecosystem: self.ecosystem().as_str().to_string(),
            })
            .collect()
    }

    async fn maintainers_metadata(&self, name: &str) -> Vec<MaintainerRecord> {
        let url = format!("{}/crates/{}/owner_user", self.api_url(), name);

        let owners = match self.fetcher.get_json::<OwnersResponse>(&url).await {
            Ok(resp) => resp.users,
            Err(e) => {
                log_soft_failure(name, &e, "owners");
                return Vec::new();
            }
        };

        let maintainers: Vec<MaintainerRecord> = owners
            .into_iter()
            .map(|user| MaintainerRecord {
                uuid: user.id.to_string(),
                name: user.name,
                login: Some(user.login),
                email: None,
                url: user.url,
            })
            .collect();

        dedup_by_key(maintainers, |m| m.login.clone())
    }
}
