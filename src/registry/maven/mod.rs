//! Maven-style artifact repository adapter (Clojars layout).

mod pom;
mod resolve;

use std::collections::BTreeMap;

use futures::future::join_all;
use serde_json::json;
use tracing::{debug, warn};

use super::adapter::{MappedPackage, Mapping, RegistryAdapter};
use super::error::RegistryError;
use super::{json_map, log_soft_failure};
use crate::config::MavenConfig;
use crate::fetch::{Fetched, Fetcher, XmlDocument, XmlElement};
use crate::types::{
    ANY_REQUIREMENT, DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord,
    unique_names,
};

pub use pom::{Coordinate, PomDependency, package_name, parse_package_name};
pub use resolve::{
    DescriptorSource, MAX_PARENT_DEPTH, ResolvedDocument, fetch_relocated, resolve_document,
};

const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// Maven-style repository adapter.
pub struct MavenAdapter {
    fetcher: Fetcher,
    repo_url: String,
    web_url: String,
    concurrency: usize,
}

impl MavenAdapter {
    pub fn new(fetcher: Fetcher, config: &MavenConfig, concurrency: usize) -> Self {
        Self {
            fetcher,
            repo_url: config.url.trim_end_matches('/').to_string(),
            web_url: config.web_url.trim_end_matches('/').to_string(),
            concurrency: concurrency.max(1),
        }
    }

    /// One version's record from its relocation-followed descriptor, or
    /// `None` (logged) when the descriptor cannot be read.
    async fn version_record(&self, raw: &MavenPackage, number: &str) -> Option<VersionRecord> {
        let coord = Coordinate::new(&raw.group, &raw.artifact, number);
        let descriptor = match fetch_relocated(self, &coord).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                warn!(version = %coord, "no descriptor, skipping version");
                return None;
            }
            Err(e) => {
                warn!(version = %coord, error = %e, "descriptor failed, skipping version");
                return None;
            }
        };

        let licenses = descriptor
            .body
            .root_element()
            .map(|project| pom::extract_licenses(project, &descriptor.body.comments))
            .unwrap_or_default();

        Some(VersionRecord {
            number: number.to_string(),
            published_at: descriptor.last_modified,
            licenses: (!licenses.is_empty()).then(|| licenses.join(",")),
            ..Default::default()
        })
    }
}

/// What `fetch_package_metadata` learns about an artifact.
#[derive(Debug, Clone)]
pub struct MavenPackage {
    pub name: String,
    pub group: String,
    pub artifact: String,
    /// Released versions in repository order, snapshots excluded.
    pub versions: Vec<String>,
    pub latest_version: Option<String>,
    /// Resolved descriptor of the latest version, if it has one.
    pub document: Option<ResolvedDocument>,
}

impl DescriptorSource for MavenAdapter {
    async fn fetch_descriptor(
        &self,
        coord: &Coordinate,
    ) -> Result<Option<Fetched<XmlDocument>>, RegistryError> {
        let url = format!("{}/{}", self.repo_url, coord.pom_path());
        match self.fetcher.get_xml(&url).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Released version numbers and the latest one from `maven-metadata.xml`.
fn parse_version_listing(metadata: &XmlElement) -> (Vec<String>, Option<String>) {
    let mut listed: Vec<&XmlElement> = metadata.find_all("versioning/versions/version");
    if listed.is_empty() {
        listed = metadata.find_all("version");
    }

    let versions = unique_names(
        listed
            .into_iter()
            .map(|v| v.text.trim().to_string())
            .filter(|v| !v.is_empty() && !v.ends_with(SNAPSHOT_SUFFIX)),
    );

    let latest = ["versioning/latest", "versioning/release", "version"]
        .iter()
        .find_map(|path| metadata.text_at(path))
        .map(str::to_string)
        .or_else(|| versions.last().cloned());

    (versions, latest)
}

/// Package names from an `all-poms.txt` listing
/// (`./org/clojure/clojure/1.11.1/clojure-1.11.1.pom`).
fn parse_pom_listing(listing: &str) -> Vec<String> {
    unique_names(listing.lines().filter_map(|line| {
        let parts: Vec<&str> = line
            .trim()
            .trim_start_matches("./")
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        // group segments..., artifact, version, file
        if parts.len() < 4 {
            return None;
        }
        let artifact = parts[parts.len() - 3];
        let group = parts[..parts.len() - 3].join(".");
        Some(package_name(&group, artifact))
    }))
}

impl RegistryAdapter for MavenAdapter {
    type Raw = MavenPackage;

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Maven
    }

    fn registry_url(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(v) => format!("{}/{}/versions/{}", self.web_url, name, v),
            None => format!("{}/{}", self.web_url, name),
        }
    }

    fn install_command(&self, name: &str, version: Option<&str>) -> String {
        let (group, artifact) = parse_package_name(name);
        match version {
            Some(v) => format!("mvn dependency:get -Dartifact={}:{}:{}", group, artifact, v),
            None => format!("mvn dependency:get -Dartifact={}:{}", group, artifact),
        }
    }

    fn download_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        let version = version.filter(|v| !v.is_empty())?;
        let (group, artifact) = parse_package_name(name);
        let coord = Coordinate::new(group, artifact, version);
        Some(format!("{}/{}", self.repo_url, coord.jar_path()))
    }

    async fn all_package_names(&self) -> Vec<String> {
        let url = format!("{}/all-poms.txt", self.repo_url);
        match self.fetcher.get_raw(&url).await {
            Ok(listing) => parse_pom_listing(&listing),
            Err(e) => {
                warn!(error = %e, "failed to read pom listing");
                Vec::new()
            }
        }
    }

    async fn recently_updated_package_names(&self) -> Vec<String> {
        let url = format!("{}/", self.web_url);
        let page = match self.fetcher.get_html(&url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "failed to read recent artifacts page");
                return Vec::new();
            }
        };

        let names = page
            .root
            .descendants()
            .into_iter()
            .filter(|el| el.has_class("recent-jar-title"))
            .flat_map(|el| el.descendants())
            .filter(|el| el.name == "a")
            .map(|a| a.text_content().trim().to_string())
            .filter(|name| !name.is_empty());

        unique_names(names)
    }

    async fn fetch_package_metadata(&self, name: &str) -> Result<Option<MavenPackage>, RegistryError> {
        let (group, artifact) = parse_package_name(name);
        let url = format!(
            "{}/{}/{}/maven-metadata.xml",
            self.repo_url,
            pom::group_to_path(group),
            artifact
        );
        debug!(package = name, url = %url, "fetching maven metadata");

        let metadata = match self.fetcher.get_xml(&url).await {
            Ok(fetched) => fetched.body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let empty = XmlElement::default();
        let (versions, latest_version) =
            parse_version_listing(metadata.root_element().unwrap_or(&empty));

        let document = match &latest_version {
            Some(latest) => resolve_document(self, &Coordinate::new(group, artifact, latest)).await?,
            None => None,
        };

        Ok(Some(MavenPackage {
            name: name.to_string(),
            group: group.to_string(),
            artifact: artifact.to_string(),
            versions,
            latest_version,
            document,
        }))
    }

    fn map_package_metadata(&self, raw: MavenPackage) -> Mapping<MappedPackage<MavenPackage>> {
        if raw.versions.is_empty() {
            return Mapping::Invalid;
        }

        let doc = raw.document.clone().unwrap_or_default();
        let licenses = (!doc.licenses.is_empty()).then(|| doc.licenses.join(","));

        let record = PackageRecord {
            name: raw.name.clone(),
            homepage: doc.homepage,
            description: doc.description,
            keywords: Vec::new(),
            licenses,
            repository_url: doc.repository_url,
            downloads: None,
            downloads_period: None,
            metadata: json_map(json!({
                "group_id": raw.group,
                "artifact_id": raw.artifact,
                "latest_version": raw.latest_version,
                "properties": doc.properties,
            })),
        };

        Mapping::Valid(MappedPackage { record, raw })
    }

    async fn versions_metadata(&self, package: &MappedPackage<MavenPackage>) -> Vec<VersionRecord> {
        let raw = &package.raw;
        let mut records = Vec::with_capacity(raw.versions.len());

        for chunk in raw.versions.chunks(self.concurrency) {
            let fetched = join_all(chunk.iter().map(|number| self.version_record(raw, number))).await;
            records.extend(fetched.into_iter().flatten());
        }

        records
    }

    async fn dependencies_metadata(
        &self,
        name: &str,
        version: &str,
        package: &MappedPackage<MavenPackage>,
    ) -> Vec<DependencyRecord> {
        let (group, artifact) = parse_package_name(name);
        let coord = Coordinate::new(group, artifact, version);

        let descriptor = match self.fetch_descriptor(&coord).await {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                debug!(version = %coord, "no descriptor, no dependencies");
                return Vec::new();
            }
            Err(RegistryError::Fetch(e)) => {
                log_soft_failure(name, &e, "dependencies");
                return Vec::new();
            }
            Err(e) => {
                warn!(version = %coord, error = %e, "descriptor failed");
                return Vec::new();
            }
        };

        let Some(project) = descriptor.body.root_element() else {
            return Vec::new();
        };

        let inherited: BTreeMap<String, String> = package
            .raw
            .document
            .as_ref()
            .map(|d| d.properties.clone())
            .unwrap_or_default();
        let vars = pom::substitution_vars(project, &inherited);

        pom::extract_dependencies(project, &vars)
            .into_iter()
            .map(|dep| DependencyRecord {
                package_name: dep.name(),
                requirements: dep.version.unwrap_or_else(|| ANY_REQUIREMENT.to_string()),
                kind: dep.scope.unwrap_or_else(|| "runtime".to_string()),
                optional: dep.optional,
                ecosystem: self.ecosystem().as_str().to_string(),
            })
            .collect()
    }

    async fn maintainers_metadata(&self, _name: &str) -> Vec<MaintainerRecord> {
        // Descriptors name developers without stable identities.
        Vec::new()
    }
}
