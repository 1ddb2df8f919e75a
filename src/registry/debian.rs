//! Debian-style archive adapter (Ubuntu layout).
//!
//! The archive has no per-package API. Every `Sources.gz` of the configured
//! release is downloaded once, parsed into control stanzas and kept for the
//! lifetime of the adapter.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use super::adapter::{MappedPackage, Mapping, RegistryAdapter};
use super::error::RegistryError;
use super::json_map;
use crate::config::DebianConfig;
use crate::fetch::Fetcher;
use crate::types::{
    ANY_REQUIREMENT, DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord,
    dedup_by_key,
};

const LAUNCHPAD_SOURCE: &str = "https://launchpad.net/ubuntu/+source";

/// Relationship fields read as dependencies, with whether they are optional.
const DEPENDENCY_FIELDS: &[(&str, bool)] = &[
    ("Depends", false),
    ("Recommends", true),
    ("Suggests", true),
    ("Pre-Depends", false),
    ("Build-Depends", false),
    ("Build-Depends-Indep", false),
    ("Build-Depends-Arch", false),
];

/// One paragraph of a Debian control file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlStanza {
    pub fields: BTreeMap<String, String>,
}

impl ControlStanza {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.get("Package")
    }

    /// Archive component, from the `Directory` field (`pool/<component>/...`).
    pub fn component(&self) -> Option<&str> {
        self.get("Directory")?.split('/').nth(1)
    }
}

/// Parse control-file text into stanzas.
///
/// Stanzas are separated by blank lines. Each line is `Key: Value`; lines
/// starting with whitespace continue the previous field. Fields whose value
/// ends up empty are dropped.
pub fn parse_control_file(text: &str) -> Vec<ControlStanza> {
    let mut stanzas = Vec::new();
    let mut current = ControlStanza::default();
    let mut key: Option<String> = None;

    let mut finish = |current: &mut ControlStanza, key: &mut Option<String>| {
        *key = None;
        let mut stanza = std::mem::take(current);
        stanza.fields.retain(|_, v| !v.is_empty());
        if !stanza.fields.is_empty() {
            stanzas.push(stanza);
        }
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            finish(&mut current, &mut key);
            continue;
        }

        if line.starts_with([' ', '\t']) {
            if let Some(k) = &key {
                let value = current.fields.entry(k.clone()).or_default();
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(line.trim());
            }
            continue;
        }

        // `Key: value`, or a bare `Key:` whose value is on continuation lines.
        let field = line
            .split_once(": ")
            .or_else(|| line.trim_end().strip_suffix(':').map(|k| (k, "")));
        match field {
            Some((k, v)) => {
                let k = k.trim().to_string();
                current.fields.insert(k.clone(), v.trim().to_string());
                key = Some(k);
            }
            None => key = None,
        }
    }
    finish(&mut current, &mut key);

    stanzas
}

/// Split `Name <email>` into its parts.
fn parse_person(raw: &str) -> Option<MaintainerRecord> {
    let (name, email) = match raw.split_once('<') {
        Some((name, rest)) => (name.trim(), rest.trim_end().trim_end_matches('>').trim()),
        None => (raw.trim(), ""),
    };
    let name = (!name.is_empty()).then(|| name.to_string());
    let email = (!email.is_empty()).then(|| email.to_string());

    Some(MaintainerRecord {
        uuid: email.clone().or_else(|| name.clone())?,
        name,
        email,
        ..Default::default()
    })
}

/// Pool directory prefix: `libfoo` lives under `libf`, everything else
/// under its first letter.
fn pool_prefix(name: &str) -> &str {
    let len = if name.starts_with("lib") && name.len() > 3 { 4 } else { 1 };
    name.get(..len).unwrap_or(name)
}

/// Debian-style archive adapter.
pub struct DebianAdapter {
    fetcher: Fetcher,
    archive_url: String,
    codename: String,
    components: Vec<String>,
    packages: OnceCell<Arc<Vec<ControlStanza>>>,
}

impl DebianAdapter {
    pub fn new(fetcher: Fetcher, config: &DebianConfig) -> Self {
        Self {
            fetcher,
            archive_url: config.url.trim_end_matches('/').to_string(),
            codename: config.codename.clone(),
            components: config.components.clone(),
            packages: OnceCell::new(),
        }
    }

    /// All source stanzas of the release, loaded on first use.
    ///
    /// A failed load leaves the cache empty so the next call retries.
    pub async fn packages(&self) -> Result<Arc<Vec<ControlStanza>>, RegistryError> {
        self.packages
            .get_or_try_init(|| self.load_packages())
            .await
            .cloned()
    }

    async fn load_packages(&self) -> Result<Arc<Vec<ControlStanza>>, RegistryError> {
        let loads = self.components.iter().map(|component| async move {
            let url = format!(
                "{}/dists/{}/{}/source/Sources.gz",
                self.archive_url, self.codename, component
            );
            (component, self.fetcher.get_raw(&url).await)
        });

        let mut packages = Vec::new();
        let mut failures = Vec::new();
        for (component, result) in join_all(loads).await {
            match result {
                Ok(text) => packages.extend(parse_control_file(&text)),
                Err(e) => {
                    warn!(component = %component, error = %e, "skipping archive component");
                    failures.push(format!("{}: {}", component, e));
                }
            }
        }

        if !self.components.is_empty() && failures.len() == self.components.len() {
            return Err(RegistryError::Archive(failures.join("; ")));
        }

        info!(
            codename = %self.codename,
            count = packages.len(),
            "loaded archive sources"
        );
        Ok(Arc::new(packages))
    }
}

impl RegistryAdapter for DebianAdapter {
    type Raw = ControlStanza;

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Debian
    }

    fn registry_url(&self, name: &str, version: Option<&str>) -> String {
        format!("{}/{}/{}", LAUNCHPAD_SOURCE, name, version.unwrap_or_default())
    }

    fn install_command(&self, name: &str, _version: Option<&str>) -> String {
        format!("apt-get install {}", name)
    }

    fn download_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        let version = version.filter(|v| !v.is_empty())?;
        Some(format!(
            "{}/pool/main/{}/{}/{}_{}.tar.xz",
            self.archive_url,
            pool_prefix(name),
            name,
            name,
            version
        ))
    }

    async fn all_package_names(&self) -> Vec<String> {
        match self.packages().await {
            Ok(packages) => packages
                .iter()
                .filter_map(|p| p.name())
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to load archive sources");
                Vec::new()
            }
        }
    }

    async fn recently_updated_package_names(&self) -> Vec<String> {
        Vec::new()
    }

    async fn fetch_package_metadata(&self, name: &str) -> Result<Option<ControlStanza>, RegistryError> {
        let packages = self.packages().await?;
        Ok(packages.iter().find(|p| p.name() == Some(name)).cloned())
    }

    fn map_package_metadata(&self, raw: ControlStanza) -> Mapping<MappedPackage<ControlStanza>> {
        let Some(name) = raw.name() else {
            return Mapping::Invalid;
        };

        let record = PackageRecord {
            name: name.to_string(),
            homepage: raw.get("Homepage").map(str::to_string),
            description: None,
            keywords: raw
                .get("Section")
                .map(|s| s.split(", ").map(str::to_string).collect())
                .unwrap_or_default(),
            licenses: None,
            repository_url: raw.get("Vcs-Browser").map(str::to_string),
            downloads: None,
            downloads_period: None,
            metadata: json_map(json!({
                "component": raw.component(),
                "architecture": raw.get("Architecture"),
                "priority": raw.get("Priority"),
                "binary": raw.get("Binary"),
                "standards_version": raw.get("Standards-Version"),
            })),
        };

        Mapping::Valid(MappedPackage { record, raw })
    }

    async fn versions_metadata(&self, package: &MappedPackage<ControlStanza>) -> Vec<VersionRecord> {
        package
            .raw
            .get("Version")
            .map(VersionRecord::new)
            .into_iter()
            .collect()
    }

    async fn dependencies_metadata(
        &self,
        _name: &str,
        _version: &str,
        package: &MappedPackage<ControlStanza>,
    ) -> Vec<DependencyRecord> {
        let mut deps = Vec::new();

        for (field, optional) in DEPENDENCY_FIELDS {
            let Some(value) = package.raw.get(field) else {
                continue;
            };

            for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                let Some(name) = entry.split_whitespace().next() else {
                    continue;
                };
                let requirements = match (entry.find('('), entry.find(')')) {
                    (Some(open), Some(close)) if open < close => entry[open + 1..close].trim(),
                    _ => ANY_REQUIREMENT,
                };

                deps.push(DependencyRecord {
                    package_name: name.to_string(),
                    requirements: requirements.to_string(),
                    kind: field.to_string(),
                    optional: *optional,
                    ecosystem: self.ecosystem().as_str().to_string(),
                });
            }
        }

        deps
    }

    async fn maintainers_metadata(&self, name: &str) -> Vec<MaintainerRecord> {
        let stanza = match self.fetch_package_metadata(name).await {
            Ok(Some(stanza)) => stanza,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(package = name, error = %e, "failed to load maintainers");
                return Vec::new();
            }
        };

        let uploaders = stanza.get("Uploaders").unwrap_or_default();
        let people: Vec<MaintainerRecord> = stanza
            .get("Maintainer")
            .into_iter()
            .chain(uploaders.split(','))
            .filter_map(parse_person)
            .collect();

        dedup_by_key(people, |m| m.uuid.clone())
    }
}
