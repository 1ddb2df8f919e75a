//! PyPI registry adapter.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::adapter::{MappedPackage, Mapping, RegistryAdapter};
use super::error::RegistryError;
use super::{json_map, lenient_entries, lenient_list, log_soft_failure};
use crate::config::PypiConfig;
use crate::fetch::{Fetcher, repository_fallback};
use crate::types::{
    ANY_REQUIREMENT, DependencyRecord, Ecosystem, MaintainerRecord, PackageRecord, VersionRecord,
    VersionStatus, dedup_by_key, unique_names,
};

const SOURCE_DOWNLOAD: &str = "https://files.pythonhosted.org/packages/source";
const LICENSE_CLASSIFIER: &str = "License :: ";

/// PyPI registry adapter.
pub struct PypiAdapter {
    fetcher: Fetcher,
    base_url: String,
}

impl PypiAdapter {
    pub fn new(fetcher: Fetcher, config: &PypiConfig) -> Self {
        Self {
            fetcher,
            base_url: config.url.trim_end_matches('/').to_string(),
        }
    }

    /// First whitespace token of every item title in an RSS feed.
    async fn feed_names(&self, feed: &str) -> Vec<String> {
        let url = format!("{}/rss/{}", self.base_url, feed);
        let doc = match self.fetcher.get_xml(&url).await {
            Ok(doc) => doc.body,
            Err(e) => {
                warn!(feed, error = %e, "failed to read pypi feed");
                return Vec::new();
            }
        };

        doc.root_element()
            .map(|rss| rss.find_all("channel/item/title"))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|title| title.text.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }
}

// PyPI JSON API response types
#[derive(Debug, Clone, Deserialize)]
pub struct PypiProject {
    pub info: Option<PypiInfo>,
    #[serde(default, deserialize_with = "lenient_releases")]
    pub releases: BTreeMap<String, Vec<PypiFile>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PypiInfo {
    pub name: String,
    pub summary: Option<String>,
    pub home_page: Option<String>,
    pub keywords: Option<String>,
    pub license: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub classifiers: Vec<String>,
    pub project_urls: Option<HashMap<String, String>>,
    pub requires_python: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub requires_dist: Vec<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub maintainer_email: Option<String>,
}

impl PypiInfo {
    fn project_url(&self, key: &str) -> Option<&str> {
        self.project_urls
            .as_ref()
            .and_then(|urls| urls.get(key))
            .map(String::as_str)
            .and_then(present)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PypiFile {
    pub upload_time_iso_8601: Option<DateTime<Utc>>,
    pub upload_time: Option<String>,
    pub digests: Option<PypiDigests>,
    #[serde(default)]
    pub yanked: bool,
}

impl PypiFile {
    fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        self.upload_time_iso_8601.or_else(|| {
            let raw = self.upload_time.as_deref()?;
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|t| t.and_utc())
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PypiDigests {
    pub sha256: Option<String>,
}

/// Release files keyed by version. A release that is not a list, or a file
/// entry that does not parse, is dropped on its own.
fn lenient_releases<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<PypiFile>>, D::Error>
where
    D: Deserializer<'de>,
{
    let releases = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?;
    Ok(releases
        .unwrap_or_default()
        .into_iter()
        .map(|(number, files)| {
            let files = match files {
                Value::Array(entries) => lenient_entries(entries, "release file"),
                _ => Vec::new(),
            };
            (number, files)
        })
        .collect())
}

fn present(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// `info.license`, or the last segment of every `License ::` classifier.
fn licenses(info: &PypiInfo) -> Option<String> {
    if let Some(license) = info.license.as_deref().and_then(present) {
        return Some(license.to_string());
    }

    let from_classifiers: Vec<&str> = info
        .classifiers
        .iter()
        .filter(|c| c.starts_with(LICENSE_CLASSIFIER))
        .filter_map(|c| c.rsplit(":: ").next())
        .collect();

    (!from_classifiers.is_empty()).then(|| from_classifiers.join(","))
}

/// One `requires_dist` entry split into (name, requirement, condition).
///
/// Accepts both `name (>=1.0); cond` and `name>=1.0; cond`. Extras in
/// brackets are dropped from the name.
fn parse_requirement(entry: &str) -> Option<(String, String, Option<String>)> {
    let (spec, condition) = match entry.split_once(';') {
        Some((spec, condition)) => (spec.trim(), present(condition).map(str::to_string)),
        None => (entry.trim(), None),
    };

    let name_end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        .unwrap_or(spec.len());
    let name = &spec[..name_end];
    if name.is_empty() {
        return None;
    }

    let mut rest = spec[name_end..].trim_start();
    if rest.starts_with('[') {
        rest = rest.find(']').map_or("", |end| rest[end + 1..].trim_start());
    }

    let requirement = match (rest.find('('), rest.rfind(')')) {
        (Some(open), Some(close)) if open < close => present(&rest[open + 1..close]),
        _ => present(rest),
    };

    Some((
        name.to_string(),
        requirement.unwrap_or(ANY_REQUIREMENT).to_string(),
        condition,
    ))
}

/// Strip quoting and the `extra ==` marker from an environment condition.
fn normalize_condition(condition: &str) -> String {
    condition
        .replace(['"', '\''], "")
        .replace("extra == ", "")
        .replace("extra==", "")
        .trim()
        .to_string()
}

impl RegistryAdapter for PypiAdapter {
    type Raw = PypiProject;

    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Pypi
    }

    fn registry_url(&self, name: &str, version: Option<&str>) -> String {
        match version {
            Some(v) => format!("{}/project/{}/{}/", self.base_url, name, v),
            None => format!("{}/project/{}/", self.base_url, name),
        }
    }

    fn install_command(&self, name: &str, version: Option<&str>) -> String {
        let pinned = match version {
            Some(v) => format!("{}=={}", name, v),
            None => name.to_string(),
        };
        format!("pip install {} --index-url {}/simple", pinned, self.base_url)
    }

    fn download_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        let version = version.filter(|v| !v.is_empty())?;
        let initial = name.chars().next()?;
        Some(format!(
            "{}/{}/{}/{}-{}.tar.gz",
            SOURCE_DOWNLOAD, initial, name, name, version
        ))
    }

    fn documentation_url(&self, name: &str, version: Option<&str>) -> Option<String> {
        Some(match version {
            Some(v) => format!("https://{}.readthedocs.io/en/{}", name, v),
            None => format!("https://{}.readthedocs.io/", name),
        })
    }

    async fn all_package_names(&self) -> Vec<String> {
        let url = format!("{}/simple/", self.base_url);
        let index = match self.fetcher.get_html(&url).await {
            Ok(index) => index,
            Err(e) => {
                warn!(error = %e, "failed to read pypi simple index");
                return Vec::new();
            }
        };

        let names: Vec<String> = index
            .root
            .descendants()
            .into_iter()
            .filter(|el| el.name == "a")
            .map(|a| a.text_content().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        debug!(count = names.len(), "listed pypi projects");
        names
    }

    async fn recently_updated_package_names(&self) -> Vec<String> {
        let updated = self.feed_names("updates.xml").await;
        let created = self.feed_names("packages.xml").await;
        unique_names(updated.into_iter().chain(created))
    }

    async fn fetch_package_metadata(&self, name: &str) -> Result<Option<PypiProject>, RegistryError> {
        let url = format!("{}/pypi/{}/json", self.base_url, name);
        debug!(package = name, url = %url, "fetching pypi project");

        match self.fetcher.get_json(&url).await {
            Ok(project) => Ok(Some(project)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn map_package_metadata(&self, raw: PypiProject) -> Mapping<MappedPackage<PypiProject>> {
        let Some(info) = raw.info.as_ref() else {
            return Mapping::Invalid;
        };

        let homepage = info
            .home_page
            .as_deref()
            .and_then(present)
            .or_else(|| info.project_url("Homepage"));
        let source = info
            .project_url("Source")
            .or_else(|| info.project_url("Source Code"));

        let record = PackageRecord {
            name: info.name.clone(),
            homepage: homepage.map(str::to_string),
            description: info.summary.clone(),
            keywords: info
                .keywords
                .as_deref()
                .unwrap_or_default()
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
            licenses: licenses(info),
            repository_url: repository_fallback(source, homepage),
            downloads: None,
            downloads_period: None,
            metadata: json_map(json!({
                "requires_python": info.requires_python,
                "classifiers": info.classifiers.clone(),
            })),
        };

        Mapping::Valid(MappedPackage { record, raw })
    }

    async fn versions_metadata(&self, package: &MappedPackage<PypiProject>) -> Vec<VersionRecord> {
        package
            .raw
            .releases
            .iter()
            .filter_map(|(number, files)| {
                let first = files.first()?;
                Some(VersionRecord {
                    number: number.clone(),
                    published_at: first.uploaded_at(),
                    status: files.iter().all(|f| f.yanked).then_some(VersionStatus::Yanked),
                    integrity: first
                        .digests
                        .as_ref()
                        .and_then(|d| d.sha256.as_ref())
                        .map(|sha| format!("sha256-{}", sha)),
                    ..Default::default()
                })
            })
            .collect()
    }

    async fn dependencies_metadata(
        &self,
        name: &str,
        version: &str,
        _package: &MappedPackage<PypiProject>,
    ) -> Vec<DependencyRecord> {
        let url = format!("{}/pypi/{}/{}/json", self.base_url, name, version);

        let requires = match self.fetcher.get_json::<PypiProject>(&url).await {
            Ok(release) => release.info.map(|i| i.requires_dist).unwrap_or_default(),
            Err(e) => {
                log_soft_failure(name, &e, "dependencies");
                return Vec::new();
            }
        };

        requires
            .iter()
            .filter_map(|entry| parse_requirement(entry))
            .map(|(package_name, requirements, condition)| {
                let optional = condition.as_deref().is_some_and(|c| c.contains("extra"));
                let kind = condition
                    .as_deref()
                    .map(normalize_condition)
                    .filter(|c| !c.is_empty())
                    .unwrap_or_else(|| "runtime".to_string());

                DependencyRecord {
                    package_name,
                    requirements,
                    kind,
                    optional,
                    ecosystem: self.ecosystem().as_str().to_string(),
                }
            })
            .collect()
    }

    async fn maintainers_metadata(&self, name: &str) -> Vec<MaintainerRecord> {
        let project = match self.fetch_package_metadata(name).await {
            Ok(Some(project)) => project,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(package = name, error = %e, "failed to fetch maintainers");
                return Vec::new();
            }
        };
        let Some(info) = project.info else {
            return Vec::new();
        };

        let people = [
            (info.author.as_deref(), info.author_email.as_deref()),
            (info.maintainer.as_deref(), info.maintainer_email.as_deref()),
        ];

        let maintainers: Vec<MaintainerRecord> = people
            .into_iter()
            .filter_map(|(name, email)| {
                let name = name.and_then(present);
                let email = email.and_then(present);
                Some(MaintainerRecord {
                    uuid: email.or(name)?.to_string(),
                    name: name.map(str::to_string),
                    login: None,
                    email: email.map(str::to_string),
                    url: None,
                })
            })
            .collect();

        dedup_by_key(maintainers, |m| m.uuid.clone())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::HttpConfig;

    fn adapter(server: &MockServer) -> PypiAdapter {
        PypiAdapter::new(
            Fetcher::new(&HttpConfig::default()),
            &PypiConfig { url: server.uri() },
        )
    }

    fn offline() -> PypiAdapter {
        PypiAdapter::new(Fetcher::new(&HttpConfig::default()), &PypiConfig::default())
    }

    fn project_json() -> serde_json::Value {
        json!({
            "info": {
                "name": "requests",
                "summary": "Python HTTP for Humans.",
                "home_page": "",
                "keywords": "http, client  web",
                "license": "",
                "classifiers": [
                    "License :: OSI Approved :: Apache Software License",
                    "Programming Language :: Python :: 3"
                ],
                "project_urls": {
                    "Homepage": "https://requests.readthedocs.io",
                    "Source": "https://github.com/psf/requests"
                },
                "requires_python": ">=3.8",
                "author": "Kenneth Reitz",
                "author_email": "me@kennethreitz.org",
                "maintainer": null,
                "maintainer_email": null
            },
            "releases": {
                "2.31.0": [
                    {
                        "upload_time": "2023-05-22T15:12:42",
                        "upload_time_iso_8601": "2023-05-22T15:12:42.313790Z",
                        "digests": { "sha256": "58cd2187" },
                        "yanked": false
                    }
                ],
                "2.32.0": [
                    {
                        "upload_time": "2024-05-20T15:00:00",
                        "digests": { "sha256": "fa5490" },
                        "yanked": true
                    }
                ],
                "0.0.1": []
            }
        })
    }

    #[test]
    fn test_urls() {
        let a = offline();
        assert_eq!(a.registry_url("requests", None), "https://pypi.org/project/requests/");
        assert_eq!(
            a.install_command("requests", Some("2.31.0")),
            "pip install requests==2.31.0 --index-url https://pypi.org/simple"
        );
        assert_eq!(
            a.download_url("requests", Some("2.31.0")).unwrap(),
            "https://files.pythonhosted.org/packages/source/r/requests/requests-2.31.0.tar.gz"
        );
        assert_eq!(a.download_url("requests", None), None);
        assert_eq!(
            a.documentation_url("requests", Some("2.31.0")).unwrap(),
            "https://requests.readthedocs.io/en/2.31.0"
        );
    }

    #[test]
    fn test_parse_requirement_forms() {
        assert_eq!(
            parse_requirement("urllib3 (<3,>=1.21.1)"),
            Some(("urllib3".to_string(), "<3,>=1.21.1".to_string(), None))
        );
        assert_eq!(
            parse_requirement("idna<4,>=2.5"),
            Some(("idna".to_string(), "<4,>=2.5".to_string(), None))
        );
        assert_eq!(
            parse_requirement("PySocks[socks] (!=1.5.7,>=1.5.6); extra == 'socks'"),
            Some((
                "PySocks".to_string(),
                "!=1.5.7,>=1.5.6".to_string(),
                Some("extra == 'socks'".to_string())
            ))
        );
        assert_eq!(
            parse_requirement("charset_normalizer"),
            Some(("charset_normalizer".to_string(), "*".to_string(), None))
        );
        assert_eq!(parse_requirement("; extra == 'x'"), None);
    }

    #[test]
    fn test_normalize_condition() {
        assert_eq!(normalize_condition("extra == 'socks'"), "socks");
        assert_eq!(normalize_condition("extra==\"use_chardet\""), "use_chardet");
        assert_eq!(normalize_condition("python_version < \"3.8\""), "python_version < 3.8");
    }

    #[tokio::test]
    async fn test_map_and_versions() {
        let a = offline();
        let raw: PypiProject = serde_json::from_value(project_json()).unwrap();
        let mapped = a.map_package_metadata(raw).valid().unwrap();

        let record = &mapped.record;
        assert_eq!(record.name, "requests");
        assert_eq!(record.homepage.as_deref(), Some("https://requests.readthedocs.io"));
        assert_eq!(record.keywords, vec!["http", "client", "web"]);
        assert_eq!(record.licenses.as_deref(), Some("Apache Software License"));
        assert_eq!(record.repository_url.as_deref(), Some("https://github.com/psf/requests"));
        assert_eq!(record.metadata["requires_python"], ">=3.8");

        let versions = a.versions_metadata(&mapped).await;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].number, "2.31.0");
        assert_eq!(versions[0].integrity.as_deref(), Some("sha256-58cd2187"));
        assert_eq!(versions[0].status, None);
        assert!(versions[0].published_at.is_some());
        assert_eq!(versions[1].number, "2.32.0");
        assert_eq!(versions[1].status, Some(VersionStatus::Yanked));
        assert!(versions[1].published_at.is_some());
    }

    #[tokio::test]
    async fn test_malformed_entries_are_skipped() {
        let raw: PypiProject = serde_json::from_value(json!({
            "info": {
                "name": "requests",
                "classifiers": [null, "License :: OSI Approved :: MIT License"],
                "requires_dist": ["certifi", null, 7, "idna (<4,>=2.5)"]
            },
            "releases": {
                "1.0": [
                    { "upload_time": "2020-01-01T00:00:00", "yanked": "sometimes" },
                    { "upload_time": "2020-01-02T00:00:00", "digests": { "sha256": "ab12" } }
                ],
                "1.1": "not a list"
            }
        }))
        .unwrap();

        let info = raw.info.as_ref().unwrap();
        assert_eq!(info.requires_dist, vec!["certifi", "idna (<4,>=2.5)"]);
        assert_eq!(licenses(info).as_deref(), Some("MIT License"));
        assert_eq!(raw.releases["1.0"].len(), 1);
        assert!(raw.releases["1.1"].is_empty());

        let a = offline();
        let mapped = a.map_package_metadata(raw).valid().unwrap();
        let versions = a.versions_metadata(&mapped).await;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].integrity.as_deref(), Some("sha256-ab12"));
    }

    #[test]
    fn test_missing_info_is_invalid() {
        let raw: PypiProject = serde_json::from_value(json!({ "releases": {} })).unwrap();
        assert!(!offline().map_package_metadata(raw).is_valid());
    }

    #[tokio::test]
    async fn test_dependencies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pypi/requests/2.31.0/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "info": {
                    "name": "requests",
                    "requires_dist": [
                        "charset-normalizer (<4,>=2)",
                        "certifi",
                        "PySocks (!=1.5.7,>=1.5.6) ; extra == 'socks'",
                        "importlib-metadata ; python_version < \"3.8\""
                    ]
                }
            })))
            .mount(&server)
            .await;

        let a = adapter(&server);
        let raw: PypiProject = serde_json::from_value(project_json()).unwrap();
        let mapped = a.map_package_metadata(raw).valid().unwrap();
        let deps = a.dependencies_metadata("requests", "2.31.0", &mapped).await;

        assert_eq!(deps.len(), 4);
        assert_eq!(deps[0].package_name, "charset-normalizer");
        assert_eq!(deps[0].requirements, "<4,>=2");
        assert_eq!(deps[0].kind, "runtime");
        assert_eq!(deps[1].requirements, "*");
        assert_eq!(deps[2].kind, "socks");
        assert!(deps[2].optional);
        assert_eq!(deps[3].kind, "python_version < 3.8");
        assert!(!deps[3].optional);
        assert!(deps.iter().all(|d| d.ecosystem == "pypi"));
    }

    #[tokio::test]
    async fn test_dependencies_failure_is_empty() {
        let server = MockServer::start().await;
        let a = adapter(&server);
        let raw: PypiProject = serde_json::from_value(project_json()).unwrap();
        let mapped = a.map_package_metadata(raw).valid().unwrap();
        assert!(a.dependencies_metadata("requests", "9.9", &mapped).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_missing_is_none() {
        let server = MockServer::start().await;
        assert!(adapter(&server)
            .fetch_package_metadata("nope")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_simple_index_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/simple/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<!DOCTYPE html><html><body>\n\
                 <a href=\"/simple/requests/\">requests</a><br>\n\
                 <a href=\"/simple/flask/\">flask</a><br>\n\
                 </body></html>",
            ))
            .mount(&server)
            .await;

        assert_eq!(adapter(&server).all_package_names().await, vec!["requests", "flask"]);
    }

    #[tokio::test]
    async fn test_recent_feeds_fail_independently() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rss/updates.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<rss><channel>\
                 <item><title>requests 2.32.0</title></item>\
                 <item><title>flask 3.0.0</title></item>\
                 <item><title>requests 2.31.0</title></item>\
                 </channel></rss>",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rss/packages.xml"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        assert_eq!(
            adapter(&server).recently_updated_package_names().await,
            vec!["requests", "flask"]
        );
    }

    #[tokio::test]
    async fn test_maintainers() {
        let server = MockServer::start().await;
        let mut body = project_json();
        body["info"]["maintainer"] = json!("Kenneth Reitz");
        body["info"]["maintainer_email"] = json!("me@kennethreitz.org");
        Mock::given(method("GET"))
            .and(path("/pypi/requests/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let maintainers = adapter(&server).maintainers_metadata("requests").await;
        assert_eq!(maintainers.len(), 1);
        assert_eq!(maintainers[0].uuid, "me@kennethreitz.org");
        assert_eq!(maintainers[0].name.as_deref(), Some("Kenneth Reitz"));
    }
}
