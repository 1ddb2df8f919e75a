//! POM descriptor reading: coordinates, relocation, parents, licenses,
//! properties and dependencies.
//!
//! Maven coordinates are groupId:artifactId:version. Package names in this
//! registry are `group/artifact`, collapsed to `group` when both are equal.

use std::collections::BTreeMap;

use crate::fetch::XmlElement;

/// Known license URLs that appear in header comments of POMs without a
/// `<licenses>` section. Matched without the URL scheme.
const COMMENT_LICENSES: &[(&str, &str)] = &[
    ("www.apache.org/licenses/LICENSE-2.0", "Apache-2.0"),
    ("www.eclipse.org/legal/epl-v10", "EPL-1.0"),
    ("www.eclipse.org/legal/epl-2.0", "EPL-2.0"),
    ("www.eclipse.org/org/documents/edl-v10", "BSD-3-Clause"),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    pub fn new(group: &str, artifact: &str, version: &str) -> Self {
        Self {
            group: group.to_string(),
            artifact: artifact.to_string(),
            version: version.to_string(),
        }
    }

    /// Repository-relative path of this artifact's version directory.
    pub fn version_dir(&self) -> String {
        format!("{}/{}/{}", group_to_path(&self.group), self.artifact, self.version)
    }

    /// Repository-relative path of the descriptor (`.pom`).
    pub fn pom_path(&self) -> String {
        format!("{}/{}-{}.pom", self.version_dir(), self.artifact, self.version)
    }

    /// Repository-relative path of the main artifact (`.jar`).
    pub fn jar_path(&self) -> String {
        format!("{}/{}-{}.jar", self.version_dir(), self.artifact, self.version)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// Split a package name into (group, artifact).
pub fn parse_package_name(name: &str) -> (&str, &str) {
    match name.split_once('/') {
        Some((group, artifact)) if !artifact.is_empty() => (group, artifact),
        Some((group, _)) => (group, group),
        None => (name, name),
    }
}

/// Inverse of [`parse_package_name`].
pub fn package_name(group: &str, artifact: &str) -> String {
    if group == artifact {
        group.to_string()
    } else {
        format!("{}/{}", group, artifact)
    }
}

/// Convert groupId to path (org.clojure -> org/clojure).
pub fn group_to_path(group: &str) -> String {
    group.replace('.', "/")
}

/// Where the descriptor says the artifact now lives. Missing parts default
/// to the current coordinate, so an unrelocated descriptor points at itself.
pub fn relocation_target(project: &XmlElement, current: &Coordinate) -> Coordinate {
    let relocation = project.find("distributionManagement/relocation");
    let part = |field: &str, fallback: &str| {
        relocation
            .and_then(|r| r.text_at(field))
            .unwrap_or(fallback)
            .to_string()
    };

    Coordinate {
        group: part("groupId", &current.group),
        artifact: part("artifactId", &current.artifact),
        version: part("version", &current.version),
    }
}

/// The declared parent, when all three coordinate parts are present.
pub fn parent_coordinate(project: &XmlElement) -> Option<Coordinate> {
    let parent = project.child("parent")?;
    Some(Coordinate::new(
        parent.text_at("groupId")?,
        parent.text_at("artifactId")?,
        parent.text_at("version")?,
    ))
}

/// Structured `<licenses>` names, or else identifiers for known license URLs
/// found in comments.
pub fn extract_licenses(project: &XmlElement, comments: &[String]) -> Vec<String> {
    let declared: Vec<String> = project
        .find_all("licenses/license/name")
        .into_iter()
        .map(|el| el.text.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if !declared.is_empty() {
        return declared;
    }

    COMMENT_LICENSES
        .iter()
        .filter(|(url, _)| comments.iter().any(|c| c.contains(url)))
        .map(|(_, id)| id.to_string())
        .collect()
}

/// Entries of the `<properties>` section.
pub fn extract_properties(project: &XmlElement) -> BTreeMap<String, String> {
    project
        .child("properties")
        .map(|props| {
            props
                .children
                .iter()
                .map(|p| (p.name.clone(), p.text.trim().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Properties usable for `${...}` substitution in this descriptor: the
/// inherited ones, the descriptor's own, and the `project.*` builtins.
pub fn substitution_vars(
    project: &XmlElement,
    inherited: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut vars = inherited.clone();
    vars.extend(extract_properties(project));

    for field in ["groupId", "artifactId", "version"] {
        let value = project
            .text_at(field)
            .or_else(|| project.text_at(&format!("parent/{}", field)));
        if let Some(value) = value {
            vars.insert(format!("project.{}", field), value.to_string());
            if field == "version" {
                vars.entry("version".to_string())
                    .or_insert_with(|| value.to_string());
            }
        }
    }

    if let Some(version) = project.text_at("parent/version") {
        vars.insert("project.parent.version".to_string(), version.to_string());
    }

    vars
}

/// Replace every `${name}` with its value. Unknown references stay verbatim.
pub fn substitute(value: &str, vars: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match vars.get(key) {
                    Some(v) => out.push_str(v),
                    None => {
                        out.push_str("${");
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// A `<dependency>` entry from the `<dependencies>` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub group: String,
    pub artifact: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub optional: bool,
}

impl PomDependency {
    /// `group:artifact`, or the bare name when both are equal.
    pub fn name(&self) -> String {
        if self.group == self.artifact {
            self.group.clone()
        } else {
            format!("{}:{}", self.group, self.artifact)
        }
    }
}

/// Direct dependencies. `dependencyManagement` entries are not dependencies
/// and are skipped.
pub fn extract_dependencies(project: &XmlElement, vars: &BTreeMap<String, String>) -> Vec<PomDependency> {
    project
        .find_all("dependencies/dependency")
        .into_iter()
        .filter_map(|dep| {
            let group = substitute(dep.text_at("groupId")?, vars);
            let artifact = substitute(dep.text_at("artifactId")?, vars);
            Some(PomDependency {
                group,
                artifact,
                version: dep.text_at("version").map(|v| substitute(v, vars)),
                scope: dep.text_at("scope").map(str::to_string),
                optional: dep
                    .text_at("optional")
                    .is_some_and(|o| o.eq_ignore_ascii_case("true")),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::XmlDocument;

    fn project(xml: &str) -> XmlElement {
        XmlDocument::parse_xml(xml)
            .unwrap()
            .root_element()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_package_names() {
        assert_eq!(parse_package_name("ring/ring-core"), ("ring", "ring-core"));
        assert_eq!(parse_package_name("hiccup"), ("hiccup", "hiccup"));
        assert_eq!(parse_package_name("hiccup/"), ("hiccup", "hiccup"));
        assert_eq!(package_name("hiccup", "hiccup"), "hiccup");
        assert_eq!(package_name("org.clojure", "clojure"), "org.clojure/clojure");
    }

    #[test]
    fn test_paths() {
        let c = Coordinate::new("org.clojure", "clojure", "1.11.1");
        assert_eq!(c.pom_path(), "org/clojure/clojure/1.11.1/clojure-1.11.1.pom");
        assert_eq!(c.jar_path(), "org/clojure/clojure/1.11.1/clojure-1.11.1.jar");
    }

    #[test]
    fn test_relocation_defaults_to_current() {
        let current = Coordinate::new("a", "b", "1");
        let p = project("<project><groupId>a</groupId></project>");
        assert_eq!(relocation_target(&p, &current), current);

        let p = project(
            "<project><distributionManagement><relocation>\
             <groupId>new.group</groupId></relocation></distributionManagement></project>",
        );
        assert_eq!(relocation_target(&p, &current), Coordinate::new("new.group", "b", "1"));
    }

    #[test]
    fn test_parent_requires_all_parts() {
        let p = project("<project><parent><groupId>g</groupId><artifactId>a</artifactId></parent></project>");
        assert_eq!(parent_coordinate(&p), None);

        let p = project(
            "<project><parent><groupId>g</groupId><artifactId>a</artifactId>\
             <version>2</version></parent></project>",
        );
        assert_eq!(parent_coordinate(&p), Some(Coordinate::new("g", "a", "2")));
    }

    #[test]
    fn test_licenses_prefer_structured() {
        let p = project(
            "<project><licenses><license><name>MIT</name></license></licenses></project>",
        );
        let comments = vec!["see http://www.apache.org/licenses/LICENSE-2.0".to_string()];
        assert_eq!(extract_licenses(&p, &comments), vec!["MIT"]);
    }

    #[test]
    fn test_licenses_from_comments() {
        let p = project("<project/>");
        let comments = vec![
            "Licensed under https://www.eclipse.org/legal/epl-v10.html".to_string(),
            "and http://www.apache.org/licenses/LICENSE-2.0".to_string(),
        ];
        assert_eq!(extract_licenses(&p, &comments), vec!["Apache-2.0", "EPL-1.0"]);
        assert!(extract_licenses(&p, &[]).is_empty());
    }

    #[test]
    fn test_substitute() {
        let mut vars = BTreeMap::new();
        vars.insert("clj.version".to_string(), "1.11.1".to_string());
        assert_eq!(substitute("${clj.version}", &vars), "1.11.1");
        assert_eq!(substitute("[${clj.version},)", &vars), "[1.11.1,)");
        assert_eq!(substitute("${unknown}", &vars), "${unknown}");
        assert_eq!(substitute("${open", &vars), "${open");
    }

    #[test]
    fn test_extract_dependencies() {
        let p = project(
            r#"<project>
    <version>2.0</version>
    <properties><ring.version>1.9.0</ring.version></properties>
    <dependencyManagement>
        <dependencies>
            <dependency><groupId>managed</groupId><artifactId>managed</artifactId></dependency>
        </dependencies>
    </dependencyManagement>
    <dependencies>
        <dependency>
            <groupId>org.clojure</groupId><artifactId>clojure</artifactId><version>1.11.1</version>
        </dependency>
        <dependency>
            <groupId>ring</groupId><artifactId>ring</artifactId><version>${ring.version}</version>
            <scope>test</scope><optional>true</optional>
        </dependency>
        <dependency>
            <groupId>me</groupId><artifactId>sibling</artifactId><version>${project.version}</version>
        </dependency>
    </dependencies>
</project>"#,
        );
        let vars = substitution_vars(&p, &BTreeMap::new());
        let deps = extract_dependencies(&p, &vars);

        assert_eq!(deps.len(), 3);
        assert_eq!(deps[0].name(), "org.clojure:clojure");
        assert_eq!(deps[1].name(), "ring");
        assert_eq!(deps[1].version.as_deref(), Some("1.9.0"));
        assert_eq!(deps[1].scope.as_deref(), Some("test"));
        assert!(deps[1].optional);
        assert_eq!(deps[2].version.as_deref(), Some("2.0"));
    }
}
