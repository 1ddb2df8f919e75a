//! Normalized records every adapter produces.
//!
//! These are plain values handed to the persistence collaborator; it owns
//! merge and upsert semantics. All of them serialize to JSON losslessly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form upstream-specific details kept alongside a record.
pub type Metadata = Map<String, Value>;

/// One package in one registry. `name` is unique within that registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub homepage: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Comma-separated license names as the upstream spells them.
    pub licenses: Option<String>,
    pub repository_url: Option<String>,
    pub downloads: Option<u64>,
    pub downloads_period: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Released,
    Yanked,
}

/// One published version of a package. `number` is opaque (not assumed
/// semver) and unique within its package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub number: String,
    pub published_at: Option<DateTime<Utc>>,
    pub status: Option<VersionStatus>,
    pub integrity: Option<String>,
    pub licenses: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl VersionRecord {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            ..Default::default()
        }
    }
}

/// Requirement used when the upstream declares no constraint.
pub const ANY_REQUIREMENT: &str = "*";

/// A dependency of one (package, version) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub package_name: String,
    /// Constraint in the upstream's own syntax, never reinterpreted.
    pub requirements: String,
    pub kind: String,
    pub optional: bool,
    pub ecosystem: String,
}

/// A person or account responsible for a package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintainerRecord {
    /// Stable identity: upstream user id, or email when there is none.
    pub uuid: String,
    pub name: Option<String>,
    pub login: Option<String>,
    pub email: Option<String>,
    pub url: Option<String>,
}

/// Keep the first record for every key, preserving order.
pub fn dedup_by_key<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + std::hash::Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// De-duplicate names, keeping first occurrence order.
pub fn unique_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    dedup_by_key(names.into_iter().collect(), |n| n.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_record_json_shape() {
        let mut v = VersionRecord::new("1.0.0");
        v.status = Some(VersionStatus::Yanked);
        v.published_at = Some("2024-01-02T03:04:05Z".parse().unwrap());

        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["number"], "1.0.0");
        assert_eq!(json["status"], "yanked");
        assert_eq!(json["published_at"], "2024-01-02T03:04:05Z");

        let back: VersionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_null_status_serializes_as_null() {
        let json = serde_json::to_value(VersionRecord::new("2")).unwrap();
        assert!(json["status"].is_null());
    }

    #[test]
    fn test_unique_names_keeps_order() {
        let names = unique_names(["b", "a", "b", "c", "a"].map(String::from));
        assert_eq!(names, vec!["b", "a", "c"]);
    }
}
