//! Descriptor resolution through relocation and parent inheritance.
//!
//! Relocation is followed with an explicit `seen` set, so a relocation cycle
//! of any length ends at the last descriptor before the cycle closes.
//! Inheritance climbs at most [`MAX_PARENT_DEPTH`] ancestors; anything above
//! that is treated as absent.

use std::collections::{BTreeMap, HashSet};
use std::future::Future;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::pom::{
    Coordinate, extract_licenses, extract_properties, parent_coordinate, relocation_target,
    substitute, substitution_vars,
};
use crate::fetch::{Fetched, XmlDocument, XmlElement, repository_fallback};
use crate::registry::RegistryError;

pub const MAX_PARENT_DEPTH: usize = 5;

/// Somewhere descriptors can be read from.
pub trait DescriptorSource: Send + Sync {
    /// The descriptor for `coord`, or `Ok(None)` when the upstream has none.
    fn fetch_descriptor(
        &self,
        coord: &Coordinate,
    ) -> impl Future<Output = Result<Option<Fetched<XmlDocument>>, RegistryError>> + Send;
}

/// An artifact's description after relocation and inheritance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDocument {
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub repository_url: Option<String>,
    pub licenses: Vec<String>,
    pub properties: BTreeMap<String, String>,
    /// Upload time of the descriptor this was built from.
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetch the descriptor for `coord`, following relocations.
///
/// Returns `Ok(None)` only when `coord` itself has no descriptor. A cycle, or
/// a relocation target that cannot be fetched, yields the last descriptor
/// that was read.
pub async fn fetch_relocated<S: DescriptorSource>(
    source: &S,
    coord: &Coordinate,
) -> Result<Option<Fetched<XmlDocument>>, RegistryError> {
    follow_relocation(source, coord.clone(), HashSet::new()).await
}

fn follow_relocation<'a, S: DescriptorSource>(
    source: &'a S,
    coord: Coordinate,
    mut seen: HashSet<Coordinate>,
) -> BoxFuture<'a, Result<Option<Fetched<XmlDocument>>, RegistryError>> {
    async move {
        let Some(descriptor) = source.fetch_descriptor(&coord).await? else {
            return Ok(None);
        };

        let target = match descriptor.body.root_element() {
            Some(project) => relocation_target(project, &coord),
            None => coord.clone(),
        };
        seen.insert(coord.clone());

        if seen.contains(&target) {
            return Ok(Some(descriptor));
        }

        debug!(from = %coord, to = %target, "following relocation");
        match follow_relocation(source, target.clone(), seen).await {
            Ok(Some(relocated)) => Ok(Some(relocated)),
            Ok(None) => {
                debug!(target = %target, "relocation target missing, keeping original");
                Ok(Some(descriptor))
            }
            Err(e) => {
                warn!(target = %target, error = %e, "relocation target failed, keeping original");
                Ok(Some(descriptor))
            }
        }
    }
    .boxed()
}

/// Resolve the full document for `coord`: follow relocation, then merge in
/// up to [`MAX_PARENT_DEPTH`] ancestors. Child values win.
pub async fn resolve_document<S: DescriptorSource>(
    source: &S,
    coord: &Coordinate,
) -> Result<Option<ResolvedDocument>, RegistryError> {
    resolve_at_depth(source, coord.clone(), 0).await
}

fn resolve_at_depth<'a, S: DescriptorSource>(
    source: &'a S,
    coord: Coordinate,
    depth: usize,
) -> BoxFuture<'a, Result<Option<ResolvedDocument>, RegistryError>> {
    async move {
        let Some(descriptor) = fetch_relocated(source, &coord).await? else {
            return Ok(None);
        };

        let empty = XmlElement::default();
        let project = descriptor.body.root_element().unwrap_or(&empty);

        let parent = match parent_coordinate(project) {
            Some(parent) if depth < MAX_PARENT_DEPTH => {
                match resolve_at_depth(source, parent.clone(), depth + 1).await {
                    Ok(Some(doc)) => doc,
                    Ok(None) => {
                        debug!(parent = %parent, "parent descriptor missing");
                        ResolvedDocument::default()
                    }
                    Err(e) => {
                        warn!(parent = %parent, error = %e, "parent descriptor failed");
                        ResolvedDocument::default()
                    }
                }
            }
            Some(parent) => {
                debug!(parent = %parent, depth, "parent depth ceiling reached");
                ResolvedDocument::default()
            }
            None => ResolvedDocument::default(),
        };

        Ok(Some(merge(
            parent,
            project,
            &descriptor.body.comments,
            descriptor.last_modified,
        )))
    }
    .boxed()
}

/// Overlay one descriptor on its resolved parent.
fn merge(
    parent: ResolvedDocument,
    project: &XmlElement,
    comments: &[String],
    published_at: Option<DateTime<Utc>>,
) -> ResolvedDocument {
    let vars = substitution_vars(project, &parent.properties);
    let field = |path: &str| project.text_at(path).map(|v| substitute(v, &vars));

    let description = field("description");
    let homepage = field("url");
    let scm_url = field("scm/url");
    let repository_url = repository_fallback(scm_url.as_deref(), homepage.as_deref());
    let licenses = extract_licenses(project, comments);

    let mut properties = parent.properties;
    properties.extend(extract_properties(project));

    ResolvedDocument {
        description: description.or(parent.description),
        homepage: homepage.or(parent.homepage),
        repository_url: repository_url.or(parent.repository_url),
        licenses: if licenses.is_empty() {
            parent.licenses
        } else {
            licenses
        },
        properties,
        published_at,
    }
}
