//! Source repository URL detection.

use url::Url;

/// Hosts whose `owner/repo` path shape we know how to normalize.
const FORGE_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "sr.ht",
    "git.sr.ht",
    "gitee.com",
];

/// Pick the best source repository URL for a package.
///
/// An explicit VCS URL wins when it points at a known forge; otherwise the
/// homepage is used if it does. Anything else yields `None`.
pub fn repository_fallback(explicit: Option<&str>, homepage: Option<&str>) -> Option<String> {
    explicit
        .and_then(normalize_forge_url)
        .or_else(|| homepage.and_then(normalize_forge_url))
}

/// Normalize a VCS or web URL to `https://host/owner/repo` if it points at a
/// known forge.
pub fn normalize_forge_url(raw: &str) -> Option<String> {
    let mut s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for prefix in ["scm:git:", "scm:svn:", "scm:hg:", "git+"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest;
        }
    }

    // git@github.com:owner/repo.git
    let rewritten;
    if let Some(rest) = s.strip_prefix("git@")
        && let Some((host, path)) = rest.split_once(':')
    {
        rewritten = format!("https://{}/{}", host, path);
        s = &rewritten;
    }

    let with_scheme;
    if !s.contains("://") {
        with_scheme = format!("https://{}", s);
        s = &with_scheme;
    }

    let url = Url::parse(s).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").to_lowercase();
    if !FORGE_HOSTS.contains(&host.as_str()) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|seg| !seg.is_empty());
    let owner = segments.next()?;
    let repo = segments.next()?.trim_end_matches(".git");
    if repo.is_empty() {
        return None;
    }

    Some(format!("https://{}/{}/{}", host, owner, repo))
}
