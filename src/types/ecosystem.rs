use serde::{Deserialize, Serialize};

/// Upstream registries with an adapter.
///
/// # Ecosystem ↔ Upstream Mapping
/// - Cargo → crates.io JSON API
/// - Maven → Maven-style artifact repository (Clojars layout)
/// - Pypi → PyPI JSON API, simple index and RSS feeds
/// - Debian → Debian-style archive `Sources.gz` control files (Ubuntu layout)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    #[value(alias = "crates")]
    Cargo,
    #[value(alias = "clojars")]
    Maven,
    Pypi,
    #[value(alias = "ubuntu")]
    Debian,
}

impl Ecosystem {
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::Cargo,
        Ecosystem::Maven,
        Ecosystem::Pypi,
        Ecosystem::Debian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Cargo => "cargo",
            Ecosystem::Maven => "maven",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Debian => "debian",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cargo" | "crates" => Ok(Ecosystem::Cargo),
            "maven" | "clojars" => Ok(Ecosystem::Maven),
            "pypi" => Ok(Ecosystem::Pypi),
            "debian" | "ubuntu" => Ok(Ecosystem::Debian),
            _ => Err(format!("unknown ecosystem: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_names() {
        for eco in Ecosystem::ALL {
            assert_eq!(eco.as_str().parse::<Ecosystem>().unwrap(), eco);
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("crates".parse::<Ecosystem>().unwrap(), Ecosystem::Cargo);
        assert_eq!("Ubuntu".parse::<Ecosystem>().unwrap(), Ecosystem::Debian);
        assert!("npm".parse::<Ecosystem>().is_err());
    }
}
