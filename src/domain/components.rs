//! Component identifiers and the ordered component → version map.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Key of the synthetic entry holding the upstream commit id
pub const UPSTREAM_KEY: &str = "VERSION";

/// Lockfile that pins dependency-manifest components
pub const LOCKFILE: &str = "Gemfile.lock";

/// A component whose version lives in a fixed file at the repository root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionFile {
    pub file: &'static str,
    /// Name recorded in release metadata
    pub release_name: &'static str,
}

/// A component pinned through the dependency lockfile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestComponent {
    pub package: &'static str,
    /// Anchored pattern that also matches historical package names
    pub pattern: &'static str,
    /// Variable name used by container-style packagers
    pub variable: &'static str,
    pub release_name: &'static str,
}

impl ManifestComponent {
    /// Exact name first, then the rename-tolerant pattern
    pub fn matches(&self, name: &str) -> bool {
        if name == self.package {
            return true;
        }

        match manifest_patterns().iter().find(|(pattern, _)| *pattern == self.pattern) {
            Some((_, re)) => re.is_match(name),
            None => Regex::new(self.pattern)
                .map(|re| re.is_match(name))
                .unwrap_or(false),
        }
    }
}

/// Patterns of `MANIFEST_COMPONENTS`, compiled once
fn manifest_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        MANIFEST_COMPONENTS
            .iter()
            .map(|c| {
                let re = Regex::new(c.pattern).expect("manifest component pattern is valid");
                (c.pattern, re)
            })
            .collect()
    })
}

pub const VERSION_FILES: &[VersionFile] = &[
    VersionFile {
        file: "GITALY_SERVER_VERSION",
        release_name: "gitaly",
    },
    VersionFile {
        file: "GITLAB_ELASTICSEARCH_INDEXER_VERSION",
        release_name: "gitlab-elasticsearch-indexer",
    },
    VersionFile {
        file: "GITLAB_PAGES_VERSION",
        release_name: "gitlab-pages",
    },
    VersionFile {
        file: "GITLAB_SHELL_VERSION",
        release_name: "gitlab-shell",
    },
    VersionFile {
        file: "GITLAB_WORKHORSE_VERSION",
        release_name: "gitlab-workhorse",
    },
];

pub const MANIFEST_COMPONENTS: &[ManifestComponent] = &[ManifestComponent {
    package: "mail_room",
    pattern: r"^(gitlab-)?mail_?room$",
    variable: "MAILROOM_VERSION",
    release_name: "mailroom",
}];

/// Find the manifest component a package name belongs to
pub fn manifest_component_for(name: &str) -> Option<&'static ManifestComponent> {
    MANIFEST_COMPONENTS.iter().find(|c| c.matches(name))
}

/// Ordered mapping of component identifier to version string.
///
/// Iteration order is insertion order; tag messages and commit actions are
/// rendered in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentVersionMap {
    entries: Vec<(String, String)>,
}

impl ComponentVersionMap {
    pub fn new() -> Self {
        ComponentVersionMap::default()
    }

    /// Insert or overwrite an entry; overwriting keeps the original position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Rename a key in place
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        let to = to.into();
        if from != to {
            self.remove(&to);
        }

        match self.entries.iter_mut().find(|(k, _)| k == from) {
            Some(entry) => {
                entry.0 = to;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComponentVersionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ComponentVersionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for ComponentVersionMap {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// One `component: version` line per entry
impl fmt::Display for ComponentVersionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self
            .iter()
            .map(|(component, version)| format!("{}: {}", component, version))
            .collect();
        write!(f, "{}", lines.join("\n"))
    }
}
