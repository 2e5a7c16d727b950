//! Minimal reader for Bundler lockfiles.
//!
//! Only the `specs:` entries of the `GEM`, `PATH` and `GIT` sections are read.
//! Each entry sits at four spaces of indentation as `name (version)`; deeper
//! lines are dependency constraints and are ignored.

use crate::domain::ManifestComponent;
use crate::error::{AutoDeployError, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

const SOURCE_SECTIONS: &[&str] = &["GEM", "PATH", "GIT"];

fn spec_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^    (?P<name>[^\s(]+) \((?P<version>[^)]+)\)\s*$")
            .expect("lockfile spec regex is valid")
    })
}

/// A locked package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedSpec {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    specs: Vec<LockedSpec>,
}

impl Lockfile {
    pub fn parse(content: &str) -> Self {
        let mut specs = Vec::new();
        let mut in_source = false;

        for line in content.lines() {
            if !line.starts_with(' ') {
                in_source = SOURCE_SECTIONS.contains(&line.trim());
                continue;
            }
            if !in_source {
                continue;
            }

            if let Some(captures) = spec_regex().captures(line) {
                // Platform-specific gems lock as `name (1.2.3-x86_64-linux)`
                let version = captures["version"]
                    .split('-')
                    .next()
                    .unwrap_or_default()
                    .to_string();

                specs.push(LockedSpec {
                    name: captures["name"].to_string(),
                    version,
                });
            }
        }

        Lockfile { specs }
    }

    pub fn specs(&self) -> &[LockedSpec] {
        &self.specs
    }

    /// Version locked for an exact package name
    pub fn gem_version(&self, name: &str) -> Result<&str> {
        self.specs
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.version.as_str())
            .ok_or_else(|| AutoDeployError::VersionNotFound(name.to_string()))
    }

    /// Locked spec for a component, by exact package name and then by pattern
    pub fn find_component(&self, component: &ManifestComponent) -> Result<&LockedSpec> {
        let spec = self
            .specs
            .iter()
            .find(|spec| spec.name == component.package)
            .or_else(|| self.specs.iter().find(|spec| component.matches(&spec.name)))
            .ok_or_else(|| AutoDeployError::VersionNotFound(component.package.to_string()))?;

        trace!(
            gem = spec.name.as_str(),
            version = spec.version.as_str(),
            "Version from lockfile"
        );
        Ok(spec)
    }
}
