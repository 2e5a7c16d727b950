//! Rewrites a resolved component map into the shape a packager expects.

use crate::domain::components::{manifest_component_for, UPSTREAM_KEY};
use crate::domain::ComponentVersionMap;
use crate::project::TargetFormat;
use regex::Regex;
use std::sync::OnceLock;

/// Container-style key receiving the upstream commit id
pub const CONTAINER_VERSION_KEY: &str = "GITLAB_VERSION";

/// Container-style key for the image ref slug, same value as [`CONTAINER_VERSION_KEY`]
pub const CONTAINER_REF_SLUG_KEY: &str = "GITLAB_REF_SLUG";

/// Container-style key for the assets image, same value as [`CONTAINER_VERSION_KEY`]
pub const CONTAINER_ASSETS_KEY: &str = "GITLAB_ASSETS_TAG";

/// Version files whose variable name differs in container-style packagers
const CONTAINER_RENAMES: &[(&str, &str)] = &[("GITALY_SERVER_VERSION", "GITALY_VERSION")];

fn sha_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{40}$").expect("sha regex is valid"))
}

fn semver_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+(-rc\d+)?$").expect("semver regex is valid"))
}

/// Render a component version as a git ref.
///
/// Commit ids pass through; `major.minor.patch[-rcN]` becomes the tag `v…`;
/// anything else (branch names, existing tags) is left alone.
pub fn to_git_ref(version: &str) -> String {
    if sha_regex().is_match(version) {
        version.to_string()
    } else if semver_regex().is_match(version) {
        format!("v{}", version)
    } else {
        version.to_string()
    }
}

/// Rewrite `versions` for a packager storage format
pub fn sanitize(versions: &ComponentVersionMap, format: TargetFormat) -> ComponentVersionMap {
    match format {
        TargetFormat::OmnibusStyle => sanitize_omnibus(versions),
        TargetFormat::ContainerStyle => sanitize_container(versions),
    }
}

fn sanitize_omnibus(versions: &ComponentVersionMap) -> ComponentVersionMap {
    // Packages are built from the core's own lockfile
    versions
        .iter()
        .filter(|(component, _)| manifest_component_for(component).is_none())
        .collect()
}

fn sanitize_container(versions: &ComponentVersionMap) -> ComponentVersionMap {
    let mut sanitized = ComponentVersionMap::new();

    for (component, version) in versions.iter() {
        if component == UPSTREAM_KEY {
            sanitized.insert(CONTAINER_VERSION_KEY, version);
            sanitized.insert(CONTAINER_REF_SLUG_KEY, version);
            sanitized.insert(CONTAINER_ASSETS_KEY, version);
        } else if let Some(manifest) = manifest_component_for(component) {
            sanitized.insert(manifest.variable, version);
        } else {
            let key = CONTAINER_RENAMES
                .iter()
                .find(|(from, _)| *from == component)
                .map(|(_, to)| *to)
                .unwrap_or(component);
            sanitized.insert(key, to_git_ref(version));
        }
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "36b70d9ce7c73ca001be48727d35d49813d2cc4f";

    fn resolved() -> ComponentVersionMap {
        [
            ("VERSION", SHA),
            ("GITALY_SERVER_VERSION", "1.83.0"),
            ("GITLAB_PAGES_VERSION", "1.14.0-rc1"),
            ("GITLAB_SHELL_VERSION", "11.0.0"),
            ("GITLAB_WORKHORSE_VERSION", "8b5c8f1c5a3e2b9a7d6e4f1c0b2a3d4e5f6a7b8c"),
            ("mail_room", "0.10.0"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_git_ref_rules() {
        assert_eq!(to_git_ref(SHA), SHA);
        assert_eq!(to_git_ref("1.2.3"), "v1.2.3");
        assert_eq!(to_git_ref("1.2.3-rc4"), "v1.2.3-rc4");
        assert_eq!(to_git_ref("v1.2.3"), "v1.2.3");
        assert_eq!(to_git_ref("master"), "master");
        assert_eq!(to_git_ref("1.2"), "1.2");
    }

    #[test]
    fn test_omnibus_keeps_files_and_drops_packages() {
        let sanitized = sanitize(&resolved(), TargetFormat::OmnibusStyle);

        assert_eq!(sanitized.get("VERSION"), Some(SHA));
        assert_eq!(sanitized.get("GITALY_SERVER_VERSION"), Some("1.83.0"));
        assert!(!sanitized.contains_key("mail_room"));
        assert_eq!(sanitized.len(), 5);
    }

    #[test]
    fn test_omnibus_sha_is_untouched() {
        let map: ComponentVersionMap = [("VERSION", SHA)].into_iter().collect();
        assert_eq!(sanitize(&map, TargetFormat::OmnibusStyle).get("VERSION"), Some(SHA));
    }

    #[test]
    fn test_container_renames_and_prefixes() {
        let sanitized = sanitize(&resolved(), TargetFormat::ContainerStyle);

        assert_eq!(
            sanitized.keys().collect::<Vec<_>>(),
            vec![
                "GITLAB_VERSION",
                "GITLAB_REF_SLUG",
                "GITLAB_ASSETS_TAG",
                "GITALY_VERSION",
                "GITLAB_PAGES_VERSION",
                "GITLAB_SHELL_VERSION",
                "GITLAB_WORKHORSE_VERSION",
                "MAILROOM_VERSION",
            ]
        );
        assert_eq!(sanitized.get("GITLAB_VERSION"), Some(SHA));
        assert_eq!(sanitized.get("GITLAB_REF_SLUG"), Some(SHA));
        assert_eq!(sanitized.get("GITLAB_ASSETS_TAG"), Some(SHA));
        assert_eq!(sanitized.get("GITALY_VERSION"), Some("v1.83.0"));
        assert_eq!(sanitized.get("GITLAB_PAGES_VERSION"), Some("v1.14.0-rc1"));
        assert_eq!(
            sanitized.get("GITLAB_WORKHORSE_VERSION"),
            Some("8b5c8f1c5a3e2b9a7d6e4f1c0b2a3d4e5f6a7b8c")
        );
        // Package versions are not git refs
        assert_eq!(sanitized.get("MAILROOM_VERSION"), Some("0.10.0"));
    }

    #[test]
    fn test_container_semver_component() {
        let map: ComponentVersionMap = [("X", "1.2.3")].into_iter().collect();
        assert_eq!(
            sanitize(&map, TargetFormat::ContainerStyle).get("X"),
            Some("v1.2.3")
        );
    }
}
