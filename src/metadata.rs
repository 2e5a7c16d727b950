//! Release metadata: a JSON record of what each auto-deploy tag released.

use crate::config::RunContext;
use crate::domain::components::{MANIFEST_COMPONENTS, UPSTREAM_KEY, VERSION_FILES};
use crate::domain::ComponentVersionMap;
use crate::error::Result;
use crate::git::{CommitInfo, ContentProvider};
use crate::project::Project;
use crate::sanitizer::{CONTAINER_ASSETS_KEY, CONTAINER_REF_SLUG_KEY, CONTAINER_VERSION_KEY};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::info;

/// Keys of the core project itself; the core is recorded explicitly
const CORE_KEYS: &[&str] = &[
    UPSTREAM_KEY,
    CONTAINER_VERSION_KEY,
    CONTAINER_REF_SLUG_KEY,
    CONTAINER_ASSETS_KEY,
];

/// Container-style aliases of version files
const VARIABLE_ALIASES: &[(&str, &str)] = &[("GITALY_VERSION", "gitaly")];

fn sha_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{40}$").expect("sha regex is valid"))
}

/// One released project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub version: String,
    /// Commit released; unknown for components pinned by tag
    pub sha: Option<String>,
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Whether `git_ref` is a tag
    pub tag: bool,
}

/// Everything released by one auto-deploy tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    pub security: bool,
    pub releases: BTreeMap<String, ReleaseEntry>,
}

/// Release name of a component key in either packager format
fn release_name_for(component: &str) -> Option<&'static str> {
    VERSION_FILES
        .iter()
        .find(|f| f.file == component)
        .map(|f| f.release_name)
        .or_else(|| {
            VARIABLE_ALIASES
                .iter()
                .find(|(alias, _)| *alias == component)
                .map(|(_, name)| *name)
        })
        .or_else(|| {
            MANIFEST_COMPONENTS
                .iter()
                .find(|c| c.variable == component || c.matches(component))
                .map(|c| c.release_name)
        })
}

impl ReleaseMetadata {
    pub fn new(security: bool) -> Self {
        ReleaseMetadata {
            security,
            releases: BTreeMap::new(),
        }
    }

    pub fn add_release(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        sha: Option<String>,
        git_ref: impl Into<String>,
        tag: bool,
    ) {
        self.releases.insert(
            name.into(),
            ReleaseEntry {
                version: version.into(),
                sha,
                git_ref: git_ref.into(),
                tag,
            },
        );
    }

    /// Record every component of a (raw or sanitized) version map.
    ///
    /// Commit ids are recorded as untagged releases of `master`; anything else
    /// is taken as a tag, with the version being the tag minus its `v`.
    /// Keys of the core project and unknown keys are skipped.
    pub fn add_auto_deploy_components(&mut self, versions: &ComponentVersionMap) {
        for (component, version) in versions.iter() {
            if CORE_KEYS.contains(&component) {
                continue;
            }
            let Some(name) = release_name_for(component) else {
                continue;
            };

            if sha_regex().is_match(version) {
                self.add_release(name, version, Some(version.to_string()), "master", false);
            } else {
                let plain = version.strip_prefix('v').unwrap_or(version);
                self.add_release(name, plain, None, version, true);
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `releases/<category>/<major>/<tag>.json`
pub fn metadata_path(category: &str, tag_name: &str) -> String {
    let major = tag_name.split('.').next().unwrap_or(tag_name);
    format!("releases/{}/{}/{}.json", category, major, tag_name)
}

/// Stores release metadata documents in the metadata project
pub struct ReleaseMetadataUploader<'a, P> {
    provider: &'a P,
    ctx: RunContext,
}

impl<'a, P: ContentProvider> ReleaseMetadataUploader<'a, P> {
    pub fn new(provider: &'a P, ctx: RunContext) -> Self {
        ReleaseMetadataUploader { provider, ctx }
    }

    /// Commit the document for `tag_name`.
    ///
    /// Uses `create_file`; a retried run relies on the idempotent provider to
    /// turn the conflict into an edit.
    pub fn upload(&self, category: &str, tag_name: &str, metadata: &ReleaseMetadata) -> Result<CommitInfo> {
        let project = Project::ReleaseMetadata;
        let path = metadata_path(category, tag_name);
        let message = format!("Add release data for {}", tag_name);
        let json = metadata.to_json()?;

        info!(project = project.path(&self.ctx), path = path.as_str(), "Uploading release metadata");

        self.provider.create_file(
            project.path(&self.ctx),
            &path,
            project.default_branch(),
            &json,
            &message,
        )
    }
}
