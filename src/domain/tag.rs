use crate::domain::branch::AutoDeployBranch;
use crate::domain::components::ComponentVersionMap;
use chrono::{DateTime, FixedOffset};

/// Number of characters kept from commit ids embedded in tag names
pub const REF_LENGTH: usize = 11;

/// Represents a git tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub message: String,
    /// Commit id or ref the tag points at
    pub target: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, message: impl Into<String>, target: impl Into<String>) -> Self {
        Tag {
            name: name.into(),
            message: message.into(),
            target: target.into(),
        }
    }

    /// Leading numeric segment of the name, e.g. "12" for "12.9.201907021014+abc"
    pub fn major_prefix(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

/// Truncate a ref to [`REF_LENGTH`] characters
pub fn short_ref(reference: &str) -> &str {
    match reference.char_indices().nth(REF_LENGTH) {
        Some((index, _)) => &reference[..index],
        None => reference,
    }
}

/// `YYYYMMDDHHmm` in the offset the commit was recorded with
pub fn tag_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.format("%Y%m%d%H%M").to_string()
}

/// Auto-deploy tag name:
/// `<major>.<minor>.<YYYYMMDDHHmm>+<upstream:11>[.<packager:11>]`
pub fn auto_deploy_tag_name(
    branch: &AutoDeployBranch,
    committed_at: &DateTime<FixedOffset>,
    upstream_ref: &str,
    packager_ref: Option<&str>,
) -> String {
    let mut name = format!(
        "{}.{}.{}+{}",
        branch.major,
        branch.minor,
        tag_timestamp(committed_at),
        short_ref(upstream_ref)
    );

    if let Some(packager_ref) = packager_ref {
        name.push('.');
        name.push_str(short_ref(packager_ref));
    }

    name
}

/// Tag message: a title line, a blank line, then one `component: version` per entry
pub fn auto_deploy_tag_message(label: &str, tag_name: &str, versions: &ComponentVersionMap) -> String {
    format!("Auto-deploy {} {}\n\n{}", label, tag_name, versions)
}
