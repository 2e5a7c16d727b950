use crate::error::{AutoDeployError, Result};
use crate::project::{Project, TargetFormat};

/// How one packager is released from an auto-deploy branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseProfile {
    pub packager: Project,
    pub format: TargetFormat,
    /// Name used in tag messages, e.g. "Omnibus"
    pub label: &'static str,
    /// Append the packager's own head commit to the tag name
    pub packager_ref_in_tag: bool,
    /// Project receiving a mirror of the packager tag
    pub tracker: Option<Project>,
    /// Release metadata category; `None` disables the upload
    pub metadata_category: Option<&'static str>,
}

impl ReleaseProfile {
    pub fn omnibus() -> Self {
        ReleaseProfile {
            packager: Project::OmnibusGitlab,
            format: TargetFormat::OmnibusStyle,
            label: "Omnibus",
            packager_ref_in_tag: true,
            tracker: Some(Project::Deployer),
            metadata_category: Some("omnibus"),
        }
    }

    pub fn cng() -> Self {
        ReleaseProfile {
            packager: Project::CngImage,
            format: TargetFormat::ContainerStyle,
            label: "CNG",
            packager_ref_in_tag: false,
            tracker: Some(Project::HelmGitlab),
            metadata_category: Some("cng"),
        }
    }

    pub fn all() -> Vec<Self> {
        vec![ReleaseProfile::omnibus(), ReleaseProfile::cng()]
    }

    /// Profiles selected by name: `omnibus`, `cng` or `all`
    pub fn by_name(name: &str) -> Result<Vec<Self>> {
        match name.to_ascii_lowercase().as_str() {
            "omnibus" => Ok(vec![ReleaseProfile::omnibus()]),
            "cng" => Ok(vec![ReleaseProfile::cng()]),
            "all" => Ok(ReleaseProfile::all()),
            other => Err(AutoDeployError::config(format!(
                "Unknown release profile '{}', expected omnibus, cng or all",
                other
            ))),
        }
    }

    /// Short name used in reports and logs
    pub fn name(&self) -> &'static str {
        match self.packager {
            Project::CngImage => "cng",
            _ => "omnibus",
        }
    }
}
