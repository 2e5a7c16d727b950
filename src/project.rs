//! Descriptors of the repositories taking part in a release.

use crate::config::RunContext;
use std::fmt;

/// Merged variables document used by container-style packagers
pub const VARIABLES_FILE: &str = "ci_files/variables.yml";

/// Top-level key of [`VARIABLES_FILE`] holding component versions
pub const VARIABLES_KEY: &str = "variables";

/// How a packager stores pinned component versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// One `<COMPONENT>` file per component at the repository root
    OmnibusStyle,
    /// One YAML document with a top-level `variables:` mapping
    ContainerStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Project {
    /// The core application; source of component versions
    GitlabEe,
    OmnibusGitlab,
    CngImage,
    /// Helm chart; receives the CNG tag on its auto-deploy branch
    HelmGitlab,
    /// Deployment tracker receiving mirror tags
    Deployer,
    /// Store for release metadata documents
    ReleaseMetadata,
}

impl Project {
    pub const ALL: [Project; 6] = [
        Project::GitlabEe,
        Project::OmnibusGitlab,
        Project::CngImage,
        Project::HelmGitlab,
        Project::Deployer,
        Project::ReleaseMetadata,
    ];

    /// Projects that receive auto-deploy branches
    pub const AUTO_DEPLOY: [Project; 4] = [
        Project::GitlabEe,
        Project::OmnibusGitlab,
        Project::CngImage,
        Project::HelmGitlab,
    ];

    pub fn canonical_path(&self) -> &'static str {
        match self {
            Project::GitlabEe => "gitlab-org/gitlab",
            Project::OmnibusGitlab => "gitlab-org/omnibus-gitlab",
            Project::CngImage => "gitlab-org/build/CNG",
            Project::HelmGitlab => "gitlab-org/charts/gitlab",
            Project::Deployer => "gitlab-com/gl-infra/deployer",
            Project::ReleaseMetadata => "gitlab-org/release/metadata",
        }
    }

    /// Path on the security mirror. The tracker and metadata projects only
    /// exist in one place.
    pub fn security_path(&self) -> &'static str {
        match self {
            Project::GitlabEe => "gitlab-org/security/gitlab",
            Project::OmnibusGitlab => "gitlab-org/security/omnibus-gitlab",
            Project::CngImage => "gitlab-org/security/charts/components/images",
            Project::HelmGitlab => "gitlab-org/security/charts/gitlab",
            Project::Deployer | Project::ReleaseMetadata => self.canonical_path(),
        }
    }

    pub fn path(&self, ctx: &RunContext) -> &'static str {
        if ctx.security_release {
            self.security_path()
        } else {
            self.canonical_path()
        }
    }

    /// Name used in release metadata
    pub fn release_name(&self) -> &'static str {
        match self {
            Project::GitlabEe => "gitlab-ee",
            Project::OmnibusGitlab => "omnibus-gitlab-ee",
            Project::CngImage => "cng-ee",
            Project::HelmGitlab => "helm-gitlab",
            Project::Deployer => "deployer",
            Project::ReleaseMetadata => "release-metadata",
        }
    }

    pub fn default_branch(&self) -> &'static str {
        "master"
    }

    /// Whether the project gets its own auto-deploy branch
    pub fn has_auto_deploy_branch(&self) -> bool {
        Project::AUTO_DEPLOY.contains(self)
    }

    /// Storage format for packagers, `None` for everything else
    pub fn target_format(&self) -> Option<TargetFormat> {
        match self {
            Project::OmnibusGitlab => Some(TargetFormat::OmnibusStyle),
            Project::CngImage => Some(TargetFormat::ContainerStyle),
            _ => None,
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_follows_security_flag() {
        let normal = RunContext::new(false, false);
        let security = RunContext::new(false, true);

        assert_eq!(Project::OmnibusGitlab.path(&normal), "gitlab-org/omnibus-gitlab");
        assert_eq!(
            Project::OmnibusGitlab.path(&security),
            "gitlab-org/security/omnibus-gitlab"
        );
        assert_eq!(
            Project::Deployer.path(&security),
            Project::Deployer.canonical_path()
        );
    }

    #[test]
    fn test_target_formats() {
        assert_eq!(
            Project::OmnibusGitlab.target_format(),
            Some(TargetFormat::OmnibusStyle)
        );
        assert_eq!(
            Project::CngImage.target_format(),
            Some(TargetFormat::ContainerStyle)
        );
        assert_eq!(Project::GitlabEe.target_format(), None);
        assert_eq!(Project::HelmGitlab.target_format(), None);
    }

    #[test]
    fn test_auto_deploy_branch_projects() {
        assert!(Project::HelmGitlab.has_auto_deploy_branch());
        assert!(Project::CngImage.has_auto_deploy_branch());
        assert!(!Project::Deployer.has_auto_deploy_branch());
        assert_eq!(
            Project::HelmGitlab.path(&RunContext::new(false, true)),
            "gitlab-org/security/charts/gitlab"
        );
    }
}
