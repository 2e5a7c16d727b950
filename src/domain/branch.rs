use crate::domain::version::Version;
use crate::error::{AutoDeployError, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

fn milestone_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("milestone regex is valid"))
}

fn auto_deploy_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:security/)?\d+-\d+-auto-deploy-\d+$").expect("auto-deploy branch regex is valid")
    })
}

/// An auto-deploy branch, e.g. `12-9-auto-deploy-20200226`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoDeployBranch {
    pub name: String,
    pub major: u32,
    pub minor: u32,
}

impl AutoDeployBranch {
    /// Parse the version out of a branch name.
    ///
    /// Only the leading `<major>-<minor>` pair is significant; a `security/`
    /// prefix is accepted for branches living on the security mirror.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let bare = name.strip_prefix("security/").unwrap_or(&name);

        let mut parts = bare.splitn(3, '-');
        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());

        match (major, minor) {
            (Some(major), Some(minor)) => Ok(AutoDeployBranch { name, major, minor }),
            _ => Err(AutoDeployError::branch(format!(
                "Unable to determine version from {}",
                name
            ))),
        }
    }

    /// Branch name for a version on a given day
    pub fn for_version(version: &Version, date: NaiveDate) -> Self {
        AutoDeployBranch {
            name: format!(
                "{}-{}-auto-deploy-{}",
                version.major,
                version.minor,
                date.format("%Y%m%d")
            ),
            major: version.major,
            minor: version.minor,
        }
    }

    /// Branch name from the current milestone title ("12.9")
    pub fn from_milestone(title: &str, date: NaiveDate) -> Result<Self> {
        if !milestone_regex().is_match(title) {
            return Err(AutoDeployError::branch(format!(
                "Invalid version from milestone: {}",
                title
            )));
        }

        let version = Version::parse(title)?;
        Ok(Self::for_version(&version, date))
    }

    /// Whether the name follows the full auto-deploy format
    pub fn is_auto_deploy(name: &str) -> bool {
        auto_deploy_regex().is_match(name)
    }

    pub fn version(&self) -> Version {
        Version::new(self.major, self.minor, 0)
    }
}

impl fmt::Display for AutoDeployBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
