use crate::error::{AutoDeployError, Result};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::OnceLock;

/// Product edition carried by a version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Edition {
    #[default]
    Community,
    Enterprise,
}

impl Edition {
    /// Short edition name used by packagers ("ce" / "ee")
    pub fn short_name(&self) -> &'static str {
        match self {
            Edition::Community => "ce",
            Edition::Enterprise => "ee",
        }
    }
}

/// Release version of the core product.
///
/// Accepts two grammars:
/// - release style: `major.minor[.patch][-rcN][-ee]`
/// - packager style: `major.minor.patch+[rcN.]ce|ee[.build]` (also with `-`
///   in place of `+`, which is how container tags render it)
///
/// A leading `v` is tolerated so git tag names parse back into versions.
///
/// Equality, hashing and ordering ignore the edition: `8.3.5` and `8.3.5-ee`
/// are equal. Call sites that route on edition must compare [`Version::edition`]
/// explicitly.
#[derive(Debug, Clone, Copy)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub rc: Option<u32>,
    pub edition: Edition,
}

fn release_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<major>\d+)\.(?P<minor>\d+)(?:\.(?P<patch>\d+))?(?:-rc(?P<rc>\d*))?(?P<ee>-ee)?$",
        )
        .expect("release version regex is valid")
    })
}

fn packager_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<major>\d+)\.(?P<minor>\d+)\.(?P<patch>\d+)[+-](?:rc(?P<rc>\d+)\.)?(?P<edition>ce|ee)(?:\.\d+)?$",
        )
        .expect("packager version regex is valid")
    })
}

fn number(captures: &regex::Captures<'_>, name: &str, raw: &str) -> Result<u32> {
    match captures.name(name) {
        Some(m) if !m.as_str().is_empty() => m.as_str().parse::<u32>().map_err(|_| {
            AutoDeployError::parse(format!("Invalid {} component in '{}'", name, raw))
        }),
        _ => Ok(0),
    }
}

fn increment(value: u32, name: &str, version: &Version) -> Result<u32> {
    value.checked_add(1).ok_or_else(|| {
        AutoDeployError::parse(format!("No next {} for {}: {} is the largest value", name, version, value))
    })
}

/// Lookup of previously released versions, used when a neighbouring version
/// cannot be computed arithmetically.
pub trait VersionHistory {
    /// Latest finalized version strictly lower than `version`
    fn last_version_before(&self, version: &Version) -> Option<Version>;

    /// Latest finalized version within a major release line
    fn last_version_for_major(&self, major: u32) -> Option<Version>;
}

impl VersionHistory for [Version] {
    fn last_version_before(&self, version: &Version) -> Option<Version> {
        self.iter()
            .filter(|v| !v.is_rc() && *v < version)
            .max()
            .copied()
    }

    fn last_version_for_major(&self, major: u32) -> Option<Version> {
        self.iter()
            .filter(|v| !v.is_rc() && v.major == major)
            .max()
            .copied()
    }
}

impl Version {
    /// Create a finalized community version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
            rc: None,
            edition: Edition::Community,
        }
    }

    /// Parse a version string in either release or packager style
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let clean = trimmed.strip_prefix('v').unwrap_or(trimmed);

        if let Some(captures) = release_regex().captures(clean) {
            let rc = match captures.name("rc") {
                Some(_) => Some(number(&captures, "rc", raw)?),
                None => None,
            };
            // Without a patch number only the RC form keeps the edition
            let normalized_to_patch = captures.name("patch").is_none() && rc.is_none();
            let edition = if captures.name("ee").is_some() && !normalized_to_patch {
                Edition::Enterprise
            } else {
                Edition::Community
            };

            return Ok(Version {
                major: number(&captures, "major", raw)?,
                minor: number(&captures, "minor", raw)?,
                patch: number(&captures, "patch", raw)?,
                rc,
                edition,
            });
        }

        if let Some(captures) = packager_regex().captures(clean) {
            let rc = match captures.name("rc") {
                Some(_) => Some(number(&captures, "rc", raw)?),
                None => None,
            };
            let edition = match captures.name("edition").map(|m| m.as_str()) {
                Some("ee") => Edition::Enterprise,
                _ => Edition::Community,
            };

            return Ok(Version {
                major: number(&captures, "major", raw)?,
                minor: number(&captures, "minor", raw)?,
                patch: number(&captures, "patch", raw)?,
                rc,
                edition,
            });
        }

        Err(AutoDeployError::parse(format!(
            "Invalid version format: '{}'",
            raw
        )))
    }

    pub fn is_ee(&self) -> bool {
        self.edition == Edition::Enterprise
    }

    pub fn is_rc(&self) -> bool {
        self.rc.is_some()
    }

    /// Monthly releases are `x.y.0` without a release candidate
    pub fn is_monthly(&self) -> bool {
        self.patch == 0 && !self.is_rc()
    }

    pub fn is_patch(&self) -> bool {
        self.patch > 0
    }

    /// A finalized community release
    pub fn is_release(&self) -> bool {
        !self.is_rc() && !self.is_ee()
    }

    pub fn with_edition(&self, edition: Edition) -> Self {
        Version { edition, ..*self }
    }

    pub fn to_ce(&self) -> Self {
        self.with_edition(Edition::Community)
    }

    pub fn to_ee(&self) -> Self {
        self.with_edition(Edition::Enterprise)
    }

    /// "8.3"
    pub fn to_minor(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }

    pub fn milestone_name(&self) -> String {
        self.to_minor()
    }

    /// "8.3.5"
    pub fn to_patch(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }

    /// "8.3.5-rc2", keeping the enterprise suffix
    pub fn to_rc(&self, number: u32) -> String {
        let mut version = format!("{}-rc{}", self.to_patch(), number);
        if self.is_ee() {
            version.push_str("-ee");
        }
        version
    }

    /// "8-3-stable" or "8-3-stable-ee"
    pub fn stable_branch(&self, force_ee: bool) -> String {
        let prefix = self.to_minor().replace('.', "-");
        if force_ee || self.is_ee() {
            format!("{}-stable-ee", prefix)
        } else {
            format!("{}-stable", prefix)
        }
    }

    /// Git tag name, e.g. "v8.3.5" or "v8.3.5-rc2-ee"
    pub fn tag(&self, force_ee: bool) -> String {
        let version = if force_ee { self.to_ee() } else { *self };
        format!("v{}", version)
    }

    /// Tag of the preceding patch release, if there is one
    pub fn previous_tag(&self, force_ee: bool) -> Option<String> {
        if !self.is_patch() || self.is_rc() {
            return None;
        }

        self.previous_patch().ok().map(|v| v.tag(force_ee))
    }

    /// Packager composite version, e.g. "8.3.5+rc2.ee.0".
    ///
    /// The edition comes from `ee` alone, not from the value.
    pub fn to_packager(&self, ee: bool) -> String {
        let mut version = format!("{}+", self.to_patch());
        if let Some(rc) = self.rc {
            version.push_str(&format!("rc{}.", rc));
        }
        let edition = if ee {
            Edition::Enterprise
        } else {
            Edition::Community
        };
        version.push_str(edition.short_name());
        version.push_str(".0");
        version
    }

    /// Container tag variant of [`Version::to_packager`]; `+` is not valid in image tags
    pub fn to_container(&self, ee: bool) -> String {
        self.to_packager(ee).replace('+', "-")
    }

    pub fn next_major(&self) -> Result<Self> {
        let major = increment(self.major, "major", self)?;
        Ok(Version::new(major, 0, 0))
    }

    pub fn next_minor(&self) -> Result<Self> {
        let minor = increment(self.minor, "minor", self)?;
        Ok(Version::new(self.major, minor, 0))
    }

    pub fn next_patch(&self) -> Result<Self> {
        let patch = increment(self.patch, "patch", self)?;
        Ok(Version::new(self.major, self.minor, patch).with_edition(self.edition))
    }

    /// Fails for `x.y.0`; use [`Version::previous_patch_with`] to fall back
    /// to the release history
    pub fn previous_patch(&self) -> Result<Self> {
        if !self.is_patch() {
            return Err(AutoDeployError::parse(format!(
                "No previous patch for {}",
                self
            )));
        }

        Ok(Version::new(self.major, self.minor, self.patch - 1).with_edition(self.edition))
    }

    pub fn previous_patch_with<H: VersionHistory + ?Sized>(&self, history: &H) -> Result<Self> {
        if self.is_patch() {
            return self.previous_patch();
        }

        history
            .last_version_before(self)
            .map(|v| v.with_edition(self.edition))
            .ok_or_else(|| {
                AutoDeployError::parse(format!("The last version before {} could not be found", self))
            })
    }

    /// Previous monthly release; across a major boundary the history decides
    pub fn previous_minor<H: VersionHistory + ?Sized>(&self, history: &H) -> Result<Self> {
        if self.minor > 0 {
            return Ok(Version::new(self.major, self.minor - 1, 0));
        }

        self.major
            .checked_sub(1)
            .and_then(|major| history.last_version_for_major(major))
            .ok_or_else(|| {
                AutoDeployError::parse(format!("The last version before {} could not be found", self))
            })
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.rc.hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.rc, other.rc) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(&b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rc {
            Some(rc) => write!(f, "{}", self.to_rc(rc)),
            None if self.is_ee() => write!(f, "{}-ee", self.to_patch()),
            None => write!(f, "{}", self.to_patch()),
        }
    }
}

impl FromStr for Version {
    type Err = AutoDeployError;

    fn from_str(s: &str) -> Result<Self> {
        Version::parse(s)
    }
}
