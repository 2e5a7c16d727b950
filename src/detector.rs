use crate::domain::ComponentVersionMap;
use crate::git::ContentProvider;
use crate::project::{TargetFormat, VARIABLES_FILE};
use crate::variables::VariablesDocument;
use tracing::{debug, warn};

/// Remove one trailing line ending
pub fn chomp(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .or_else(|| value.strip_suffix('\r'))
        .unwrap_or(value)
}

/// Answers whether committing a version map would change a packager.
///
/// State is read from the branch head on every call and never cached. Any
/// failure to read counts as a change: an unreachable packager must not stop
/// the others from being checked.
pub struct ChangeDetector<'a, P> {
    provider: &'a P,
}

impl<'a, P: ContentProvider> ChangeDetector<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        ChangeDetector { provider }
    }

    /// Dispatch on the packager's storage format
    pub fn has_changes(
        &self,
        project: &str,
        format: TargetFormat,
        branch: &str,
        desired: &ComponentVersionMap,
    ) -> bool {
        match format {
            TargetFormat::OmnibusStyle => self.omnibus_changes(project, branch, desired),
            TargetFormat::ContainerStyle => self.cng_changes(project, branch, desired),
        }
    }

    /// One file per component at the repository root
    pub fn omnibus_changes(&self, project: &str, branch: &str, desired: &ComponentVersionMap) -> bool {
        for (component, version) in desired.iter() {
            match self.provider.read_file(project, component, branch) {
                Ok(Some(current)) if chomp(&current) == chomp(version) => continue,
                Ok(Some(current)) => {
                    debug!(project, branch, component, current = chomp(&current), desired = version, "Component changed");
                    return true;
                }
                Ok(None) => {
                    debug!(project, branch, component, "Component file missing");
                    return true;
                }
                Err(e) => {
                    warn!(project, branch, error = %e, "Unable to read packager state, assuming changes");
                    return true;
                }
            }
        }

        false
    }

    /// Entries of the `variables:` mapping in the merged document
    pub fn cng_changes(&self, project: &str, branch: &str, desired: &ComponentVersionMap) -> bool {
        let content = match self.provider.read_file(project, VARIABLES_FILE, branch) {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(project, branch, file = VARIABLES_FILE, "Variables document missing");
                return true;
            }
            Err(e) => {
                warn!(project, branch, error = %e, "Unable to read packager state, assuming changes");
                return true;
            }
        };

        let document = match VariablesDocument::parse(&content) {
            Ok(document) => document,
            Err(e) => {
                warn!(project, branch, error = %e, "Unable to parse variables document, assuming changes");
                return true;
            }
        };

        desired.iter().any(|(component, version)| match document.get(component) {
            Some(current) if chomp(&current) == chomp(version) => false,
            current => {
                debug!(project, branch, component, current = ?current, desired = version, "Variable changed");
                true
            }
        })
    }
}
