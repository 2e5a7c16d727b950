use crate::config::RunContext;
use crate::domain::components::{LOCKFILE, MANIFEST_COMPONENTS, UPSTREAM_KEY, VERSION_FILES};
use crate::domain::ComponentVersionMap;
use crate::error::{AutoDeployError, Result};
use crate::git::ContentProvider;
use crate::lockfile::Lockfile;
use crate::project::Project;
use tracing::{debug, info};

/// Builds the component version map of the core project at a commit.
///
/// Read-only: the resolver never mutates the provider and can be shared
/// between threads when the provider can.
pub struct ComponentVersionResolver<'a, P> {
    provider: &'a P,
    project: &'static str,
}

impl<'a, P: ContentProvider> ComponentVersionResolver<'a, P> {
    /// Resolver for the core project on the path selected by `ctx`
    pub fn new(provider: &'a P, ctx: &RunContext) -> Self {
        ComponentVersionResolver {
            provider,
            project: Project::GitlabEe.path(ctx),
        }
    }

    pub fn project(&self) -> &'static str {
        self.project
    }

    /// Resolve every component version at `commit`.
    ///
    /// The map starts with `VERSION` (the commit itself), followed by the
    /// version files in their fixed order, followed by lockfile packages keyed
    /// by the package name found in the lockfile.
    ///
    /// # Errors
    /// * `ComponentNotFound` - a version file is missing at `commit`
    /// * `LockfileNotFound` - the lockfile is missing at `commit`
    /// * `VersionNotFound` - a package is not locked
    pub fn resolve(&self, commit: &str) -> Result<ComponentVersionMap> {
        let mut versions = ComponentVersionMap::new();
        versions.insert(UPSTREAM_KEY, commit);

        for version_file in VERSION_FILES {
            let content = self
                .provider
                .read_file(self.project, version_file.file, commit)?
                .ok_or_else(|| AutoDeployError::component_not_found(version_file.file, commit))?;

            let version = content.trim_end();
            debug!(component = version_file.file, version, "Resolved version file");
            versions.insert(version_file.file, version);
        }

        let lockfile = self
            .provider
            .read_file(self.project, LOCKFILE, commit)?
            .map(|content| Lockfile::parse(&content))
            .ok_or_else(|| AutoDeployError::LockfileNotFound(LOCKFILE.to_string()))?;

        for component in MANIFEST_COMPONENTS {
            let spec = lockfile.find_component(component)?;
            versions.insert(spec.name.as_str(), spec.version.trim_end());
        }

        info!(
            project = self.project,
            commit,
            versions = %versions.to_string().replace('\n', ", "),
            "Resolved component versions"
        );

        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockProvider;

    const EE: &str = "gitlab-org/gitlab";
    const COMMIT: &str = "36b70d9ce7c73ca001be48727d35d49813d2cc4f";

    fn core_files() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GITALY_SERVER_VERSION", "1.83.0\n"),
            ("GITLAB_ELASTICSEARCH_INDEXER_VERSION", "2.0.0\n"),
            ("GITLAB_PAGES_VERSION", "1.14.0\n"),
            ("GITLAB_SHELL_VERSION", "11.0.0\n"),
            ("GITLAB_WORKHORSE_VERSION", "8.19.0\n"),
            ("Gemfile.lock", "GEM\n  specs:\n    mail_room (0.10.0)\n"),
        ]
    }

    #[test]
    fn test_resolve_trims_and_orders() {
        let provider = MockProvider::new();
        provider.add_commit(EE, COMMIT, &core_files());

        let resolver = ComponentVersionResolver::new(&provider, &RunContext::default());
        let versions = resolver.resolve(COMMIT).unwrap();

        assert_eq!(versions.get("VERSION"), Some(COMMIT));
        assert_eq!(versions.get("GITALY_SERVER_VERSION"), Some("1.83.0"));
        assert_eq!(versions.get("mail_room"), Some("0.10.0"));
        assert_eq!(
            versions.keys().collect::<Vec<_>>(),
            vec![
                "VERSION",
                "GITALY_SERVER_VERSION",
                "GITLAB_ELASTICSEARCH_INDEXER_VERSION",
                "GITLAB_PAGES_VERSION",
                "GITLAB_SHELL_VERSION",
                "GITLAB_WORKHORSE_VERSION",
                "mail_room",
            ]
        );
    }

    #[test]
    fn test_missing_version_file_fails_loudly() {
        let provider = MockProvider::new();
        let files: Vec<_> = core_files()
            .into_iter()
            .filter(|(path, _)| *path != "GITLAB_PAGES_VERSION")
            .collect();
        provider.add_commit(EE, COMMIT, &files);

        let resolver = ComponentVersionResolver::new(&provider, &RunContext::default());
        let err = resolver.resolve(COMMIT).unwrap_err();

        assert!(matches!(
            err,
            AutoDeployError::ComponentNotFound { ref component, .. } if component == "GITLAB_PAGES_VERSION"
        ));
    }

    #[test]
    fn test_missing_lockfile() {
        let provider = MockProvider::new();
        let files: Vec<_> = core_files()
            .into_iter()
            .filter(|(path, _)| *path != "Gemfile.lock")
            .collect();
        provider.add_commit(EE, COMMIT, &files);

        let resolver = ComponentVersionResolver::new(&provider, &RunContext::default());
        assert!(matches!(
            resolver.resolve(COMMIT).unwrap_err(),
            AutoDeployError::LockfileNotFound(_)
        ));
    }

    #[test]
    fn test_unlocked_package_is_version_not_found() {
        let provider = MockProvider::new();
        let mut files = core_files();
        files.pop();
        files.push(("Gemfile.lock", "GEM\n  specs:\n    rake (12.3.3)\n"));
        provider.add_commit(EE, COMMIT, &files);

        let resolver = ComponentVersionResolver::new(&provider, &RunContext::default());
        assert!(matches!(
            resolver.resolve(COMMIT).unwrap_err(),
            AutoDeployError::VersionNotFound(_)
        ));
    }

    #[test]
    fn test_security_release_reads_security_mirror() {
        let provider = MockProvider::new();
        provider.add_commit("gitlab-org/security/gitlab", COMMIT, &core_files());

        let ctx = RunContext::new(false, true);
        let resolver = ComponentVersionResolver::new(&provider, &ctx);

        assert_eq!(resolver.project(), "gitlab-org/security/gitlab");
        assert!(resolver.resolve(COMMIT).is_ok());
    }
}
