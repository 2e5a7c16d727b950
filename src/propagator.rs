use crate::config::RunContext;
use crate::detector::ChangeDetector;
use crate::domain::ComponentVersionMap;
use crate::error::Result;
use crate::git::{CommitInfo, ContentProvider, FileAction};
use crate::project::{TargetFormat, VARIABLES_FILE};
use crate::variables::VariablesDocument;
use tracing::{error, info};

/// Commit message used for every version update
pub const COMMIT_MESSAGE: &str = "Update component versions";

/// Result of propagating a version map into a packager
#[derive(Debug, Clone, PartialEq)]
pub enum PropagateOutcome {
    /// The branch advanced to this commit
    Committed(CommitInfo),
    /// The branch already holds the desired versions
    Unchanged,
    /// Changes were detected but dry-run suppressed the commit
    DryRun,
    /// The commit could not be created; the branch did not advance
    Failed(String),
}

impl PropagateOutcome {
    pub fn commit(&self) -> Option<&CommitInfo> {
        match self {
            PropagateOutcome::Committed(commit) => Some(commit),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PropagateOutcome::Failed(_))
    }
}

/// Writes sanitized version maps into packager repositories
pub struct VersionPropagator<'a, P> {
    provider: &'a P,
    ctx: RunContext,
}

impl<'a, P: ContentProvider> VersionPropagator<'a, P> {
    pub fn new(provider: &'a P, ctx: RunContext) -> Self {
        VersionPropagator { provider, ctx }
    }

    /// Commit `desired` to `branch` when it differs from what is there.
    ///
    /// Never returns an error: a failed commit is logged as fatal and
    /// reported as [`PropagateOutcome::Failed`] so sibling packagers continue.
    pub fn apply(
        &self,
        project: &str,
        format: TargetFormat,
        branch: &str,
        desired: &ComponentVersionMap,
    ) -> PropagateOutcome {
        let detector = ChangeDetector::new(self.provider);
        if !detector.has_changes(project, format, branch, desired) {
            info!(project, branch, "No changes to component versions");
            return PropagateOutcome::Unchanged;
        }

        if self.ctx.dry_run {
            info!(
                project,
                branch,
                components = desired.len(),
                "Dry run, not committing component versions"
            );
            return PropagateOutcome::DryRun;
        }

        let result = self
            .actions(project, format, branch, desired)
            .and_then(|actions| self.provider.create_commit(project, branch, COMMIT_MESSAGE, &actions));

        match result {
            Ok(commit) => {
                info!(project, branch, commit = commit.id.as_str(), "Updated component versions");
                PropagateOutcome::Committed(commit)
            }
            Err(e) => {
                error!(
                    fatal = true,
                    project,
                    branch,
                    status = e.status(),
                    error = %e,
                    "Failed to commit component versions"
                );
                PropagateOutcome::Failed(e.to_string())
            }
        }
    }

    fn actions(
        &self,
        project: &str,
        format: TargetFormat,
        branch: &str,
        desired: &ComponentVersionMap,
    ) -> Result<Vec<FileAction>> {
        match format {
            TargetFormat::OmnibusStyle => self.omnibus_actions(project, branch, desired),
            TargetFormat::ContainerStyle => self.cng_actions(project, branch, desired),
        }
    }

    fn omnibus_actions(
        &self,
        project: &str,
        branch: &str,
        desired: &ComponentVersionMap,
    ) -> Result<Vec<FileAction>> {
        let mut actions = Vec::with_capacity(desired.len());

        for (component, version) in desired.iter() {
            let content = format!("{}\n", version);
            let action = match self.provider.read_file(project, component, branch)? {
                Some(_) => FileAction::update(component, content),
                None => FileAction::create(component, content),
            };
            actions.push(action);
        }

        Ok(actions)
    }

    fn cng_actions(
        &self,
        project: &str,
        branch: &str,
        desired: &ComponentVersionMap,
    ) -> Result<Vec<FileAction>> {
        let current = self.provider.read_file(project, VARIABLES_FILE, branch)?;

        let mut document = match &current {
            Some(content) => VariablesDocument::parse(content)?,
            None => VariablesDocument::default(),
        };
        document.merge(desired);
        let content = document.to_yaml()?;

        Ok(vec![match current {
            Some(_) => FileAction::update(VARIABLES_FILE, content),
            None => FileAction::create(VARIABLES_FILE, content),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::{MockOperation, Mutation};
    use crate::git::{FileActionKind, MockProvider};

    const OMNIBUS: &str = "gitlab-org/omnibus-gitlab";
    const CNG: &str = "gitlab-org/build/CNG";
    const BRANCH: &str = "12-9-auto-deploy-20200226";

    fn desired() -> ComponentVersionMap {
        [("VERSION", "def"), ("GITALY_SERVER_VERSION", "1.84.0")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_omnibus_commit_writes_one_file_per_component() {
        let provider = MockProvider::new();
        provider.set_branch(
            OMNIBUS,
            BRANCH,
            &[("VERSION", "abc\n"), ("GITALY_SERVER_VERSION", "1.83.0\n")],
        );

        let propagator = VersionPropagator::new(&provider, RunContext::default());
        let outcome = propagator.apply(OMNIBUS, TargetFormat::OmnibusStyle, BRANCH, &desired());

        assert!(outcome.commit().is_some());
        assert_eq!(provider.file_at(OMNIBUS, BRANCH, "VERSION"), Some("def\n".to_string()));
        match &provider.mutations()[..] {
            [Mutation::Commit { message, actions, .. }] => {
                assert_eq!(message, COMMIT_MESSAGE);
                assert_eq!(actions.len(), 2);
                assert!(actions.iter().all(|a| a.action == FileActionKind::Update));
                assert_eq!(actions[1].content, "1.84.0\n");
            }
            other => panic!("unexpected mutations: {:?}", other),
        }
    }

    #[test]
    fn test_unchanged_map_is_a_noop() {
        let provider = MockProvider::new();
        provider.set_branch(
            OMNIBUS,
            BRANCH,
            &[("VERSION", "def\n"), ("GITALY_SERVER_VERSION", "1.84.0\n")],
        );

        let propagator = VersionPropagator::new(&provider, RunContext::default());
        let outcome = propagator.apply(OMNIBUS, TargetFormat::OmnibusStyle, BRANCH, &desired());

        assert_eq!(outcome, PropagateOutcome::Unchanged);
        assert!(provider.mutations().is_empty());
    }

    #[test]
    fn test_dry_run_makes_no_commit() {
        let provider = MockProvider::new();
        provider.set_branch(OMNIBUS, BRANCH, &[("VERSION", "abc\n")]);

        let propagator = VersionPropagator::new(&provider, RunContext::new(true, false));
        let outcome = propagator.apply(OMNIBUS, TargetFormat::OmnibusStyle, BRANCH, &desired());

        assert_eq!(outcome, PropagateOutcome::DryRun);
        assert!(provider.mutations().is_empty());
    }

    #[test]
    fn test_commit_failure_is_reported_not_raised() {
        let provider = MockProvider::new();
        provider.set_branch(OMNIBUS, BRANCH, &[("VERSION", "abc\n")]);
        provider.fail_on(OMNIBUS, MockOperation::CreateCommit);

        let propagator = VersionPropagator::new(&provider, RunContext::default());
        let outcome = propagator.apply(OMNIBUS, TargetFormat::OmnibusStyle, BRANCH, &desired());

        assert!(outcome.is_failed());
        assert!(outcome.commit().is_none());
    }

    #[test]
    fn test_cng_merge_preserves_unrelated_keys() {
        let provider = MockProvider::new();
        provider.set_branch(
            CNG,
            BRANCH,
            &[(
                VARIABLES_FILE,
                "variables:\n  GITLAB_VERSION: abc\n  ALPINE_VERSION: '3.10'\n",
            )],
        );
        let desired: ComponentVersionMap = [("GITLAB_VERSION", "def")].into_iter().collect();

        let propagator = VersionPropagator::new(&provider, RunContext::default());
        let outcome = propagator.apply(CNG, TargetFormat::ContainerStyle, BRANCH, &desired);
        assert!(outcome.commit().is_some());

        let written = provider.file_at(CNG, BRANCH, VARIABLES_FILE).unwrap();
        let document = VariablesDocument::parse(&written).unwrap();
        assert_eq!(document.get("GITLAB_VERSION"), Some("def".to_string()));
        assert_eq!(document.get("ALPINE_VERSION"), Some("3.10".to_string()));
    }

    #[test]
    fn test_cng_missing_document_is_created() {
        let provider = MockProvider::new();
        provider.set_branch(CNG, BRANCH, &[]);
        let desired: ComponentVersionMap = [("GITLAB_VERSION", "def")].into_iter().collect();

        let propagator = VersionPropagator::new(&provider, RunContext::default());
        propagator.apply(CNG, TargetFormat::ContainerStyle, BRANCH, &desired);

        match &provider.mutations()[..] {
            [Mutation::Commit { actions, .. }] => {
                assert_eq!(actions[0].action, FileActionKind::Create)
            }
            other => panic!("unexpected mutations: {:?}", other),
        }
    }
}
