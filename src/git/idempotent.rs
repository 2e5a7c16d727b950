use crate::domain::Tag;
use crate::error::Result;
use crate::git::{CommitInfo, ContentProvider, FileAction, RefInfo};
use tracing::info;

/// Provider decorator making re-runs safe.
///
/// Idempotent mutations that fail because their result already exists are
/// reported as success:
///
/// - `create_tag` returns the existing tag
/// - `create_branch` succeeds
/// - `create_file` falls back to `edit_file`
///
/// Everything else is forwarded unchanged.
pub struct IdempotentProvider<P> {
    inner: P,
}

impl<P: ContentProvider> IdempotentProvider<P> {
    pub fn new(inner: P) -> Self {
        IdempotentProvider { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: ContentProvider> ContentProvider for IdempotentProvider<P> {
    fn read_file(&self, project: &str, path: &str, git_ref: &str) -> Result<Option<String>> {
        self.inner.read_file(project, path, git_ref)
    }

    fn branch_head(&self, project: &str, branch: &str) -> Result<CommitInfo> {
        self.inner.branch_head(project, branch)
    }

    fn create_commit(
        &self,
        project: &str,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitInfo> {
        self.inner.create_commit(project, branch, message, actions)
    }

    fn refs_at(&self, project: &str, git_ref: &str) -> Result<Vec<RefInfo>> {
        self.inner.refs_at(project, git_ref)
    }

    fn create_tag(&self, project: &str, name: &str, target_ref: &str, message: &str) -> Result<Tag> {
        match self.inner.create_tag(project, name, target_ref, message) {
            Err(e) if e.is_already_exists() => {
                info!(project, tag = name, "Tag already exists");
                let existing = self.inner.find_tag(project, name)?;
                Ok(existing.unwrap_or_else(|| Tag::new(name, message, target_ref)))
            }
            other => other,
        }
    }

    fn find_tag(&self, project: &str, name: &str) -> Result<Option<Tag>> {
        self.inner.find_tag(project, name)
    }

    fn create_branch(&self, project: &str, name: &str, from_ref: &str) -> Result<()> {
        match self.inner.create_branch(project, name, from_ref) {
            Err(e) if e.is_already_exists() => {
                info!(project, branch = name, "Branch already exists");
                Ok(())
            }
            other => other,
        }
    }

    fn create_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        match self.inner.create_file(project, path, branch, content, message) {
            Err(e) if e.is_already_exists() => {
                info!(project, path, "File already exists, updating instead");
                self.inner.edit_file(project, path, branch, content, message)
            }
            other => other,
        }
    }

    fn edit_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        self.inner.edit_file(project, path, branch, content, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::mock::{MockOperation, MockProvider, Mutation};

    #[test]
    fn test_existing_tag_is_success() {
        let mock = MockProvider::new();
        let head = mock.set_branch("group/app", "master", &[]);
        mock.add_tag("group/app", "v1", &head.id);

        let provider = IdempotentProvider::new(&mock);
        let tag = provider.create_tag("group/app", "v1", "master", "msg").unwrap();

        assert_eq!(tag.target, head.id);
        assert!(mock.mutations().is_empty());
    }

    #[test]
    fn test_existing_branch_is_success() {
        let mock = MockProvider::new();
        mock.set_branch("group/app", "master", &[]);
        mock.set_branch("group/app", "12-1-auto-deploy-20190702", &[]);

        let provider = IdempotentProvider::new(&mock);
        provider
            .create_branch("group/app", "12-1-auto-deploy-20190702", "master")
            .unwrap();

        assert!(mock.mutations().is_empty());
    }

    #[test]
    fn test_create_file_falls_back_to_edit() {
        let mock = MockProvider::new();
        mock.set_branch("group/meta", "master", &[("releases/12/x.json", "{}")]);

        let provider = IdempotentProvider::new(&mock);
        provider
            .create_file("group/meta", "releases/12/x.json", "master", "{\"a\":1}", "msg")
            .unwrap();

        assert_eq!(
            mock.file_at("group/meta", "master", "releases/12/x.json"),
            Some("{\"a\":1}".to_string())
        );
        match &mock.mutations()[..] {
            [Mutation::Commit { actions, .. }] => {
                assert_eq!(actions[0].action, crate::git::FileActionKind::Update)
            }
            other => panic!("unexpected mutations: {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        let mock = MockProvider::new();
        mock.set_branch("group/app", "master", &[]);
        mock.fail_on("group/app", MockOperation::CreateTag);

        let provider = IdempotentProvider::new(&mock);
        let err = provider.create_tag("group/app", "v1", "master", "").unwrap_err();
        assert!(!err.is_already_exists());
    }
}
