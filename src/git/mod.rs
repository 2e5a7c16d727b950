//! Repository access abstraction layer
//!
//! This module provides a trait-based abstraction over the repository
//! operations the release engine needs, allowing for multiple implementations
//! including local Git repositories and in-memory fakes for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [ContentProvider] trait. The concrete
//! implementations include:
//!
//! - [repository::Git2Provider]: repositories on disk, through the `git2` crate
//! - [mock::MockProvider]: an in-memory provider that records every mutation
//! - [idempotent::IdempotentProvider]: a decorator that turns "already exists"
//!   failures of idempotent calls into success
//!
//! # Usage
//!
//! Components depend on the trait rather than concrete implementations:
//!
//! ```rust
//! # use git_autodeploy::git::ContentProvider;
//! # fn example<P: ContentProvider>(provider: &P) -> git_autodeploy::Result<()> {
//! let head = provider.branch_head("gitlab-org/omnibus-gitlab", "master")?;
//! let version = provider.read_file("gitlab-org/omnibus-gitlab", "VERSION", &head.id)?;
//! # Ok(())
//! # }
//! ```

pub mod idempotent;
pub mod mock;
pub mod repository;

pub use idempotent::IdempotentProvider;
pub use mock::MockProvider;
pub use repository::Git2Provider;

use crate::domain::Tag;
use crate::error::Result;
use chrono::{DateTime, FixedOffset};

/// Commit information returned by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct CommitInfo {
    /// Full commit id
    pub id: String,
    /// Commit time in the offset it was recorded with
    pub created_at: DateTime<FixedOffset>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
}

/// A ref pointing at a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    pub kind: RefKind,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileActionKind {
    /// Fails when the file already exists
    Create,
    /// Fails when the file does not exist
    Update,
}

/// One file change inside a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAction {
    pub action: FileActionKind,
    pub file_path: String,
    pub content: String,
}

impl FileAction {
    pub fn create(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        FileAction {
            action: FileActionKind::Create,
            file_path: file_path.into(),
            content: content.into(),
        }
    }

    pub fn update(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        FileAction {
            action: FileActionKind::Update,
            file_path: file_path.into(),
            content: content.into(),
        }
    }
}

/// Strip the leading `/` some callers use for root-relative paths
pub(crate) fn normalize_path(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Repository content operation trait
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync`; packager pipelines share one
/// provider across worker threads.
///
/// ## Error Handling
///
/// - A missing project, branch or ref is [crate::error::AutoDeployError::RemoteUnavailable].
/// - Creating something that already exists is
///   [crate::error::AutoDeployError::AlreadyExists].
/// - A missing file is not an error: [ContentProvider::read_file] returns `Ok(None)`.
pub trait ContentProvider: Send + Sync {
    /// Read a file at a ref (branch name, tag name or commit id)
    ///
    /// # Returns
    /// * `Ok(Some(content))` - File content
    /// * `Ok(None)` - The ref exists but the file does not
    /// * `Err` - The project or ref cannot be reached
    fn read_file(&self, project: &str, path: &str, git_ref: &str) -> Result<Option<String>>;

    /// Get the commit at the tip of a branch
    fn branch_head(&self, project: &str, branch: &str) -> Result<CommitInfo>;

    /// Create one commit on `branch` applying every action
    ///
    /// # Returns
    /// * `Ok(CommitInfo)` - The new branch head
    /// * `Err` - If the branch is missing or an action cannot be applied
    fn create_commit(
        &self,
        project: &str,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitInfo>;

    /// List the refs pointing at the commit `git_ref` resolves to
    fn refs_at(&self, project: &str, git_ref: &str) -> Result<Vec<RefInfo>>;

    /// Create an annotated tag
    ///
    /// # Returns
    /// * `Ok(Tag)` - The created tag
    /// * `Err(AlreadyExists)` - A tag with this name exists
    fn create_tag(&self, project: &str, name: &str, target_ref: &str, message: &str) -> Result<Tag>;

    /// Look up a tag by name
    fn find_tag(&self, project: &str, name: &str) -> Result<Option<Tag>>;

    /// Create a branch from a ref
    fn create_branch(&self, project: &str, name: &str, from_ref: &str) -> Result<()>;

    /// Commit a new file; `AlreadyExists` when the path is taken
    fn create_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        self.create_commit(project, branch, message, &[FileAction::create(path, content)])
    }

    /// Commit new content for an existing file
    fn edit_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        self.create_commit(project, branch, message, &[FileAction::update(path, content)])
    }
}

impl<P: ContentProvider + ?Sized> ContentProvider for &P {
    fn read_file(&self, project: &str, path: &str, git_ref: &str) -> Result<Option<String>> {
        (**self).read_file(project, path, git_ref)
    }

    fn branch_head(&self, project: &str, branch: &str) -> Result<CommitInfo> {
        (**self).branch_head(project, branch)
    }

    fn create_commit(
        &self,
        project: &str,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitInfo> {
        (**self).create_commit(project, branch, message, actions)
    }

    fn refs_at(&self, project: &str, git_ref: &str) -> Result<Vec<RefInfo>> {
        (**self).refs_at(project, git_ref)
    }

    fn create_tag(&self, project: &str, name: &str, target_ref: &str, message: &str) -> Result<Tag> {
        (**self).create_tag(project, name, target_ref, message)
    }

    fn find_tag(&self, project: &str, name: &str) -> Result<Option<Tag>> {
        (**self).find_tag(project, name)
    }

    fn create_branch(&self, project: &str, name: &str, from_ref: &str) -> Result<()> {
        (**self).create_branch(project, name, from_ref)
    }

    fn create_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        (**self).create_file(project, path, branch, content, message)
    }

    fn edit_file(
        &self,
        project: &str,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
    ) -> Result<CommitInfo> {
        (**self).edit_file(project, path, branch, content, message)
    }
}
