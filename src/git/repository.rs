use crate::domain::Tag;
use crate::error::{AutoDeployError, Result};
use crate::git::{normalize_path, CommitInfo, ContentProvider, FileAction, FileActionKind, RefInfo, RefKind};
use chrono::{FixedOffset, TimeZone};
use git2::{BranchType, Commit, ErrorCode, ObjectType, Oid, Repository as Git2Repo, Signature, Tree};
use std::path::{Path, PathBuf};

const FILE_MODE_BLOB: i32 = 0o100644;
const FILE_MODE_TREE: i32 = 0o040000;

/// Provider over git repositories on disk.
///
/// Projects are addressed by path below a root directory, so
/// `gitlab-org/omnibus-gitlab` is the repository at
/// `<root>/gitlab-org/omnibus-gitlab`. Repositories are opened per call, which
/// keeps the provider `Send + Sync` without sharing a `git2::Repository`.
pub struct Git2Provider {
    root: PathBuf,
}

impl Git2Provider {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Git2Provider {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open(&self, project: &str) -> Result<Git2Repo> {
        let path = self.root.join(project);
        Git2Repo::open(&path).map_err(|e| {
            AutoDeployError::unavailable(format!("Cannot open project '{}': {}", project, e))
        })
    }

    fn signature(repo: &Git2Repo) -> Result<Signature<'static>> {
        match repo.signature() {
            Ok(signature) => Ok(signature.to_owned()),
            Err(_) => Ok(Signature::now("git-autodeploy", "git-autodeploy@localhost")?),
        }
    }
}

fn resolve_commit<'r>(repo: &'r Git2Repo, project: &str, git_ref: &str) -> Result<Commit<'r>> {
    let object = repo.revparse_single(git_ref).map_err(|e| {
        AutoDeployError::unavailable(format!("Cannot find ref '{}' in {}: {}", git_ref, project, e))
    })?;

    object.peel_to_commit().map_err(|e| {
        AutoDeployError::unavailable(format!("Ref '{}' in {} is not a commit: {}", git_ref, project, e))
    })
}

fn commit_info(commit: &Commit<'_>) -> Result<CommitInfo> {
    let time = commit.time();
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .ok_or_else(|| AutoDeployError::remote(format!("Invalid commit offset on {}", commit.id())))?;
    let created_at = offset
        .timestamp_opt(time.seconds(), 0)
        .single()
        .ok_or_else(|| AutoDeployError::remote(format!("Invalid commit time on {}", commit.id())))?;

    Ok(CommitInfo {
        id: commit.id().to_string(),
        created_at,
        message: commit.message().unwrap_or_default().to_string(),
    })
}

/// Write `blob` at `parts` below `base`, creating intermediate trees
fn upsert_path(repo: &Git2Repo, base: Option<&Tree<'_>>, parts: &[&str], blob: Oid) -> Result<Oid> {
    let (first, rest) = parts
        .split_first()
        .ok_or_else(|| AutoDeployError::remote("Empty file path"))?;
    let mut builder = repo.treebuilder(base)?;

    if rest.is_empty() {
        builder.insert(first, blob, FILE_MODE_BLOB)?;
    } else {
        let subtree = match base.and_then(|tree| tree.get_name(first)) {
            Some(entry) if entry.kind() == Some(ObjectType::Tree) => Some(repo.find_tree(entry.id())?),
            _ => None,
        };
        let oid = upsert_path(repo, subtree.as_ref(), rest, blob)?;
        builder.insert(first, oid, FILE_MODE_TREE)?;
    }

    Ok(builder.write()?)
}

impl ContentProvider for Git2Provider {
    fn read_file(&self, project: &str, path: &str, git_ref: &str) -> Result<Option<String>> {
        let repo = self.open(project)?;
        let commit = resolve_commit(&repo, project, git_ref)?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(Path::new(normalize_path(path))) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let blob = repo.find_blob(entry.id())?;
        let content = String::from_utf8(blob.content().to_vec()).map_err(|_| {
            AutoDeployError::remote(format!(
                "File '{}' at '{}' in {} is not valid UTF-8",
                path, git_ref, project
            ))
        })?;
        Ok(Some(content))
    }

    fn branch_head(&self, project: &str, branch: &str) -> Result<CommitInfo> {
        let repo = self.open(project)?;
        let branch_ref = repo.find_branch(branch, BranchType::Local).map_err(|e| {
            AutoDeployError::unavailable(format!("Cannot find branch '{}' in {}: {}", branch, project, e))
        })?;

        let commit = branch_ref.get().peel_to_commit()?;
        commit_info(&commit)
    }

    fn create_commit(
        &self,
        project: &str,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitInfo> {
        let repo = self.open(project)?;
        let parent = repo
            .find_branch(branch, BranchType::Local)
            .map_err(|e| {
                AutoDeployError::unavailable(format!("Cannot find branch '{}' in {}: {}", branch, project, e))
            })?
            .get()
            .peel_to_commit()?;

        let mut tree = parent.tree()?;
        for action in actions {
            let path = normalize_path(&action.file_path);
            let exists = tree.get_path(Path::new(path)).is_ok();

            match action.action {
                FileActionKind::Create if exists => {
                    return Err(AutoDeployError::already_exists(format!(
                        "A file with this name already exists: {}",
                        path
                    )));
                }
                FileActionKind::Update if !exists => {
                    return Err(AutoDeployError::remote(format!(
                        "A file with this name doesn't exist: {}",
                        path
                    )));
                }
                _ => {}
            }

            let blob = repo.blob(action.content.as_bytes())?;
            let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
            let oid = upsert_path(&repo, Some(&tree), &parts, blob)?;
            tree = repo.find_tree(oid)?;
        }

        let signature = Self::signature(&repo)?;
        let reference = format!("refs/heads/{}", branch);
        let oid = repo.commit(
            Some(&reference),
            &signature,
            &signature,
            message,
            &tree,
            &[&parent],
        )?;

        let commit = repo.find_commit(oid)?;
        commit_info(&commit)
    }

    fn refs_at(&self, project: &str, git_ref: &str) -> Result<Vec<RefInfo>> {
        let repo = self.open(project)?;
        let target = resolve_commit(&repo, project, git_ref)?.id();

        let mut refs = Vec::new();
        for reference in repo.references()? {
            let reference = reference?;
            let Some(name) = reference.name() else {
                continue;
            };

            let (kind, short) = if let Some(short) = name.strip_prefix("refs/tags/") {
                (RefKind::Tag, short)
            } else if let Some(short) = name.strip_prefix("refs/heads/") {
                (RefKind::Branch, short)
            } else {
                continue;
            };

            if let Ok(commit) = reference.peel_to_commit() {
                if commit.id() == target {
                    refs.push(RefInfo {
                        kind,
                        name: short.to_string(),
                    });
                }
            }
        }

        Ok(refs)
    }

    fn create_tag(&self, project: &str, name: &str, target_ref: &str, message: &str) -> Result<Tag> {
        let repo = self.open(project)?;
        if repo.find_reference(&format!("refs/tags/{}", name)).is_ok() {
            return Err(AutoDeployError::already_exists(format!(
                "Tag {} already exists",
                name
            )));
        }

        let commit = resolve_commit(&repo, project, target_ref)?;
        let signature = Self::signature(&repo)?;

        match repo.tag(name, commit.as_object(), &signature, message, false) {
            Ok(_) => Ok(Tag::new(name, message, commit.id().to_string())),
            Err(e) if e.code() == ErrorCode::Exists => Err(AutoDeployError::already_exists(
                format!("Tag {} already exists", name),
            )),
            Err(e) => Err(AutoDeployError::remote(format!("Cannot create tag: {}", e))),
        }
    }

    fn find_tag(&self, project: &str, name: &str) -> Result<Option<Tag>> {
        let repo = self.open(project)?;
        let reference = match repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(reference) => reference,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let target = reference.peel_to_commit()?.id().to_string();
        let message = reference
            .peel_to_tag()
            .ok()
            .and_then(|tag| tag.message().map(str::to_string))
            .unwrap_or_default();

        Ok(Some(Tag::new(name, message, target)))
    }

    fn create_branch(&self, project: &str, name: &str, from_ref: &str) -> Result<()> {
        let repo = self.open(project)?;
        let commit = resolve_commit(&repo, project, from_ref)?;

        repo.branch(name, &commit, false)
            .map(|_| ())
            .map_err(|e| match e.code() {
                ErrorCode::Exists => {
                    AutoDeployError::already_exists(format!("Branch {} already exists", name))
                }
                _ => e.into(),
            })
    }
}
