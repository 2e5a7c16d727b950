use crate::domain::Tag;
use crate::error::{AutoDeployError, Result};
use crate::git::{normalize_path, CommitInfo, ContentProvider, FileAction, FileActionKind, RefInfo, RefKind};
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Remote calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Read,
    CreateCommit,
    CreateTag,
    CreateBranch,
}

/// A mutating call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Commit {
        project: String,
        branch: String,
        message: String,
        actions: Vec<FileAction>,
    },
    Tag {
        project: String,
        name: String,
        target: String,
        message: String,
    },
    Branch {
        project: String,
        name: String,
        from: String,
    },
}

struct MockCommit {
    info: CommitInfo,
    files: BTreeMap<String, String>,
}

#[derive(Default)]
struct MockProject {
    commits: HashMap<String, MockCommit>,
    branches: HashMap<String, String>,
    tags: BTreeMap<String, Tag>,
}

impl MockProject {
    fn resolve(&self, project: &str, git_ref: &str) -> Result<String> {
        if let Some(id) = self.branches.get(git_ref) {
            return Ok(id.clone());
        }
        if let Some(tag) = self.tags.get(git_ref) {
            return Ok(tag.target.clone());
        }
        if self.commits.contains_key(git_ref) {
            return Ok(git_ref.to_string());
        }

        Err(AutoDeployError::unavailable(format!(
            "Ref '{}' not found in {}",
            git_ref, project
        )))
    }
}

#[derive(Default)]
struct MockState {
    projects: HashMap<String, MockProject>,
    counter: u64,
    mutations: Vec<Mutation>,
    failures: HashSet<(String, MockOperation)>,
}

/// In-memory provider for testing without repositories on disk.
///
/// Commits get sequential ids and commit times one minute apart, starting at
/// 2019-07-02 10:14 UTC. Every mutating call is recorded.
pub struct MockProvider {
    state: Mutex<MockState>,
    base_time: DateTime<FixedOffset>,
}

impl MockProvider {
    /// Create a new provider without projects
    pub fn new() -> Self {
        let base_time = FixedOffset::east_opt(0)
            .and_then(|utc| utc.with_ymd_and_hms(2019, 7, 2, 10, 14, 0).single())
            .unwrap_or_default();

        MockProvider {
            state: Mutex::new(MockState::default()),
            base_time,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an empty project
    pub fn add_project(&self, project: &str) {
        self.state()
            .projects
            .entry(project.to_string())
            .or_default();
    }

    /// Add a detached commit with an explicit id
    pub fn add_commit(&self, project: &str, id: &str, files: &[(&str, &str)]) {
        let mut state = self.state();
        let created_at = self.next_time(&mut state);
        let commit = MockCommit {
            info: CommitInfo {
                id: id.to_string(),
                created_at,
                message: "fixture".to_string(),
            },
            files: files
                .iter()
                .map(|(path, content)| (normalize_path(path).to_string(), content.to_string()))
                .collect(),
        };

        state
            .projects
            .entry(project.to_string())
            .or_default()
            .commits
            .insert(id.to_string(), commit);
    }

    /// Create a commit holding exactly `files` and point `branch` at it
    pub fn set_branch(&self, project: &str, branch: &str, files: &[(&str, &str)]) -> CommitInfo {
        let mut state = self.state();
        let id = self.next_id(&mut state);
        let created_at = self.next_time(&mut state);
        let info = CommitInfo {
            id: id.clone(),
            created_at,
            message: "fixture".to_string(),
        };

        let project = state.projects.entry(project.to_string()).or_default();
        project.commits.insert(
            id.clone(),
            MockCommit {
                info: info.clone(),
                files: files
                    .iter()
                    .map(|(path, content)| (normalize_path(path).to_string(), content.to_string()))
                    .collect(),
            },
        );
        project.branches.insert(branch.to_string(), id);

        info
    }

    /// Point an existing tag name at a commit without recording a mutation
    pub fn add_tag(&self, project: &str, name: &str, target: &str) {
        self.state()
            .projects
            .entry(project.to_string())
            .or_default()
            .tags
            .insert(name.to_string(), Tag::new(name, "", target));
    }

    /// Make every call of `operation` against `project` fail
    pub fn fail_on(&self, project: &str, operation: MockOperation) {
        self.state()
            .failures
            .insert((project.to_string(), operation));
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.state().mutations.clone()
    }

    pub fn commits_on(&self, project: &str) -> Vec<Mutation> {
        self.mutations()
            .into_iter()
            .filter(|m| matches!(m, Mutation::Commit { project: p, .. } if p == project))
            .collect()
    }

    pub fn tags(&self, project: &str) -> Vec<Tag> {
        self.state()
            .projects
            .get(project)
            .map(|p| p.tags.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Content of a file at a branch head
    pub fn file_at(&self, project: &str, branch: &str, path: &str) -> Option<String> {
        self.read_file(project, path, branch).ok().flatten()
    }

    fn next_id(&self, state: &mut MockState) -> String {
        state.counter += 1;
        format!("{:040x}", 0xc0ffee_u64 * 1_000 + state.counter)
    }

    fn next_time(&self, state: &mut MockState) -> DateTime<FixedOffset> {
        self.base_time + Duration::minutes(state.counter as i64)
    }

    fn check_failure(state: &MockState, project: &str, operation: MockOperation) -> Result<()> {
        if state.failures.contains(&(project.to_string(), operation)) {
            return Err(AutoDeployError::remote(format!(
                "403 Forbidden: {:?} on {}",
                operation, project
            )));
        }
        Ok(())
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_project(project: &str) -> AutoDeployError {
    AutoDeployError::unavailable(format!("Project not found: {}", project))
}

impl ContentProvider for MockProvider {
    fn read_file(&self, project: &str, path: &str, git_ref: &str) -> Result<Option<String>> {
        let state = self.state();
        Self::check_failure(&state, project, MockOperation::Read)?;

        let repo = state.projects.get(project).ok_or_else(|| missing_project(project))?;
        let id = repo.resolve(project, git_ref)?;

        Ok(repo
            .commits
            .get(&id)
            .and_then(|commit| commit.files.get(normalize_path(path)).cloned()))
    }

    fn branch_head(&self, project: &str, branch: &str) -> Result<CommitInfo> {
        let state = self.state();
        Self::check_failure(&state, project, MockOperation::Read)?;

        let repo = state.projects.get(project).ok_or_else(|| missing_project(project))?;
        repo.branches
            .get(branch)
            .and_then(|id| repo.commits.get(id))
            .map(|commit| commit.info.clone())
            .ok_or_else(|| {
                AutoDeployError::unavailable(format!("Branch not found: {} in {}", branch, project))
            })
    }

    fn create_commit(
        &self,
        project: &str,
        branch: &str,
        message: &str,
        actions: &[FileAction],
    ) -> Result<CommitInfo> {
        let mut state = self.state();
        Self::check_failure(&state, project, MockOperation::CreateCommit)?;

        let mut files = {
            let repo = state.projects.get(project).ok_or_else(|| missing_project(project))?;
            let head = repo.branches.get(branch).ok_or_else(|| {
                AutoDeployError::unavailable(format!("Branch not found: {} in {}", branch, project))
            })?;
            repo.commits
                .get(head)
                .map(|commit| commit.files.clone())
                .unwrap_or_default()
        };

        for action in actions {
            let path = normalize_path(&action.file_path).to_string();
            match action.action {
                FileActionKind::Create if files.contains_key(&path) => {
                    return Err(AutoDeployError::already_exists(format!(
                        "A file with this name already exists: {}",
                        path
                    )));
                }
                FileActionKind::Update if !files.contains_key(&path) => {
                    return Err(AutoDeployError::remote(format!(
                        "A file with this name doesn't exist: {}",
                        path
                    )));
                }
                _ => {
                    files.insert(path, action.content.clone());
                }
            }
        }

        let id = self.next_id(&mut state);
        let created_at = self.next_time(&mut state);
        let info = CommitInfo {
            id: id.clone(),
            created_at,
            message: message.to_string(),
        };

        if let Some(repo) = state.projects.get_mut(project) {
            repo.commits.insert(
                id.clone(),
                MockCommit {
                    info: info.clone(),
                    files,
                },
            );
            repo.branches.insert(branch.to_string(), id);
        }

        state.mutations.push(Mutation::Commit {
            project: project.to_string(),
            branch: branch.to_string(),
            message: message.to_string(),
            actions: actions.to_vec(),
        });

        Ok(info)
    }

    fn refs_at(&self, project: &str, git_ref: &str) -> Result<Vec<RefInfo>> {
        let state = self.state();
        Self::check_failure(&state, project, MockOperation::Read)?;

        let repo = state.projects.get(project).ok_or_else(|| missing_project(project))?;
        let id = repo.resolve(project, git_ref)?;

        let mut refs: Vec<RefInfo> = repo
            .branches
            .iter()
            .filter(|(_, head)| **head == id)
            .map(|(name, _)| RefInfo {
                kind: RefKind::Branch,
                name: name.clone(),
            })
            .collect();
        refs.extend(repo.tags.values().filter(|tag| tag.target == id).map(|tag| RefInfo {
            kind: RefKind::Tag,
            name: tag.name.clone(),
        }));

        Ok(refs)
    }

    fn create_tag(&self, project: &str, name: &str, target_ref: &str, message: &str) -> Result<Tag> {
        let mut state = self.state();
        Self::check_failure(&state, project, MockOperation::CreateTag)?;

        let repo = state
            .projects
            .get_mut(project)
            .ok_or_else(|| missing_project(project))?;
        if repo.tags.contains_key(name) {
            return Err(AutoDeployError::already_exists(format!(
                "Tag {} already exists",
                name
            )));
        }

        let target = repo.resolve(project, target_ref)?;
        let tag = Tag::new(name, message, target.clone());
        repo.tags.insert(name.to_string(), tag.clone());

        state.mutations.push(Mutation::Tag {
            project: project.to_string(),
            name: name.to_string(),
            target,
            message: message.to_string(),
        });

        Ok(tag)
    }

    fn find_tag(&self, project: &str, name: &str) -> Result<Option<Tag>> {
        let state = self.state();
        let repo = state.projects.get(project).ok_or_else(|| missing_project(project))?;
        Ok(repo.tags.get(name).cloned())
    }

    fn create_branch(&self, project: &str, name: &str, from_ref: &str) -> Result<()> {
        let mut state = self.state();
        Self::check_failure(&state, project, MockOperation::CreateBranch)?;

        let repo = state
            .projects
            .get_mut(project)
            .ok_or_else(|| missing_project(project))?;
        if repo.branches.contains_key(name) {
            return Err(AutoDeployError::already_exists(format!(
                "Branch {} already exists",
                name
            )));
        }

        let target = repo.resolve(project, from_ref)?;
        repo.branches.insert(name.to_string(), target);

        state.mutations.push(Mutation::Branch {
            project: project.to_string(),
            name: name.to_string(),
            from: from_ref.to_string(),
        });

        Ok(())
    }
}
