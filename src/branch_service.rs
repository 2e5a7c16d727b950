use crate::config::RunContext;
use crate::domain::AutoDeployBranch;
use crate::error::Result;
use crate::git::{ContentProvider, IdempotentProvider};
use crate::project::Project;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchStatus {
    /// Created, or already present
    Created,
    DryRun,
    Failed(String),
}

/// Outcome of creating the branch in one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResult {
    pub project: Project,
    pub branch: String,
    /// Commit the branch was created from, when it could be determined
    pub from: Option<String>,
    pub status: BranchStatus,
}

/// Create `branch` in the core project and every packager.
///
/// Each branch starts at the head of the project's default branch. A failure
/// in one project is reported and does not stop the others.
pub fn create_auto_deploy_branches<P: ContentProvider>(
    provider: P,
    ctx: &RunContext,
    branch: &AutoDeployBranch,
) -> Vec<BranchResult> {
    let provider = IdempotentProvider::new(provider);

    Project::AUTO_DEPLOY
        .iter()
        .map(|project| create_branch(&provider, ctx, *project, &branch.name))
        .collect()
}

fn create_branch<P: ContentProvider>(
    provider: &P,
    ctx: &RunContext,
    project: Project,
    branch: &str,
) -> BranchResult {
    let path = project.path(ctx);
    let mut result = BranchResult {
        project,
        branch: branch.to_string(),
        from: None,
        status: BranchStatus::Created,
    };

    let outcome: Result<()> = provider
        .branch_head(path, project.default_branch())
        .and_then(|head| {
            info!(project = path, name = branch, from = head.id.as_str(), "Creating branch");
            result.from = Some(head.id.clone());

            if ctx.dry_run {
                result.status = BranchStatus::DryRun;
                return Ok(());
            }
            provider.create_branch(path, branch, &head.id)
        });

    if let Err(e) = outcome {
        error!(
            fatal = true,
            project = path,
            name = branch,
            status = e.status(),
            error = %e,
            "Failed to create branch"
        );
        result.status = BranchStatus::Failed(e.to_string());
    }

    result
}
