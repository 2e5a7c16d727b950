//! Workflow orchestration behind the CLI subcommands
//!
//! Keeps argument parsing in `main.rs` and lets every workflow be called
//! programmatically with any [`ContentProvider`].

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::branch_service::{create_auto_deploy_branches, BranchResult};
use crate::config::{Config, RunContext};
use crate::domain::{AutoDeployBranch, ComponentVersionMap};
use crate::git::ContentProvider;
use crate::pipeline::{AutoDeployPipeline, BatchReport, CancellationToken};
use crate::profile::ReleaseProfile;
use crate::project::TargetFormat;
use crate::resolver::ComponentVersionResolver;
use crate::sanitizer::sanitize;

/// Arguments for the tagging workflow
///
/// Mirrors the CLI arguments without depending on clap.
#[derive(Debug, Clone, PartialEq)]
pub struct TagWorkflowArgs {
    /// Auto-deploy branch to advance and tag
    pub branch: String,

    /// Core commit to release; defaults to the branch head
    pub commit: Option<String>,

    /// `omnibus`, `cng` or `all`
    pub profile: String,
}

/// Versions of the core project at a commit, in every packager format
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVersions {
    pub raw: ComponentVersionMap,
    pub omnibus: ComponentVersionMap,
    pub container: ComponentVersionMap,
}

/// Build the run context: configuration, then environment, then flags
pub fn build_context(config: &Config, dry_run: bool, security: bool) -> RunContext {
    RunContext::from_config(config)
        .with_env()
        .with_flags(dry_run, security)
}

/// Auto-deploy branch name for a milestone
///
/// # Arguments
///
/// * `milestone` - Milestone title, e.g. "12.1"
/// * `date` - `YYYY-MM-DD`; today when absent
pub fn branch_name(milestone: &str, date: Option<&str>) -> Result<AutoDeployBranch> {
    let date = match date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", raw))?,
        None => chrono::Local::now().date_naive(),
    };

    Ok(AutoDeployBranch::from_milestone(milestone, date)?)
}

/// Resolve the component versions at `commit`
pub fn run_resolve<P: ContentProvider>(
    provider: &P,
    ctx: &RunContext,
    commit: &str,
) -> Result<ResolvedVersions> {
    let raw = ComponentVersionResolver::new(provider, ctx)
        .resolve(commit)
        .with_context(|| format!("Unable to resolve component versions at {}", commit))?;

    Ok(ResolvedVersions {
        omnibus: sanitize(&raw, TargetFormat::OmnibusStyle),
        container: sanitize(&raw, TargetFormat::ContainerStyle),
        raw,
    })
}

/// Create the auto-deploy branch everywhere
pub fn run_create_branch<P: ContentProvider>(
    provider: P,
    ctx: &RunContext,
    branch: &str,
) -> Result<Vec<BranchResult>> {
    let branch = AutoDeployBranch::parse(branch)?;
    Ok(create_auto_deploy_branches(provider, ctx, &branch))
}

/// Main tagging workflow
///
/// 1. Parse the auto-deploy branch
/// 2. Select release profiles
/// 3. Resolve versions at the requested commit (or the branch head)
/// 4. Propagate and tag every packager
pub fn run_tag_workflow<P: ContentProvider>(
    provider: P,
    ctx: RunContext,
    config: &Config,
    args: &TagWorkflowArgs,
    cancel: &CancellationToken,
) -> Result<BatchReport> {
    let branch = AutoDeployBranch::parse(args.branch.as_str())?;
    let profiles = ReleaseProfile::by_name(&args.profile)?;

    let pipeline = AutoDeployPipeline::new(provider, ctx).with_workers(config.behavior.workers);
    let report = pipeline
        .run(&branch, args.commit.as_deref(), &profiles, cancel)
        .with_context(|| format!("Auto-deploy of {} failed", branch))?;

    Ok(report)
}
