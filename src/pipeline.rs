//! The resolve → sanitize → propagate → tag pipeline over every packager.

use crate::config::RunContext;
use crate::domain::{AutoDeployBranch, ComponentVersionMap};
use crate::error::{AutoDeployError, Result};
use crate::git::{ContentProvider, IdempotentProvider};
use crate::profile::ReleaseProfile;
use crate::project::Project;
use crate::propagator::{PropagateOutcome, VersionPropagator};
use crate::resolver::ComponentVersionResolver;
use crate::sanitizer::sanitize;
use crate::tagger::{TagOutcome, Tagger};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, info_span, warn};

/// Cooperative cancellation signal checked between pipeline steps
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Cancelled` error naming the step that will not run
    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(AutoDeployError::cancelled(step));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileStatus {
    Completed,
    Failed(String),
    Cancelled(String),
}

/// What happened to one packager
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileReport {
    pub profile: &'static str,
    pub project: &'static str,
    /// Sanitized map committed to the packager
    pub versions: ComponentVersionMap,
    pub propagation: Option<PropagateOutcome>,
    pub tagging: Option<TagOutcome>,
    pub status: ProfileStatus,
}

impl ProfileReport {
    pub fn is_success(&self) -> bool {
        self.status == ProfileStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub branch: String,
    /// Core commit the versions were resolved at
    pub commit: String,
    pub versions: ComponentVersionMap,
    pub profiles: Vec<ProfileReport>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.profiles.iter().all(ProfileReport::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProfileReport> {
        self.profiles.iter().filter(|p| !p.is_success())
    }
}

/// Runs release profiles against an auto-deploy branch.
///
/// The provider is wrapped in [`IdempotentProvider`], so re-running a batch
/// against the same commit only repeats reads.
pub struct AutoDeployPipeline<P> {
    provider: IdempotentProvider<P>,
    ctx: RunContext,
    workers: Option<usize>,
}

impl<P: ContentProvider> AutoDeployPipeline<P> {
    pub fn new(provider: P, ctx: RunContext) -> Self {
        AutoDeployPipeline {
            provider: IdempotentProvider::new(provider),
            ctx,
            workers: None,
        }
    }

    /// Bound the number of profiles processed at once
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        self.workers = workers;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    fn pool_size(&self, profiles: usize) -> usize {
        let available = self
            .workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1);
        available.min(profiles).max(1)
    }

    /// Head of the auto-deploy branch on the core project
    pub fn upstream_commit(&self, branch: &AutoDeployBranch) -> Result<String> {
        let head = self
            .provider
            .branch_head(Project::GitlabEe.path(&self.ctx), &branch.name)?;
        Ok(head.id)
    }

    /// Resolve once, then run every profile in parallel.
    ///
    /// Fails only when nothing can be released: the upstream commit or its
    /// versions cannot be resolved, or the batch was cancelled before
    /// resolution. Per-profile failures are recorded in the report.
    pub fn run(
        &self,
        branch: &AutoDeployBranch,
        commit: Option<&str>,
        profiles: &[ReleaseProfile],
        cancel: &CancellationToken,
    ) -> Result<BatchReport> {
        cancel.check("resolving component versions")?;

        let commit = match commit {
            Some(commit) => commit.to_string(),
            None => self.upstream_commit(branch)?,
        };
        let versions = ComponentVersionResolver::new(&self.provider, &self.ctx).resolve(&commit)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.pool_size(profiles.len()))
            .build()
            .map_err(|e| AutoDeployError::config(format!("Unable to start worker pool: {}", e)))?;

        let reports: Vec<ProfileReport> = pool.install(|| {
            profiles
                .par_iter()
                .map(|profile| self.run_profile(profile, branch, &commit, &versions, cancel))
                .collect()
        });

        let report = BatchReport {
            branch: branch.name.clone(),
            commit,
            versions,
            profiles: reports,
        };

        for failure in report.failures() {
            warn!(profile = failure.profile, status = ?failure.status, "Profile did not complete");
        }

        Ok(report)
    }

    fn run_profile(
        &self,
        profile: &ReleaseProfile,
        branch: &AutoDeployBranch,
        commit: &str,
        versions: &ComponentVersionMap,
        cancel: &CancellationToken,
    ) -> ProfileReport {
        let project = profile.packager.path(&self.ctx);
        let _span = info_span!("profile", profile = profile.name(), project).entered();

        let mut report = ProfileReport {
            profile: profile.name(),
            project,
            versions: sanitize(versions, profile.format),
            propagation: None,
            tagging: None,
            status: ProfileStatus::Completed,
        };

        if let Err(e) = cancel.check("propagating") {
            report.status = ProfileStatus::Cancelled(e.to_string());
            return report;
        }

        let propagator = VersionPropagator::new(&self.provider, self.ctx);
        let propagation = propagator.apply(project, profile.format, &branch.name, &report.versions);
        let failed = match &propagation {
            PropagateOutcome::Failed(message) => Some(message.clone()),
            _ => None,
        };
        report.propagation = Some(propagation);

        // The branch did not advance; its tag state says nothing about these versions
        if let Some(message) = failed {
            report.status = ProfileStatus::Failed(message);
            return report;
        }

        if let Err(e) = cancel.check("tagging") {
            report.status = ProfileStatus::Cancelled(e.to_string());
            return report;
        }

        let tagger = Tagger::new(&self.provider, self.ctx, profile);
        match tagger.tag(branch, &report.versions, commit) {
            Ok(outcome) => {
                info!(state = %outcome.state, "Tagging finished");
                report.tagging = Some(outcome);
            }
            Err(e) => report.status = ProfileStatus::Failed(e.to_string()),
        }

        report
    }
}
