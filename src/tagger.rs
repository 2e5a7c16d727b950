use crate::config::RunContext;
use crate::domain::tag::{auto_deploy_tag_message, auto_deploy_tag_name};
use crate::domain::{AutoDeployBranch, ComponentVersionMap, Tag};
use crate::error::Result;
use crate::git::{CommitInfo, ContentProvider, RefKind};
use crate::metadata::{ReleaseMetadata, ReleaseMetadataUploader};
use crate::profile::ReleaseProfile;
use crate::project::Project;
use std::fmt;
use tracing::{error, info, warn};

/// Where the tagging state machine stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaggerState {
    /// A tag already points at the branch head
    Skipped,
    /// Dry run: the tag was computed but not created
    PendingTag,
    /// Primary tag created, no tracker configured
    TagCreated,
    /// Primary and mirror tag created
    DependentTagCreated,
    /// Primary tag created, mirror tag failed
    DependentTagFailed,
}

impl fmt::Display for TaggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaggerState::Skipped => "skipped",
            TaggerState::PendingTag => "pending",
            TaggerState::TagCreated => "tagged",
            TaggerState::DependentTagCreated => "tagged+mirrored",
            TaggerState::DependentTagFailed => "tagged, mirror failed",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagOutcome {
    pub state: TaggerState,
    /// Created or (in dry run) computed tag
    pub tag: Option<Tag>,
    pub metadata_uploaded: bool,
}

impl TagOutcome {
    fn skipped() -> Self {
        TagOutcome {
            state: TaggerState::Skipped,
            tag: None,
            metadata_uploaded: false,
        }
    }
}

/// Tags a packager's auto-deploy branch once its content has advanced.
///
/// A tag pointing at the branch head means the content was already released;
/// this is the only record of prior work.
pub struct Tagger<'a, P> {
    provider: &'a P,
    ctx: RunContext,
    profile: &'a ReleaseProfile,
}

impl<'a, P: ContentProvider> Tagger<'a, P> {
    pub fn new(provider: &'a P, ctx: RunContext, profile: &'a ReleaseProfile) -> Self {
        Tagger {
            provider,
            ctx,
            profile,
        }
    }

    fn project(&self) -> &'static str {
        self.profile.packager.path(&self.ctx)
    }

    /// True when no tag points at `head`
    pub fn changes(&self, head: &CommitInfo) -> Result<bool> {
        let refs = self.provider.refs_at(self.project(), &head.id)?;
        Ok(!refs.iter().any(|r| r.kind == RefKind::Tag))
    }

    /// Tag name and message for the current branch head
    pub fn tag_for(
        &self,
        branch: &AutoDeployBranch,
        head: &CommitInfo,
        versions: &ComponentVersionMap,
        upstream_ref: &str,
    ) -> Tag {
        let packager_ref = self.profile.packager_ref_in_tag.then_some(head.id.as_str());
        let name = auto_deploy_tag_name(branch, &head.created_at, upstream_ref, packager_ref);
        let message = auto_deploy_tag_message(self.profile.label, &name, versions);

        Tag::new(name, message, head.id.as_str())
    }

    /// Run the state machine against `branch`.
    ///
    /// `versions` is the map committed to the packager and `upstream_ref` the
    /// core commit it was resolved from.
    ///
    /// # Errors
    /// Reading the branch head, listing its refs and creating the primary tag
    /// are fatal. Mirror tag and metadata failures are logged and reflected in
    /// the outcome.
    pub fn tag(
        &self,
        branch: &AutoDeployBranch,
        versions: &ComponentVersionMap,
        upstream_ref: &str,
    ) -> Result<TagOutcome> {
        let project = self.project();
        let head = self.provider.branch_head(project, &branch.name)?;

        if !self.changes(&head)? {
            warn!(
                project,
                target = branch.name.as_str(),
                "No changes to {}, nothing to tag",
                self.profile.label
            );
            return Ok(TagOutcome::skipped());
        }

        let tag = self.tag_for(branch, &head, versions, upstream_ref);
        info!(
            project,
            name = tag.name.as_str(),
            target = head.id.as_str(),
            "Creating {} tag",
            self.profile.label
        );

        if self.ctx.dry_run {
            return Ok(TagOutcome {
                state: TaggerState::PendingTag,
                tag: Some(tag),
                metadata_uploaded: false,
            });
        }

        let created = self
            .provider
            .create_tag(project, &tag.name, &head.id, &tag.message)
            .map_err(|e| {
                error!(
                    fatal = true,
                    project,
                    name = tag.name.as_str(),
                    target = head.id.as_str(),
                    status = e.status(),
                    error = %e,
                    "Failed to tag {}",
                    self.profile.label
                );
                e
            })?;

        let metadata_uploaded = self.upload_metadata(branch, &head, versions, upstream_ref, &created.name);

        let state = match self.profile.tracker {
            Some(tracker) => self.tag_tracker(tracker, branch, &created),
            None => TaggerState::TagCreated,
        };

        Ok(TagOutcome {
            state,
            tag: Some(created),
            metadata_uploaded,
        })
    }

    /// Mirror `tag` on the tracker: at its auto-deploy branch when it has one,
    /// otherwise at its default branch
    fn tag_tracker(&self, tracker: Project, branch: &AutoDeployBranch, tag: &Tag) -> TaggerState {
        let project = tracker.path(&self.ctx);
        let target = if tracker.has_auto_deploy_branch() {
            branch.name.as_str()
        } else {
            tracker.default_branch()
        };
        info!(project, name = tag.name.as_str(), "Tagging {}", tracker.release_name());

        match self.provider.create_tag(project, &tag.name, target, &tag.message) {
            Ok(_) => TaggerState::DependentTagCreated,
            Err(e) => {
                error!(
                    fatal = true,
                    project,
                    name = tag.name.as_str(),
                    target,
                    status = e.status(),
                    error = %e,
                    "Failed to tag {}",
                    tracker.release_name()
                );
                TaggerState::DependentTagFailed
            }
        }
    }

    fn upload_metadata(
        &self,
        branch: &AutoDeployBranch,
        head: &CommitInfo,
        versions: &ComponentVersionMap,
        upstream_ref: &str,
        tag_name: &str,
    ) -> bool {
        let Some(category) = self.profile.metadata_category else {
            return false;
        };
        if !self.ctx.release_metadata_tracking {
            return false;
        }

        // The packager and the core come from the auto-deploy branch, not the map
        let mut metadata = ReleaseMetadata::new(self.ctx.security_release);
        metadata.add_release(
            self.profile.packager.release_name(),
            head.id.as_str(),
            Some(head.id.clone()),
            branch.name.as_str(),
            false,
        );
        metadata.add_release(
            Project::GitlabEe.release_name(),
            upstream_ref,
            Some(upstream_ref.to_string()),
            branch.name.as_str(),
            false,
        );
        metadata.add_auto_deploy_components(versions);

        match ReleaseMetadataUploader::new(self.provider, self.ctx).upload(category, tag_name, &metadata) {
            Ok(_) => true,
            Err(e) => {
                error!(
                    fatal = true,
                    category,
                    tag = tag_name,
                    status = e.status(),
                    error = %e,
                    "Failed to upload release metadata"
                );
                false
            }
        }
    }
}
